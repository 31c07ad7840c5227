use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::metrics;
use crate::models::learning_path::{
    AiGeneratedPath, LearningPath, LearningPathDoc, Lesson, LessonDoc, Module, ModuleDoc,
    PathStatus, QuizDoc,
};

const PATH_CACHE_TTL: u64 = 300; // 5 minutes

/// Mutation errors, typed so handlers can map them to statuses without
/// inspecting message text. `NotFound` covers both unknown ids and foreign
/// owners; the two are indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// CRUD over the learning-path tree (learning_paths, modules, lessons,
/// quizzes collections) plus a short-lived Redis cache of the assembled
/// tree. Every mutation invalidates the cache so readers always see a
/// fresh snapshot.
pub struct PathService {
    mongo: Database,
    redis: ConnectionManager,
}

impl PathService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    /// Persists an AI-generated path as one path document plus per-entity
    /// documents with dense 0-based order indices. Returns the new path id.
    pub async fn create_from_generated(
        &self,
        user_id: &str,
        goal: &str,
        ai: AiGeneratedPath,
    ) -> Result<String> {
        let now = Utc::now();
        let path_id = Uuid::new_v4().to_string();

        let path_doc = LearningPathDoc {
            id: path_id.clone(),
            user_id: user_id.to_string(),
            title: ai.title,
            description: ai.description,
            goal: goal.to_string(),
            difficulty_level: ai.difficulty,
            estimated_duration_hours: ai.estimated_hours,
            status: PathStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.mongo
            .collection::<LearningPathDoc>("learning_paths")
            .insert_one(&path_doc)
            .await
            .context("Failed to insert learning path")?;

        let modules = self.mongo.collection::<ModuleDoc>("modules");
        let lessons = self.mongo.collection::<LessonDoc>("lessons");
        let quizzes = self.mongo.collection::<QuizDoc>("quizzes");

        for (module_index, ai_module) in ai.modules.into_iter().enumerate() {
            let module_doc = ModuleDoc {
                id: Uuid::new_v4().to_string(),
                learning_path_id: path_id.clone(),
                order_index: module_index as u32,
                title: ai_module.title,
                description: ai_module.description,
                estimated_duration_hours: ai_module.estimated_hours,
                is_completed: false,
                created_at: now,
            };

            modules
                .insert_one(&module_doc)
                .await
                .context("Failed to insert module")?;

            for (lesson_index, ai_lesson) in ai_module.lessons.into_iter().enumerate() {
                let lesson_doc = LessonDoc {
                    id: Uuid::new_v4().to_string(),
                    module_id: module_doc.id.clone(),
                    order_index: lesson_index as u32,
                    title: ai_lesson.title,
                    content: ai_lesson.content,
                    learning_objectives: ai_lesson.objectives,
                    resources: ai_lesson.resources,
                    is_completed: false,
                    completed_at: None,
                    created_at: now,
                };

                lessons
                    .insert_one(&lesson_doc)
                    .await
                    .context("Failed to insert lesson")?;

                let quiz_doc = QuizDoc {
                    id: Uuid::new_v4().to_string(),
                    lesson_id: lesson_doc.id.clone(),
                    questions: ai_lesson.quiz.questions,
                    passing_score: ai_lesson.quiz.passing_score,
                    user_score: None,
                    completed_at: None,
                    created_at: now,
                };

                quizzes
                    .insert_one(&quiz_doc)
                    .await
                    .context("Failed to insert quiz")?;
            }
        }

        tracing::info!(path_id = %path_id, user_id = %user_id, "Learning path created");
        Ok(path_id)
    }

    /// Fetches a fully hydrated path owned by `user_id`, through the cache.
    /// Returns Ok(None) when the path does not exist or belongs to someone
    /// else (absence, not an error).
    pub async fn get_path(&self, path_id: &str, user_id: &str) -> Result<Option<LearningPath>> {
        if let Some(cached) = self.get_cached_path(path_id).await {
            if cached.user_id == user_id {
                metrics::record_cache_hit();
                return Ok(Some(cached));
            }
            // Cached copy belongs to another user: treat as absent
            return Ok(None);
        }
        metrics::record_cache_miss();

        let path_doc = self
            .mongo
            .collection::<LearningPathDoc>("learning_paths")
            .find_one(doc! { "_id": path_id, "user_id": user_id })
            .await
            .context("Failed to query learning path")?;

        let Some(path_doc) = path_doc else {
            return Ok(None);
        };

        let path = self.assemble(path_doc).await?;
        self.cache_path(&path).await.ok();
        Ok(Some(path))
    }

    /// The user's most recent path with status `active`, fully hydrated.
    /// `None` when the user has not generated a path yet.
    pub async fn get_active_path(&self, user_id: &str) -> Result<Option<LearningPath>> {
        let path_doc = self
            .mongo
            .collection::<LearningPathDoc>("learning_paths")
            .find_one(doc! { "user_id": user_id, "status": PathStatus::Active.as_str() })
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to query active learning path")?;

        match path_doc {
            Some(path_doc) => {
                let id = path_doc.id.clone();
                self.get_path(&id, user_id).await
            }
            None => Ok(None),
        }
    }

    /// Deletes a path and everything under it. Returns false when no path
    /// matched (unknown id or foreign owner).
    pub async fn delete_path(&self, path_id: &str, user_id: &str) -> Result<bool> {
        let paths = self.mongo.collection::<LearningPathDoc>("learning_paths");

        let result = paths
            .delete_one(doc! { "_id": path_id, "user_id": user_id })
            .await
            .context("Failed to delete learning path")?;

        if result.deleted_count == 0 {
            return Ok(false);
        }

        // Cascade: modules -> lessons -> quizzes
        let module_ids = self.module_ids_for_path(path_id).await?;
        let lesson_ids = self.lesson_ids_for_modules(&module_ids).await?;

        self.mongo
            .collection::<QuizDoc>("quizzes")
            .delete_many(doc! { "lesson_id": { "$in": &lesson_ids } })
            .await
            .context("Failed to delete quizzes")?;

        self.mongo
            .collection::<LessonDoc>("lessons")
            .delete_many(doc! { "module_id": { "$in": &module_ids } })
            .await
            .context("Failed to delete lessons")?;

        self.mongo
            .collection::<ModuleDoc>("modules")
            .delete_many(doc! { "learning_path_id": path_id })
            .await
            .context("Failed to delete modules")?;

        self.invalidate_cache(path_id).await;

        tracing::info!(path_id = %path_id, user_id = %user_id, "Learning path deleted");
        Ok(true)
    }

    /// Marks a lesson complete (ownership verified through module -> path).
    /// Also refreshes the owning module's persisted completion flag; the
    /// progress computation itself only ever reads lesson flags.
    pub async fn mark_lesson_complete(
        &self,
        lesson_id: &str,
        user_id: &str,
    ) -> Result<(), PathError> {
        let lessons = self.mongo.collection::<LessonDoc>("lessons");

        let lesson = lessons
            .find_one(doc! { "_id": lesson_id })
            .await
            .context("Failed to query lesson")?
            .ok_or(PathError::NotFound("Lesson"))?;

        let module = self
            .mongo
            .collection::<ModuleDoc>("modules")
            .find_one(doc! { "_id": &lesson.module_id })
            .await
            .context("Failed to query module")?
            .ok_or(PathError::NotFound("Lesson"))?;

        let path_id = self
            .verify_path_ownership(&module.learning_path_id, user_id)
            .await?;

        lessons
            .update_one(
                doc! { "_id": lesson_id },
                doc! { "$set": {
                    "is_completed": true,
                    "completedAt": mongodb::bson::DateTime::now()
                } },
            )
            .await
            .context("Failed to mark lesson complete")?;

        // Refresh the module flag once every lesson in it is done
        let incomplete = lessons
            .count_documents(doc! { "module_id": &lesson.module_id, "is_completed": false })
            .await
            .context("Failed to count incomplete lessons")?;

        if incomplete == 0 {
            self.mongo
                .collection::<ModuleDoc>("modules")
                .update_one(
                    doc! { "_id": &lesson.module_id },
                    doc! { "$set": { "is_completed": true } },
                )
                .await
                .context("Failed to update module completion flag")?;
        }

        self.touch_path(&path_id).await?;
        self.invalidate_cache(&path_id).await;

        metrics::LESSONS_COMPLETED_TOTAL.inc();
        tracing::info!(lesson_id = %lesson_id, user_id = %user_id, "Lesson marked complete");
        Ok(())
    }

    /// Records a quiz score. Deliberately does not touch the lesson's
    /// completion flag: `is_completed` stays the sole source of truth for
    /// progress.
    pub async fn submit_quiz_score(
        &self,
        quiz_id: &str,
        user_id: &str,
        score: u32,
    ) -> Result<(), PathError> {
        let quizzes = self.mongo.collection::<QuizDoc>("quizzes");

        let quiz = quizzes
            .find_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to query quiz")?
            .ok_or(PathError::NotFound("Quiz"))?;

        let lesson = self
            .mongo
            .collection::<LessonDoc>("lessons")
            .find_one(doc! { "_id": &quiz.lesson_id })
            .await
            .context("Failed to query lesson")?
            .ok_or(PathError::NotFound("Quiz"))?;

        let module = self
            .mongo
            .collection::<ModuleDoc>("modules")
            .find_one(doc! { "_id": &lesson.module_id })
            .await
            .context("Failed to query module")?
            .ok_or(PathError::NotFound("Quiz"))?;

        let path_id = self
            .verify_path_ownership(&module.learning_path_id, user_id)
            .await?;

        quizzes
            .update_one(
                doc! { "_id": quiz_id },
                doc! { "$set": {
                    "user_score": score as i64,
                    "completedAt": mongodb::bson::DateTime::now()
                } },
            )
            .await
            .context("Failed to submit quiz score")?;

        self.touch_path(&path_id).await?;
        self.invalidate_cache(&path_id).await;

        let passed = score >= quiz.passing_score;
        metrics::QUIZZES_SUBMITTED_TOTAL
            .with_label_values(&[if passed { "passed" } else { "failed" }])
            .inc();

        tracing::info!(
            quiz_id = %quiz_id,
            user_id = %user_id,
            score = score,
            passed = passed,
            "Quiz score submitted"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Assembles the domain tree: modules and lessons sorted by
    /// order_index, at most one quiz per lesson.
    async fn assemble(&self, path_doc: LearningPathDoc) -> Result<LearningPath> {
        let path_id = path_doc.id.clone();

        let mut module_cursor = self
            .mongo
            .collection::<ModuleDoc>("modules")
            .find(doc! { "learning_path_id": &path_id })
            .sort(doc! { "order_index": 1 })
            .await
            .context("Failed to query modules")?;

        let mut modules: Vec<Module> = Vec::new();

        while let Some(module_doc) = module_cursor
            .try_next()
            .await
            .context("Failed to read module")?
        {
            let mut lesson_cursor = self
                .mongo
                .collection::<LessonDoc>("lessons")
                .find(doc! { "module_id": &module_doc.id })
                .sort(doc! { "order_index": 1 })
                .await
                .context("Failed to query lessons")?;

            let mut lessons: Vec<Lesson> = Vec::new();

            while let Some(lesson_doc) = lesson_cursor
                .try_next()
                .await
                .context("Failed to read lesson")?
            {
                let quiz = self
                    .mongo
                    .collection::<QuizDoc>("quizzes")
                    .find_one(doc! { "lesson_id": &lesson_doc.id })
                    .await
                    .context("Failed to query quiz")?
                    .map(QuizDoc::into_domain);

                lessons.push(lesson_doc.into_domain(quiz));
            }

            modules.push(module_doc.into_domain(lessons));
        }

        Ok(path_doc.into_domain(modules))
    }

    /// Checks the path exists and belongs to `user_id`; returns the path id.
    async fn verify_path_ownership(
        &self,
        path_id: &str,
        user_id: &str,
    ) -> Result<String, PathError> {
        self.mongo
            .collection::<LearningPathDoc>("learning_paths")
            .find_one(doc! { "_id": path_id, "user_id": user_id })
            .await
            .context("Failed to query learning path")?
            .map(|p| p.id)
            .ok_or(PathError::NotFound("Learning path"))
    }

    async fn touch_path(&self, path_id: &str) -> Result<()> {
        self.mongo
            .collection::<LearningPathDoc>("learning_paths")
            .update_one(
                doc! { "_id": path_id },
                doc! { "$set": { "updatedAt": mongodb::bson::DateTime::now() } },
            )
            .await
            .context("Failed to update path timestamp")?;
        Ok(())
    }

    async fn module_ids_for_path(&self, path_id: &str) -> Result<Vec<String>> {
        let mut cursor = self
            .mongo
            .collection::<ModuleDoc>("modules")
            .find(doc! { "learning_path_id": path_id })
            .await
            .context("Failed to query modules")?;

        let mut ids = Vec::new();
        while let Some(module) = cursor.try_next().await.context("Failed to read module")? {
            ids.push(module.id);
        }
        Ok(ids)
    }

    async fn lesson_ids_for_modules(&self, module_ids: &[String]) -> Result<Vec<String>> {
        let mut cursor = self
            .mongo
            .collection::<LessonDoc>("lessons")
            .find(doc! { "module_id": { "$in": module_ids } })
            .await
            .context("Failed to query lessons")?;

        let mut ids = Vec::new();
        while let Some(lesson) = cursor.try_next().await.context("Failed to read lesson")? {
            ids.push(lesson.id);
        }
        Ok(ids)
    }

    async fn get_cached_path(&self, path_id: &str) -> Option<LearningPath> {
        let mut conn = self.redis.clone();
        let raw: String = redis::cmd("GET")
            .arg(format!("path:{}", path_id))
            .query_async(&mut conn)
            .await
            .ok()?;

        serde_json::from_str(&raw).ok()
    }

    async fn cache_path(&self, path: &LearningPath) -> Result<()> {
        let mut conn = self.redis.clone();
        let raw = serde_json::to_string(path).context("Failed to serialize path for cache")?;

        redis::cmd("SETEX")
            .arg(format!("path:{}", path.id))
            .arg(PATH_CACHE_TTL)
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to cache path")?;

        Ok(())
    }

    /// Cache invalidation is best-effort: the entry expires on its own
    async fn invalidate_cache(&self, path_id: &str) {
        let mut conn = self.redis.clone();
        let result = redis::cmd("DEL")
            .arg(format!("path:{}", path_id))
            .query_async::<()>(&mut conn)
            .await;

        if let Err(e) = result {
            tracing::warn!(path_id = %path_id, "Failed to invalidate path cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(PathError::NotFound("Quiz").to_string(), "Quiz not found");
        assert_eq!(
            PathError::NotFound("Lesson").to_string(),
            "Lesson not found"
        );
    }

    #[test]
    fn query_failures_become_internal_errors() {
        let err: PathError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, PathError::Internal(_)));
    }
}
