use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use validator::Validate;

use crate::{
    extractors::AppJson,
    metrics,
    middlewares::auth::JwtClaims,
    models::learning_path::{GeneratePathRequest, GeneratePathResponse},
    progress,
    services::{
        generation_service::{GenerationError, GenerationService},
        path_service::PathService,
        AppState,
    },
};

#[derive(Debug, Deserialize)]
pub struct NavigationQuery {
    pub lesson_id: Option<String>,
}

/// POST /api/v1/paths/generate - Generate a learning path from a goal
pub async fn generate_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<GeneratePathRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!(user_id = %claims.sub, goal = %req.goal, "Generating learning path");

    let start = Instant::now();

    let generation = GenerationService::new(&state.config)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let ai_path = match generation.generate_path(&req.goal).await {
        Ok(path) => path,
        Err(e) => {
            let status_label = match &e {
                GenerationError::MalformedResponse(_) => "malformed",
                GenerationError::Upstream(_) => "upstream_error",
            };
            record_generation(status_label, start);
            tracing::error!(user_id = %claims.sub, "Path generation failed: {}", e);
            return Err((StatusCode::BAD_GATEWAY, e.to_string()));
        }
    };

    let service = PathService::new(state.mongo.clone(), state.redis.clone());
    let title = ai_path.title.clone();

    match service
        .create_from_generated(&claims.sub, &req.goal, ai_path)
        .await
    {
        Ok(path_id) => {
            record_generation("success", start);
            tracing::info!(
                user_id = %claims.sub,
                path_id = %path_id,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "Learning path generated"
            );
            Ok((
                StatusCode::CREATED,
                Json(GeneratePathResponse {
                    success: true,
                    path_id,
                    title,
                }),
            ))
        }
        Err(e) => {
            record_generation("error", start);
            tracing::error!("Failed to persist generated path: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn record_generation(status: &str, start: Instant) {
    metrics::PATHS_GENERATED_TOTAL
        .with_label_values(&[status])
        .inc();
    metrics::PATH_GENERATION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(start.elapsed().as_secs_f64());
}

/// GET /api/v1/paths/active - Most recent active path, fully hydrated
pub async fn get_active_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    match service.get_active_path(&claims.sub).await {
        // No path yet is a valid empty result, not a 404
        Ok(path) => Ok(Json(json!({ "success": true, "path": path }))),
        Err(e) => {
            tracing::error!("Failed to get active path: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// DELETE /api/v1/paths/active - Delete the active path and its subtree
pub async fn delete_active_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    let path = service
        .get_active_path(&claims.sub)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No active learning path".to_string()))?;

    match service.delete_path(&path.id, &claims.sub).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, "Learning path not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to delete active path: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /api/v1/paths/{id} - Fetch one path (ownership-checked)
pub async fn get_path_by_id(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    match service.get_path(&path_id, &claims.sub).await {
        Ok(Some(path)) => Ok(Json(json!({ "success": true, "path": path }))),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Learning path not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to get path {}: {}", path_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// DELETE /api/v1/paths/{id} - Delete one path and its subtree
pub async fn delete_path_by_id(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    match service.delete_path(&path_id, &claims.sub).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, "Learning path not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to delete path {}: {}", path_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /api/v1/paths/{id}/stats - Progress statistics for the dashboard
pub async fn get_path_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    let path = service
        .get_path(&path_id, &claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get path {}: {}", path_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Learning path not found".to_string()))?;

    let stats = progress::compute_stats(Some(&path));

    let modules: Vec<serde_json::Value> = path
        .modules
        .iter()
        .enumerate()
        .map(|(index, module)| {
            json!({
                "moduleId": module.id,
                "title": module.title,
                "status": progress::module_status(&path, index),
                "progress": progress::module_progress(module),
                "firstIncompleteLessonId": progress::first_incomplete_lesson_id(module),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "stats": stats,
        "modules": modules
    })))
}

/// GET /api/v1/paths/{id}/navigation?lesson_id=... - Lesson player position
pub async fn get_path_navigation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
    Query(query): Query<NavigationQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    let path = service
        .get_path(&path_id, &claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get path {}: {}", path_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Learning path not found".to_string()))?;

    let current = progress::resolve_current_lesson(&path, query.lesson_id.as_deref())
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "Learning path has no lessons".to_string(),
            )
        })?;

    let adjacent = progress::adjacent_lesson_ids(&path, current.module_index, current.lesson_index);

    Ok(Json(json!({
        "success": true,
        "current": {
            "lesson": current.lesson,
            "moduleId": current.module.id,
            "moduleTitle": current.module.title,
            "moduleIndex": current.module_index,
            "lessonIndex": current.lesson_index,
        },
        "previousLessonId": adjacent.previous,
        "nextLessonId": adjacent.next
    })))
}
