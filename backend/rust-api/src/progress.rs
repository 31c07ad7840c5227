//! Pure progress/status computation over a hydrated learning-path tree.
//!
//! Everything in this module is synchronous, allocation-light and never
//! mutates its input: callers re-invoke with a fresh snapshot after each
//! persisted mutation. `Lesson.is_completed` is the sole source of truth;
//! quiz scores never imply lesson completion.

use serde::Serialize;

use crate::models::learning_path::{LearningPath, Lesson, Module};

/// Dashboard shows at most this many "continue learning" entries
pub const UPCOMING_LESSONS_LIMIT: usize = 4;

/// Unlock state of a module, derived purely from lesson completion flags
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleStatus {
    Completed,
    InProgress,
    Locked,
}

/// Incomplete lesson annotated with its owning module's title for display
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingLesson {
    pub lesson_id: String,
    pub title: String,
    pub module_title: String,
}

/// Path-wide statistics for the dashboard
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PathStats {
    pub total_lessons: usize,
    pub completed_lessons: usize,
    /// 0-100, rounded half-up; 0 when the path has no lessons
    pub overall_progress: u8,
    pub total_modules: usize,
    pub completed_modules: usize,
    pub upcoming_lessons: Vec<UpcomingLesson>,
}

/// A lesson located in the tree, with both indices for navigation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentLesson<'a> {
    pub lesson: &'a Lesson,
    pub module: &'a Module,
    pub module_index: usize,
    pub lesson_index: usize,
}

/// Previous/next lesson ids relative to a position in the tree.
/// `None` at either boundary of the whole path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdjacentLessonIds<'a> {
    pub previous: Option<&'a str>,
    pub next: Option<&'a str>,
}

fn module_is_completed(module: &Module) -> bool {
    // Vacuously true for a module without lessons; this matches the
    // original product behavior and is intentional (see DESIGN.md).
    module.lessons.iter().all(|l| l.is_completed)
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Computes path-wide statistics. An absent path yields the all-zero result
/// rather than an error: "no path generated yet" is a valid state.
pub fn compute_stats(path: Option<&LearningPath>) -> PathStats {
    let Some(path) = path else {
        return PathStats::default();
    };

    let total_lessons = path.modules.iter().map(|m| m.lessons.len()).sum();
    let completed_lessons = path
        .modules
        .iter()
        .flat_map(|m| &m.lessons)
        .filter(|l| l.is_completed)
        .count();

    let completed_modules = path
        .modules
        .iter()
        .filter(|m| module_is_completed(m))
        .count();

    let upcoming_lessons = path
        .modules
        .iter()
        .flat_map(|module| {
            module
                .lessons
                .iter()
                .filter(|l| !l.is_completed)
                .map(|lesson| UpcomingLesson {
                    lesson_id: lesson.id.clone(),
                    title: lesson.title.clone(),
                    module_title: module.title.clone(),
                })
        })
        .take(UPCOMING_LESSONS_LIMIT)
        .collect();

    PathStats {
        total_lessons,
        completed_lessons,
        overall_progress: percentage(completed_lessons, total_lessons),
        total_modules: path.modules.len(),
        completed_modules,
        upcoming_lessons,
    }
}

/// Classifies the module at `module_index` as completed/in-progress/locked.
///
/// Module 0 is never `Locked` so the learner always has a starting point.
/// A later module unlocks once it has any completed lesson or once the
/// immediately preceding module is fully completed.
pub fn module_status(path: &LearningPath, module_index: usize) -> ModuleStatus {
    let module = &path.modules[module_index];

    if module_is_completed(module) {
        return ModuleStatus::Completed;
    }

    if module.lessons.iter().any(|l| l.is_completed) {
        return ModuleStatus::InProgress;
    }

    if module_index == 0 {
        return ModuleStatus::InProgress;
    }

    if module_is_completed(&path.modules[module_index - 1]) {
        ModuleStatus::InProgress
    } else {
        ModuleStatus::Locked
    }
}

/// Completion percentage of a single module; 0 for a module with no lessons
/// (explicit guard, never NaN).
pub fn module_progress(module: &Module) -> u8 {
    let completed = module.lessons.iter().filter(|l| l.is_completed).count();
    percentage(completed, module.lessons.len())
}

/// Id of the first incomplete lesson in the module, in order-index order
pub fn first_incomplete_lesson_id(module: &Module) -> Option<&str> {
    module
        .lessons
        .iter()
        .find(|l| !l.is_completed)
        .map(|l| l.id.as_str())
}

/// Locates the lesson the learner should see.
///
/// A requested id that exists anywhere in the path wins. Otherwise the
/// first incomplete lesson in path order is chosen (empty modules are
/// skipped), and when every lesson is complete the learner lands on the
/// very last lesson of the last non-empty module. Returns `None` only for
/// a path without a single lesson.
pub fn resolve_current_lesson<'a>(
    path: &'a LearningPath,
    requested_lesson_id: Option<&str>,
) -> Option<CurrentLesson<'a>> {
    if let Some(id) = requested_lesson_id {
        for (module_index, module) in path.modules.iter().enumerate() {
            for (lesson_index, lesson) in module.lessons.iter().enumerate() {
                if lesson.id == id {
                    return Some(CurrentLesson {
                        lesson,
                        module,
                        module_index,
                        lesson_index,
                    });
                }
            }
        }
        // Unknown id: fall through to the default scan
    }

    for (module_index, module) in path.modules.iter().enumerate() {
        if let Some(lesson_index) = module.lessons.iter().position(|l| !l.is_completed) {
            return Some(CurrentLesson {
                lesson: &module.lessons[lesson_index],
                module,
                module_index,
                lesson_index,
            });
        }
    }

    // Everything complete: land on the last lesson of the last non-empty module
    path.modules
        .iter()
        .enumerate()
        .rev()
        .find_map(|(module_index, module)| {
            module.lessons.last().map(|lesson| CurrentLesson {
                lesson,
                module,
                module_index,
                lesson_index: module.lessons.len() - 1,
            })
        })
}

/// Previous/next lesson ids for the lesson at (`module_index`, `lesson_index`).
/// Crosses module boundaries, skipping modules without lessons.
pub fn adjacent_lesson_ids(
    path: &LearningPath,
    module_index: usize,
    lesson_index: usize,
) -> AdjacentLessonIds<'_> {
    let module = &path.modules[module_index];

    let previous = if lesson_index > 0 {
        Some(module.lessons[lesson_index - 1].id.as_str())
    } else {
        path.modules[..module_index]
            .iter()
            .rev()
            .find(|m| !m.lessons.is_empty())
            .and_then(|m| m.lessons.last())
            .map(|l| l.id.as_str())
    };

    let next = if lesson_index + 1 < module.lessons.len() {
        Some(module.lessons[lesson_index + 1].id.as_str())
    } else {
        path.modules[module_index + 1..]
            .iter()
            .find(|m| !m.lessons.is_empty())
            .and_then(|m| m.lessons.first())
            .map(|l| l.id.as_str())
    };

    AdjacentLessonIds { previous, next }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::learning_path::{DifficultyLevel, PathStatus};
    use chrono::Utc;

    fn lesson(id: &str, order_index: u32, completed: bool) -> Lesson {
        Lesson {
            id: id.to_string(),
            order_index,
            title: format!("Lesson {}", id),
            content: String::new(),
            learning_objectives: vec![],
            resources: vec![],
            is_completed: completed,
            completed_at: None,
            quiz: None,
        }
    }

    fn module(id: &str, order_index: u32, lessons: Vec<Lesson>) -> Module {
        Module {
            id: id.to_string(),
            order_index,
            title: format!("Module {}", id),
            description: String::new(),
            estimated_duration_hours: 1.0,
            is_completed: false,
            lessons,
        }
    }

    fn path(modules: Vec<Module>) -> LearningPath {
        let now = Utc::now();
        LearningPath {
            id: "path-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Test Path".to_string(),
            description: String::new(),
            goal: "learn".to_string(),
            difficulty: DifficultyLevel::Beginner,
            estimated_duration_hours: 10.0,
            status: PathStatus::Active,
            modules,
            created_at: now,
            updated_at: now,
        }
    }

    /// Path layout from the scenario tests: A fully complete, B half
    /// complete, C untouched.
    fn scenario_path() -> LearningPath {
        path(vec![
            module(
                "a",
                0,
                vec![lesson("a1", 0, true), lesson("a2", 1, true)],
            ),
            module(
                "b",
                1,
                vec![lesson("b1", 0, true), lesson("b2", 1, false)],
            ),
            module("c", 2, vec![lesson("c1", 0, false)]),
        ])
    }

    #[test]
    fn absent_path_yields_empty_stats() {
        let stats = compute_stats(None);
        assert_eq!(stats, PathStats::default());
        assert_eq!(stats.overall_progress, 0);
        assert!(stats.upcoming_lessons.is_empty());
    }

    #[test]
    fn scenario_counts_and_progress() {
        let p = scenario_path();
        let stats = compute_stats(Some(&p));

        assert_eq!(stats.total_lessons, 5);
        assert_eq!(stats.completed_lessons, 3);
        assert_eq!(stats.overall_progress, 60);
        assert_eq!(stats.total_modules, 3);
        assert_eq!(stats.completed_modules, 1); // A only
    }

    #[test]
    fn scenario_module_statuses() {
        let p = scenario_path();
        assert_eq!(module_status(&p, 0), ModuleStatus::Completed);
        // B unlocked by A being complete (and has a completed lesson)
        assert_eq!(module_status(&p, 1), ModuleStatus::InProgress);
        // C locked: B incomplete, no lessons done in C, not first
        assert_eq!(module_status(&p, 2), ModuleStatus::Locked);
    }

    #[test]
    fn first_module_is_never_locked() {
        let untouched = path(vec![
            module("a", 0, vec![lesson("a1", 0, false)]),
            module("b", 1, vec![lesson("b1", 0, false)]),
        ]);
        assert_eq!(module_status(&untouched, 0), ModuleStatus::InProgress);
        assert_eq!(module_status(&untouched, 1), ModuleStatus::Locked);
    }

    #[test]
    fn module_with_completed_lesson_is_in_progress_even_behind_locked_gap() {
        // Completing a lesson in a later module unlocks it regardless of
        // the preceding module's state.
        let p = path(vec![
            module("a", 0, vec![lesson("a1", 0, false)]),
            module("b", 1, vec![lesson("b1", 0, true), lesson("b2", 1, false)]),
        ]);
        assert_eq!(module_status(&p, 1), ModuleStatus::InProgress);
    }

    #[test]
    fn empty_module_is_vacuously_completed() {
        let p = path(vec![module("a", 0, vec![])]);
        let stats = compute_stats(Some(&p));
        assert_eq!(stats.completed_modules, 1);
        assert_eq!(module_status(&p, 0), ModuleStatus::Completed);
    }

    #[test]
    fn module_progress_is_zero_for_empty_module_not_nan() {
        let empty = module("a", 0, vec![]);
        assert_eq!(module_progress(&empty), 0);
    }

    #[test]
    fn module_progress_rounds_half_up() {
        // 1/3 = 33.33 -> 33; 2/3 = 66.67 -> 67; 1/2 = 50
        let m = module(
            "a",
            0,
            vec![
                lesson("l1", 0, true),
                lesson("l2", 1, false),
                lesson("l3", 2, false),
            ],
        );
        assert_eq!(module_progress(&m), 33);

        let m = module("b", 0, vec![lesson("l1", 0, true), lesson("l2", 1, true), lesson("l3", 2, false)]);
        assert_eq!(module_progress(&m), 67);
    }

    #[test]
    fn overall_progress_stays_in_bounds() {
        let all_done = path(vec![module(
            "a",
            0,
            vec![lesson("a1", 0, true), lesson("a2", 1, true)],
        )]);
        assert_eq!(compute_stats(Some(&all_done)).overall_progress, 100);

        let none_done = path(vec![module("a", 0, vec![lesson("a1", 0, false)])]);
        assert_eq!(compute_stats(Some(&none_done)).overall_progress, 0);

        let no_lessons = path(vec![module("a", 0, vec![])]);
        assert_eq!(compute_stats(Some(&no_lessons)).overall_progress, 0);
    }

    #[test]
    fn stats_are_idempotent() {
        let p = scenario_path();
        assert_eq!(compute_stats(Some(&p)), compute_stats(Some(&p)));
    }

    #[test]
    fn upcoming_lessons_capped_at_four_in_path_order() {
        let p = path(vec![
            module("a", 0, vec![lesson("a1", 0, false), lesson("a2", 1, false)]),
            module("b", 1, vec![lesson("b1", 0, false), lesson("b2", 1, false)]),
            module("c", 2, vec![lesson("c1", 0, false), lesson("c2", 1, false)]),
        ]);
        let stats = compute_stats(Some(&p));

        assert_eq!(stats.upcoming_lessons.len(), UPCOMING_LESSONS_LIMIT);
        let ids: Vec<&str> = stats
            .upcoming_lessons
            .iter()
            .map(|u| u.lesson_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "b2"]);
        assert_eq!(stats.upcoming_lessons[0].module_title, "Module a");
        assert_eq!(stats.upcoming_lessons[2].module_title, "Module b");
    }

    #[test]
    fn upcoming_lessons_skip_completed() {
        let p = scenario_path();
        let stats = compute_stats(Some(&p));
        let ids: Vec<&str> = stats
            .upcoming_lessons
            .iter()
            .map(|u| u.lesson_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b2", "c1"]);
    }

    #[test]
    fn first_incomplete_lesson_id_respects_order() {
        let p = scenario_path();
        assert_eq!(first_incomplete_lesson_id(&p.modules[0]), None);
        assert_eq!(first_incomplete_lesson_id(&p.modules[1]), Some("b2"));
        assert_eq!(first_incomplete_lesson_id(&p.modules[2]), Some("c1"));
    }

    #[test]
    fn resolve_current_lesson_finds_requested_id() {
        let p = scenario_path();
        let current = resolve_current_lesson(&p, Some("c1")).unwrap();
        assert_eq!(current.lesson.id, "c1");
        assert_eq!(current.module.id, "c");
        assert_eq!(current.module_index, 2);
        assert_eq!(current.lesson_index, 0);
    }

    #[test]
    fn resolve_current_lesson_defaults_to_first_incomplete() {
        let p = scenario_path();
        let current = resolve_current_lesson(&p, None).unwrap();
        assert_eq!(current.lesson.id, "b2");
        assert_eq!(current.module_index, 1);
        assert_eq!(current.lesson_index, 1);
    }

    #[test]
    fn resolve_current_lesson_falls_back_to_last_when_all_complete() {
        let p = path(vec![
            module("a", 0, vec![lesson("a1", 0, true)]),
            module("b", 1, vec![lesson("b1", 0, true), lesson("b2", 1, true)]),
        ]);
        let current = resolve_current_lesson(&p, None).unwrap();
        assert_eq!(current.lesson.id, "b2");
        assert_eq!(current.module_index, 1);
        assert_eq!(current.lesson_index, 1);
    }

    #[test]
    fn resolve_current_lesson_skips_empty_modules() {
        let p = path(vec![
            module("a", 0, vec![]),
            module("b", 1, vec![lesson("b1", 0, false)]),
        ]);
        let current = resolve_current_lesson(&p, None).unwrap();
        assert_eq!(current.lesson.id, "b1");
        assert_eq!(current.module_index, 1);

        // All complete + trailing empty module: fall back past the empty one
        let p = path(vec![
            module("a", 0, vec![lesson("a1", 0, true)]),
            module("b", 1, vec![]),
        ]);
        let current = resolve_current_lesson(&p, None).unwrap();
        assert_eq!(current.lesson.id, "a1");
    }

    #[test]
    fn resolve_current_lesson_none_for_path_without_lessons() {
        let p = path(vec![module("a", 0, vec![]), module("b", 1, vec![])]);
        assert!(resolve_current_lesson(&p, None).is_none());

        let empty = path(vec![]);
        assert!(resolve_current_lesson(&empty, None).is_none());
    }

    #[test]
    fn adjacent_ids_within_a_module() {
        let p = scenario_path();
        let adj = adjacent_lesson_ids(&p, 1, 0);
        assert_eq!(adj.previous, Some("a2"));
        assert_eq!(adj.next, Some("b2"));
    }

    #[test]
    fn adjacent_ids_cross_module_boundaries() {
        let p = scenario_path();
        let adj = adjacent_lesson_ids(&p, 1, 1);
        assert_eq!(adj.previous, Some("b1"));
        assert_eq!(adj.next, Some("c1"));
    }

    #[test]
    fn adjacent_ids_skip_empty_modules() {
        let p = path(vec![
            module("a", 0, vec![lesson("a1", 0, true)]),
            module("b", 1, vec![]),
            module("c", 2, vec![lesson("c1", 0, false)]),
        ]);
        let adj = adjacent_lesson_ids(&p, 0, 0);
        assert_eq!(adj.next, Some("c1"));

        let adj = adjacent_lesson_ids(&p, 2, 0);
        assert_eq!(adj.previous, Some("a1"));
    }

    #[test]
    fn adjacent_ids_none_at_path_boundaries() {
        let p = scenario_path();

        let first = adjacent_lesson_ids(&p, 0, 0);
        assert_eq!(first.previous, None);
        assert_eq!(first.next, Some("a2"));

        let last = adjacent_lesson_ids(&p, 2, 0);
        assert_eq!(last.previous, Some("b2"));
        assert_eq!(last.next, None);
    }
}
