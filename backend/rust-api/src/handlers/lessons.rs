use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    services::{
        path_service::{PathError, PathService},
        AppState,
    },
};

/// POST /api/v1/lessons/{id}/complete - Mark a lesson as completed
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id = %claims.sub, lesson_id = %lesson_id, "Completing lesson");

    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    match service.mark_lesson_complete(&lesson_id, &claims.sub).await {
        Ok(()) => Ok((StatusCode::OK, Json(json!({ "success": true })))),
        Err(e @ PathError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(PathError::Internal(e)) => {
            tracing::error!("Failed to complete lesson {}: {:#}", lesson_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
