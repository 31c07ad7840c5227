use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::learning_path::SubmitQuizScoreRequest,
    services::{
        path_service::{PathError, PathService},
        AppState,
    },
};

/// POST /api/v1/quizzes/{id}/submit - Record a quiz score (0-100).
/// Does not touch lesson completion; that is a separate explicit action.
pub async fn submit_quiz_score(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<SubmitQuizScoreRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!(
        user_id = %claims.sub,
        quiz_id = %quiz_id,
        score = req.score,
        "Submitting quiz score"
    );

    let service = PathService::new(state.mongo.clone(), state.redis.clone());

    match service
        .submit_quiz_score(&quiz_id, &claims.sub, req.score)
        .await
    {
        Ok(()) => Ok((StatusCode::OK, Json(json!({ "success": true })))),
        Err(e @ PathError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(PathError::Internal(e)) => {
            tracing::error!("Failed to submit quiz score {}: {:#}", quiz_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
