use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    metrics,
    middlewares::auth::JwtClaims,
    models::chat::{ChatRequest, ChatResponse},
    services::{chat_service::ChatService, AppState},
};

/// POST /api/v1/chat - Ask the AI tutor a question
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!(user_id = %claims.sub, "Processing tutor chat message");

    let service = ChatService::new(&state.config)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match service
        .send_message(&req.messages, req.context.as_deref())
        .await
    {
        Ok(reply) => {
            metrics::CHAT_MESSAGES_TOTAL
                .with_label_values(&["success"])
                .inc();
            Ok(Json(ChatResponse { reply }))
        }
        Err(e) => {
            metrics::CHAT_MESSAGES_TOTAL
                .with_label_values(&["error"])
                .inc();
            tracing::error!("Tutor chat failed: {}", e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}
