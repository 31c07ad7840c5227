use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// JSON body extractor whose rejections use the same envelope the handlers
/// emit ({"success": false, "message": ...}) instead of axum's plain-text
/// bodies. Keeps the rejection's own status, so a missing content-type is
/// still a 415 and a parse failure a 400/422.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let message = rejection.body_text();
    tracing::debug!(status = %status, "Rejected request body: {}", message);

    let body = Json(json!({
        "success": false,
        "message": message,
    }));
    (status, body).into_response()
}
