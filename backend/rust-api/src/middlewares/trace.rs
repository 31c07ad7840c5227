use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Caller-supplied ids longer than this are treated as garbage
const MAX_TRACE_ID_LEN: usize = 64;

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Tags every request with a trace id and echoes it on the response so the
/// frontend can correlate a failed call with server logs. A caller-supplied
/// x-trace-id is kept when it looks sane, otherwise a fresh one is minted.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(accept_trace_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }

    response
}

/// Only short alphanumeric/dash ids make it into logs; anything else is
/// replaced rather than trusted.
fn accept_trace_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let sane = !trimmed.is_empty()
        && trimmed.len() <= MAX_TRACE_ID_LEN
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');

    sane.then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_shaped_ids_are_kept() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(accept_trace_id(&id), Some(id));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(accept_trace_id("  abc-123  "), Some("abc-123".to_string()));
    }

    #[test]
    fn garbage_ids_are_rejected() {
        assert_eq!(accept_trace_id(""), None);
        assert_eq!(accept_trace_id("   "), None);
        assert_eq!(accept_trace_id("id with spaces"), None);
        assert_eq!(accept_trace_id("id;rm=-rf"), None);
        assert_eq!(accept_trace_id(&"x".repeat(65)), None);
    }
}
