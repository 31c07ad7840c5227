use serde::{Deserialize, Serialize};
use validator::Validate;

/// One turn of the tutor conversation. `role` is either "user" or
/// "assistant"; anything else is dropped before the upstream call.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatMessage {
    pub role: String,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

/// The frontend sends the whole conversation: the last entry is the new
/// prompt, everything before it is history.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(
        length(min = 1, message = "At least one message is required"),
        nested
    )]
    pub messages: Vec<ChatMessage>,
    /// Optional lesson context ("currently studying: Ownership in Rust")
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_the_frontend_wire_shape() {
        let body = serde_json::json!({
            "messages": [
                { "role": "user", "content": "What is ownership?" },
                { "role": "assistant", "content": "Ownership is..." },
                { "role": "user", "content": "And borrowing?" }
            ],
            "context": "Ownership in Rust"
        });

        let req: ChatRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2].content, "And borrowing?");
        assert_eq!(req.context.as_deref(), Some("Ownership in Rust"));
    }

    #[test]
    fn context_is_optional() {
        let body = serde_json::json!({
            "messages": [{ "role": "user", "content": "hi" }]
        });

        let req: ChatRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.context.is_none());
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let body = serde_json::json!({ "messages": [] });

        let req: ChatRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn blank_message_content_is_rejected() {
        let body = serde_json::json!({
            "messages": [{ "role": "user", "content": "" }]
        });

        let req: ChatRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_carries_only_the_reply() {
        let value = serde_json::to_value(ChatResponse {
            reply: "Borrowing lets you...".to_string(),
        })
        .unwrap();

        assert_eq!(value, serde_json::json!({ "reply": "Borrowing lets you..." }));
    }
}
