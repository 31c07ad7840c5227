use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::models::chat::ChatMessage;

const CHAT_TIMEOUT_SECS: u64 = 30;

const TUTOR_INSTRUCTION: &str = "You are a friendly, encouraging AI tutor embedded in a \
personalized learning platform. Answer the learner's questions clearly and concisely, \
use examples where they help, and relate answers to the lesson context when one is \
provided. If the learner is stuck, guide them toward the answer instead of just \
giving it away. Keep replies under 300 words.";

/// Non-streaming tutor chat against the same Gemini deployment the path
/// generator uses.
pub struct ChatService {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Takes the conversation as the frontend sends it: the last entry is
    /// the new prompt, everything before it is history.
    pub async fn send_message(
        &self,
        messages: &[ChatMessage],
        context: Option<&str>,
    ) -> Result<String> {
        let (latest, history) = messages
            .split_last()
            .ok_or_else(|| anyhow!("Conversation is empty"))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": build_instruction(context) }]
            },
            "contents": build_contents(&latest.content, history),
            "generationConfig": { "temperature": 0.8 }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to call Gemini")?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Gemini chat returned an error response");
            anyhow::bail!("Gemini returned status: {}", status);
        }

        let body: Value = response
            .json()
            .await
            .context("Invalid Gemini response body")?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Response contains no generated text"))
    }
}

fn build_instruction(context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            format!("{TUTOR_INSTRUCTION}\n\nLesson context: {ctx}")
        }
        _ => TUTOR_INSTRUCTION.to_string(),
    }
}

/// Maps our role names onto Gemini's (assistant -> model) and appends the
/// new message as the final user turn. Unknown roles are skipped.
fn build_contents(message: &str, history: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = history
        .iter()
        .filter_map(|turn| {
            let role = match turn.role.as_str() {
                "user" => "user",
                "assistant" | "model" => "model",
                _ => return None,
            };
            Some(serde_json::json!({
                "role": role,
                "parts": [{ "text": turn.content }]
            }))
        })
        .collect();

    contents.push(serde_json::json!({
        "role": "user",
        "parts": [{ "text": message }]
    }));

    contents
}
