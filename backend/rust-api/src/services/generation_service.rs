use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::models::learning_path::AiGeneratedPath;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Gemini can take a while on long prompts
const GEMINI_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The model answered but the payload is not a usable path.
    /// Retrying with the same prompt may succeed.
    #[error("AI returned a malformed learning path: {0}")]
    MalformedResponse(String),
    /// The upstream call itself failed (network, quota, 5xx)
    #[error("AI provider request failed: {0}")]
    Upstream(String),
}

/// Calls Gemini to turn a free-form learning goal into a structured path.
pub struct GenerationService {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GenerationService {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GEMINI_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationError::Upstream(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Generates and validates a learning path for `goal`.
    pub async fn generate_path(&self, goal: &str) -> Result<AiGeneratedPath, GenerationError> {
        let prompt = build_prompt(goal);

        // Upstream hiccups are retried with backoff; malformed payloads
        // are not (same prompt, same answer)
        let raw = retry_async_with_config(RetryConfig::default(), || async {
            self.call_gemini(&prompt).await
        })
        .await?;

        let json = extract_json(&raw)
            .ok_or_else(|| GenerationError::MalformedResponse("No JSON object found".into()))?;

        let path: AiGeneratedPath = serde_json::from_str(json)
            .map_err(|e| GenerationError::MalformedResponse(format!("Invalid JSON: {e}")))?;

        validate_generated_path(&path)?;
        Ok(path)
    }

    async fn call_gemini(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Upstream(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Gemini returned an error response");
            return Err(GenerationError::Upstream(format!(
                "Gemini returned status {status}: {detail}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Upstream(format!("Invalid response body: {e}")))?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GenerationError::Upstream("Response contains no generated text".into())
            })
    }
}

/// Extracts the JSON object from a model reply, tolerating markdown fences
/// and surrounding prose.
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    // Strip ```json ... ``` fences if present
    let inner = if let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    };

    // Fall back to the outermost braces when prose surrounds the object
    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&inner[start..=end])
}

/// Structural checks on top of serde: Gemini occasionally emits paths that
/// parse but are unusable (empty modules, out-of-range answer indices).
pub fn validate_generated_path(path: &AiGeneratedPath) -> Result<(), GenerationError> {
    if path.title.trim().is_empty() {
        return Err(GenerationError::MalformedResponse(
            "Path title is empty".into(),
        ));
    }

    if path.modules.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "Path has no modules".into(),
        ));
    }

    for (mi, module) in path.modules.iter().enumerate() {
        if module.lessons.is_empty() {
            return Err(GenerationError::MalformedResponse(format!(
                "Module {} has no lessons",
                mi
            )));
        }

        for (li, lesson) in module.lessons.iter().enumerate() {
            let quiz = &lesson.quiz;

            if quiz.questions.is_empty() {
                return Err(GenerationError::MalformedResponse(format!(
                    "Quiz in module {} lesson {} has no questions",
                    mi, li
                )));
            }

            if quiz.passing_score > 100 {
                return Err(GenerationError::MalformedResponse(format!(
                    "Quiz in module {} lesson {} has passing score {} > 100",
                    mi, li, quiz.passing_score
                )));
            }

            for (qi, question) in quiz.questions.iter().enumerate() {
                if question.options.len() != 4 {
                    return Err(GenerationError::MalformedResponse(format!(
                        "Question {} in module {} lesson {} has {} options, expected 4",
                        qi,
                        mi,
                        li,
                        question.options.len()
                    )));
                }

                if question.correct_answer >= question.options.len() {
                    return Err(GenerationError::MalformedResponse(format!(
                        "Question {} in module {} lesson {} has out-of-range answer index {}",
                        qi, mi, li, question.correct_answer
                    )));
                }
            }
        }
    }

    Ok(())
}

/// The prompt pins down the exact JSON shape so the reply deserializes
/// straight into [`AiGeneratedPath`].
pub fn build_prompt(goal: &str) -> String {
    format!(
        r#"You are an expert curriculum designer. Create a complete, personalized learning path for the following goal:

"{goal}"

Respond with ONLY a valid JSON object, no markdown fences and no commentary, in exactly this shape:

{{
  "title": "string - concise path title",
  "description": "string - 2-3 sentence overview",
  "difficulty": "beginner" | "intermediate" | "advanced",
  "estimatedHours": number,
  "modules": [
    {{
      "title": "string",
      "description": "string",
      "estimatedHours": number,
      "lessons": [
        {{
          "title": "string",
          "content": "string - full lesson text in markdown, at least 300 words",
          "objectives": ["string", "..."],
          "resources": [
            {{ "title": "string", "url": "string", "type": "video" | "article" | "documentation" | "course" | "tutorial" }}
          ],
          "quiz": {{
            "questions": [
              {{
                "question": "string",
                "options": ["string", "string", "string", "string"],
                "correctAnswer": 0,
                "explanation": "string"
              }}
            ],
            "passingScore": 70
          }}
        }}
      ]
    }}
  ]
}}

Requirements:
- 3 to 6 modules, ordered from fundamentals to advanced topics
- 2 to 5 lessons per module
- Every lesson has a quiz with 3 to 5 multiple-choice questions
- Every question has exactly 4 options and correctAnswer is the 0-based index of the right one
- Resource URLs must point to real, well-known sites
- Tailor depth and pacing to the stated goal"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::learning_path::{
        AiGeneratedLesson, AiGeneratedModule, AiGeneratedQuiz, DifficultyLevel, Question,
    };

    fn sample_path() -> AiGeneratedPath {
        AiGeneratedPath {
            title: "Learn Rust".to_string(),
            description: "A path".to_string(),
            difficulty: DifficultyLevel::Beginner,
            estimated_hours: 20.0,
            modules: vec![AiGeneratedModule {
                title: "Basics".to_string(),
                description: "Syntax".to_string(),
                estimated_hours: 5.0,
                lessons: vec![AiGeneratedLesson {
                    title: "Hello".to_string(),
                    content: "...".to_string(),
                    objectives: vec![],
                    resources: vec![],
                    quiz: AiGeneratedQuiz {
                        questions: vec![Question {
                            question: "?".to_string(),
                            options: vec![
                                "a".to_string(),
                                "b".to_string(),
                                "c".to_string(),
                                "d".to_string(),
                            ],
                            correct_answer: 1,
                            explanation: "because".to_string(),
                        }],
                        passing_score: 70,
                    },
                }],
            }],
        }
    }

    #[test]
    fn extract_json_handles_bare_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn extract_json_strips_markdown_fences() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced), Some("{\"a\": 1}"));

        let plain_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(plain_fence), Some("{\"a\": 1}"));
    }

    #[test]
    fn extract_json_tolerates_surrounding_prose() {
        let chatty = "Here is your path:\n{\"a\": 1}\nHope this helps!";
        assert_eq!(extract_json(chatty), Some("{\"a\": 1}"));
    }

    #[test]
    fn extract_json_rejects_text_without_object() {
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn validate_accepts_well_formed_path() {
        assert!(validate_generated_path(&sample_path()).is_ok());
    }

    #[test]
    fn validate_rejects_empty_modules() {
        let mut path = sample_path();
        path.modules.clear();
        assert!(matches!(
            validate_generated_path(&path),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn validate_rejects_module_without_lessons() {
        let mut path = sample_path();
        path.modules[0].lessons.clear();
        assert!(validate_generated_path(&path).is_err());
    }

    #[test]
    fn validate_rejects_wrong_option_count() {
        let mut path = sample_path();
        path.modules[0].lessons[0].quiz.questions[0]
            .options
            .pop();
        assert!(validate_generated_path(&path).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_answer() {
        let mut path = sample_path();
        path.modules[0].lessons[0].quiz.questions[0].correct_answer = 4;
        assert!(validate_generated_path(&path).is_err());
    }

    #[test]
    fn prompt_embeds_the_goal() {
        let prompt = build_prompt("become a backend engineer");
        assert!(prompt.contains("become a backend engineer"));
        assert!(prompt.contains("correctAnswer"));
    }
}
