//! Writing assistant backed by an OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::AssistantConfig;
use crate::error::ApiError;

const BREAKDOWN_SYSTEM_PROMPT: &str = "You are a helpful assistant that breaks down complex tasks into clear, \
actionable steps. Each step should be specific, achievable, and sequential. Return a JSON object \
with a `steps` array of step descriptions as strings.";

const WRITING_SYSTEM_PROMPT: &str = "You are a careful editor. Rewrite the user's text following their \
instruction. Keep the meaning, keep it concise, and reply with the rewritten text only.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("the writing assistant is not configured (set OPENAI_API_KEY)")]
    NotConfigured,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("assistant request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("assistant API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected assistant response: {0}")]
    Malformed(String),
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::InvalidInput(message) => Self::BadRequest(message.to_string()),
            other => {
                tracing::warn!(error = %other, "Writing assistant call failed");
                Self::Upstream(other.to_string())
            }
        }
    }
}

pub type AssistantResult<T> = Result<T, AssistantError>;

/// AI helpers exposed under `/api/v1/ai`.
#[async_trait]
pub trait WritingAssistant: Send + Sync + std::fmt::Debug {
    /// Splits a task into 5 to 8 sequential steps.
    async fn breakdown_task(&self, description: &str) -> AssistantResult<Vec<String>>;

    /// Rewrites `text` according to `instruction`.
    async fn improve_writing(&self, text: &str, instruction: &str) -> AssistantResult<String>;
}

/// OpenAI-compatible API driver.
#[derive(Debug, Clone)]
pub struct OpenAiAssistant {
    settings: AssistantConfig,
    client: Client,
}

impl OpenAiAssistant {
    pub fn new(settings: AssistantConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn is_configured(&self) -> bool {
        self.settings.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Sends one completion request and returns the first choice's text.
    async fn complete(&self, system: &str, user: &str, response_format: Option<Value>) -> AssistantResult<String> {
        let Some(api_key) = self.settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Err(AssistantError::NotConfigured);
        };

        let mut body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        if let Some(format) = response_format {
            body["response_format"] = format;
        }

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api { status, body });
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AssistantError::Malformed("no content in response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Steps {
    steps: Vec<String>,
}

fn breakdown_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "task_breakdown",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "steps": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Array of step descriptions"
                    }
                },
                "required": ["steps"],
                "additionalProperties": false
            }
        }
    })
}

#[async_trait]
impl WritingAssistant for OpenAiAssistant {
    async fn breakdown_task(&self, description: &str) -> AssistantResult<Vec<String>> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AssistantError::InvalidInput("taskDescription must not be empty"));
        }

        let content = self
            .complete(
                BREAKDOWN_SYSTEM_PROMPT,
                &format!("Break down this task into 5-8 manageable steps: {description}"),
                Some(breakdown_schema()),
            )
            .await?;
        let parsed: Steps =
            serde_json::from_str(&content).map_err(|e| AssistantError::Malformed(e.to_string()))?;

        let steps: Vec<String> = parsed
            .steps
            .into_iter()
            .map(|step| step.trim().to_string())
            .filter(|step| !step.is_empty())
            .collect();
        tracing::debug!(steps = steps.len(), "Task broken down");
        Ok(steps)
    }

    async fn improve_writing(&self, text: &str, instruction: &str) -> AssistantResult<String> {
        if text.trim().is_empty() {
            return Err(AssistantError::InvalidInput("text must not be empty"));
        }
        let instruction = match instruction.trim() {
            "" => "Improve clarity and readability.",
            given => given,
        };

        let improved = self
            .complete(
                WRITING_SYSTEM_PROMPT,
                &format!("Instruction: {instruction}\n\nText:\n{text}"),
                None,
            )
            .await?;
        Ok(improved.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{Json, Router, http::{HeaderMap, StatusCode}, routing::post};
    use parking_lot::Mutex;

    fn settings(base_url: &str, api_key: Option<&str>) -> AssistantConfig {
        AssistantConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(String::from),
            ..AssistantConfig::default()
        }
    }

    /// Upstream stand-in on an ephemeral port. Replies with `status` and
    /// `reply`, and keeps the last request body and auth header.
    #[derive(Debug, Clone, Default)]
    struct Upstream {
        last_body: Arc<Mutex<Option<Value>>>,
        last_auth: Arc<Mutex<Option<String>>>,
    }

    impl Upstream {
        async fn serve(&self, status: StatusCode, reply: Value) -> String {
            let seen = self.clone();
            let app = Router::new().route(
                "/v1/chat/completions",
                post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                    *seen.last_auth.lock() = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *seen.last_body.lock() = Some(body);
                    (status, Json(reply))
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}/")
        }
    }

    fn completion(content: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[tokio::test]
    async fn unconfigured_assistant_is_reported() {
        let assistant = OpenAiAssistant::new(settings("http://127.0.0.1:9", None)).unwrap();
        assert!(!assistant.is_configured());
        let err = assistant.breakdown_task("Plan a trip").await.unwrap_err();
        assert!(matches!(err, AssistantError::NotConfigured));
        assert!(matches!(ApiError::from(err), ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn empty_input_is_a_bad_request() {
        let assistant = OpenAiAssistant::new(settings("http://127.0.0.1:9", Some("sk-test"))).unwrap();
        let err = assistant.breakdown_task("   ").await.unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));
        let err = assistant.improve_writing("", "shorter").await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn breakdown_parses_structured_steps() {
        let upstream = Upstream::default();
        let base = upstream
            .serve(StatusCode::OK, completion(r#"{"steps": ["Pick dates", " Book train ", ""]}"#))
            .await;
        let assistant = OpenAiAssistant::new(settings(&base, Some("sk-test"))).unwrap();
        let steps = assistant.breakdown_task("  Plan a trip ").await.unwrap();
        assert_eq!(steps, vec!["Pick dates".to_string(), "Book train".to_string()]);

        let body = upstream.last_body.lock().clone().unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"],
            "Break down this task into 5-8 manageable steps: Plan a trip"
        );
        assert_eq!(body["response_format"]["json_schema"]["name"], "task_breakdown");
        assert_eq!(upstream.last_auth.lock().as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn improve_writing_returns_trimmed_text() {
        let upstream = Upstream::default();
        let base = upstream.serve(StatusCode::OK, completion("  A clearer sentence.\n")).await;
        let assistant = OpenAiAssistant::new(settings(&base, Some("sk-test"))).unwrap();
        let text = assistant.improve_writing("a sentence that unclear", "").await.unwrap();
        assert_eq!(text, "A clearer sentence.");

        let body = upstream.last_body.lock().clone().unwrap();
        assert!(body.get("response_format").is_none());
        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.starts_with("Instruction: Improve clarity and readability."));
    }

    #[tokio::test]
    async fn upstream_errors_keep_status_and_body() {
        let upstream = Upstream::default();
        let base = upstream
            .serve(
                StatusCode::TOO_MANY_REQUESTS,
                json!({"error": {"message": "quota exceeded"}}),
            )
            .await;
        let assistant = OpenAiAssistant::new(settings(&base, Some("sk-test"))).unwrap();
        let err = assistant.breakdown_task("Plan a trip").await.unwrap_err();
        match &err {
            AssistantError::Api { status, body } => {
                assert_eq!(*status, 429);
                assert!(body.contains("quota exceeded"));
            }
            other => panic!("expected an API error, got {other:?}"),
        }
        assert!(matches!(ApiError::from(err), ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn unusable_replies_are_malformed() {
        let empty = Upstream::default();
        let base = empty.serve(StatusCode::OK, json!({"choices": []})).await;
        let assistant = OpenAiAssistant::new(settings(&base, Some("sk-test"))).unwrap();
        let err = assistant.improve_writing("Some text", "shorter").await.unwrap_err();
        assert!(matches!(err, AssistantError::Malformed(_)));

        let prose = Upstream::default();
        let base = prose.serve(StatusCode::OK, completion("1. Pick dates 2. Book train")).await;
        let assistant = OpenAiAssistant::new(settings(&base, Some("sk-test"))).unwrap();
        let err = assistant.breakdown_task("Plan a trip").await.unwrap_err();
        assert!(matches!(err, AssistantError::Malformed(_)));
    }
}
