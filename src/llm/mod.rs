//! Chat-completion client for an OpenAI-compatible API.

pub mod prompts;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmSettings;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Could not reach the service at all. Retryable.
    #[error("LLM request failed: {0}")]
    Connection(String),
    /// The service answered with a non-success status. Not retryable.
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("unexpected LLM response: {0}")]
    Parse(String),
    /// No API key configured for the service.
    #[error("missing LLM API key")]
    MissingKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Thin client over the `/chat/completions` endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings.api_key.clone().ok_or(LlmError::MissingKey)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
        })
    }

    /// Point the client at a different base URL. For tests.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send one chat completion and return the assistant's content.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("empty choices".to_string()))?;
        debug!("LLM returned {} chars", content.len());
        Ok(content)
    }
}

/// Strip a Markdown code fence from a model answer. Handles both
/// ```json and bare ``` fences; anything else passes through.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_url: &str) -> LlmSettings {
        LlmSettings {
            api_url: api_url.to_string(),
            api_key: Some("test-key".to_string()),
            ..LlmSettings::default()
        }
    }

    #[test]
    fn missing_key_is_rejected_up_front() {
        let no_key = LlmSettings {
            api_key: None,
            ..LlmSettings::default()
        };
        assert!(matches!(ChatClient::new(&no_key), Err(LlmError::MissingKey)));
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  [\"a\"]  "), "[\"a\"]");
    }

    #[tokio::test]
    async fn completes_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"[\"白金卡\"]"}}]}"#,
            )
            .create_async()
            .await;

        let client = ChatClient::new(&settings("https://api.example.com"))
            .unwrap()
            .with_base_url(&server.url());
        let content = client
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(content, "[\"白金卡\"]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = ChatClient::new(&settings("https://api.example.com"))
            .unwrap()
            .with_base_url(&server.url());
        let err = client
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }
}
