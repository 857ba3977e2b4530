//! Web search client for a Serper-shaped JSON API.
//!
//! Responses are kept as raw JSON: the whole result payload gets
//! forwarded to the LLM, so there is nothing to gain from typing it.

use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::SearchSettings;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Could not reach the service at all. Retryable.
    #[error("search request failed: {0}")]
    Connection(String),
    /// The service answered with a non-success status. Not retryable.
    #[error("search API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected search response: {0}")]
    Parse(String),
    #[error("missing search API key")]
    MissingKey,
}

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    gl: String,
    hl: String,
}

impl SearchClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, SearchError> {
        let api_key = settings.api_key.clone().ok_or(SearchError::MissingKey)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key,
            gl: settings.gl.clone(),
            hl: settings.hl.clone(),
        })
    }

    /// Point the client at a different base URL. For tests.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Run one query and return the organic results as raw JSON.
    pub async fn search(&self, query: &str, num: u32) -> Result<serde_json::Value, SearchError> {
        let url = format!("{}/search", self.base_url);
        let body = json!({
            "q": query,
            "gl": self.gl,
            "hl": self.hl,
            "num": num,
        });

        let response = self
            .http
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;
        let organic = payload
            .get("organic")
            .cloned()
            .unwrap_or_else(|| json!([]));
        debug!(
            "Search {:?}: {} organic results",
            query,
            organic.as_array().map(|a| a.len()).unwrap_or(0)
        );
        Ok(organic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SearchSettings {
        SearchSettings {
            api_key: Some("test-key".to_string()),
            ..SearchSettings::default()
        }
    }

    #[test]
    fn missing_key_is_rejected_up_front() {
        let no_key = SearchSettings {
            api_key: None,
            ..SearchSettings::default()
        };
        assert!(matches!(
            SearchClient::new(&no_key),
            Err(SearchError::MissingKey)
        ));
    }

    #[tokio::test]
    async fn returns_organic_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"organic":[{"title":"白金卡","link":"https://x","snippet":"s"}]}"#)
            .create_async()
            .await;

        let client = SearchClient::new(&settings())
            .unwrap()
            .with_base_url(&server.url());
        let results = client.search("测试银行信用卡 site:.cn", 10).await.unwrap();
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["title"], "白金卡");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_organic_section_is_an_empty_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"searchParameters":{}}"#)
            .create_async()
            .await;

        let client = SearchClient::new(&settings())
            .unwrap()
            .with_base_url(&server.url());
        let results = client.search("anything", 5).await.unwrap();
        assert_eq!(results.as_array().unwrap().len(), 0);
    }
}
