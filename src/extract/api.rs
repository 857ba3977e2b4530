//! Extraction through a bank's JSON card API.
//!
//! The endpoint is the one the bank's own card pages call, so requests
//! carry the same origin and referer headers a browser would send. The
//! payload schema is not under our control; field access is defensive
//! and a missing field degrades to an empty value.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::browser::USER_AGENT;
use crate::config::ApiEndpoints;
use crate::models::{Benefit, CardDetail, ExtractionSource, RawCardRecord, Requirement};

use super::{CardExtractor, ExtractError};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope the card API wraps every payload in.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

pub struct ApiCardExtractor {
    bank_name: String,
    endpoints: ApiEndpoints,
    http: reqwest::Client,
}

impl ApiCardExtractor {
    pub fn new(bank_name: &str, endpoints: ApiEndpoints) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| ExtractError::Unavailable(e.to_string()))?;
        Ok(Self {
            bank_name: bank_name.to_string(),
            endpoints,
            http,
        })
    }

    /// One API call. A refusal (non-200 status or a falsy `success`
    /// flag) is `None`, not an error: the bank simply has nothing for
    /// us and the run moves on. Only transport failures are errors.
    async fn call(&self, url: &str, body: Value) -> Result<Option<Value>, ExtractError> {
        let response = self
            .http
            .post(url)
            .header("User-Agent", USER_AGENT)
            .header("Origin", &self.endpoints.origin)
            .header("Referer", &self.endpoints.referer)
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{}: card API returned {} for {}", self.bank_name, status, url);
            return Ok(None);
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| ExtractError::Unusable(e.to_string()))?;
        if !envelope.success {
            warn!(
                "{}: card API refused the request: {}",
                self.bank_name,
                envelope.message.unwrap_or_else(|| "no message".to_string())
            );
            return Ok(None);
        }
        Ok(Some(envelope.data))
    }

    /// First non-empty string under any of the candidate keys.
    fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
        for key in keys {
            if let Some(s) = value.get(*key).and_then(Value::as_str) {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
        None
    }

    /// Card id, tolerating numeric ids.
    fn id_field(value: &Value) -> Option<String> {
        if let Some(id) = Self::str_field(value, &["cardId", "id"]) {
            return Some(id);
        }
        value
            .get("cardId")
            .or_else(|| value.get("id"))
            .and_then(Value::as_i64)
            .map(|n| n.to_string())
    }

    fn titled_pairs(value: &Value, keys: &[&str], title_keys: &[&str], body_keys: &[&str]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for key in keys {
            if let Some(items) = value.get(*key).and_then(Value::as_array) {
                for item in items {
                    let title = Self::str_field(item, title_keys).unwrap_or_default();
                    let body = Self::str_field(item, body_keys).unwrap_or_default();
                    if !title.is_empty() || !body.is_empty() {
                        pairs.push((title, body));
                    }
                }
                break;
            }
        }
        pairs
    }
}

#[async_trait]
impl CardExtractor for ApiCardExtractor {
    fn bank_name(&self) -> &str {
        &self.bank_name
    }

    async fn card_list(&mut self) -> Result<Vec<RawCardRecord>, ExtractError> {
        let body = json!({
            "pageSize": self.endpoints.page_size,
            "pageNum": 1,
            "cardType": "ALL",
        });
        let url = self.endpoints.list_url.clone();
        let Some(data) = self.call(&url, body).await? else {
            return Ok(Vec::new());
        };

        // The list either is the payload or sits under a "list" key.
        let items = data
            .as_array()
            .cloned()
            .or_else(|| data.get("list").and_then(Value::as_array).cloned())
            .unwrap_or_default();

        let mut records = Vec::new();
        for item in &items {
            let Some(name) = Self::str_field(item, &["cardName", "name", "title"]) else {
                debug!("{}: list entry without a card name, skipped", self.bank_name);
                continue;
            };
            let mut record = RawCardRecord::new(&self.bank_name, &name, ExtractionSource::Api);
            record.card_id = Self::id_field(item);
            record.card_type = Self::str_field(item, &["cardType", "type", "organization"]);
            record.level = Self::str_field(item, &["cardLevel", "level", "grade"]);
            records.push(record);
        }
        if records.is_empty() {
            warn!("{}: card API listed no cards", self.bank_name);
        }
        Ok(records)
    }

    async fn card_detail(&mut self, card_id: &str) -> Result<Option<CardDetail>, ExtractError> {
        let body = json!({ "cardId": card_id });
        let url = self.endpoints.detail_url.clone();
        let Some(data) = self.call(&url, body).await? else {
            return Ok(None);
        };
        if data.is_null() {
            return Ok(None);
        }

        let mut detail = CardDetail {
            card_type: Self::str_field(&data, &["cardType", "type", "organization"]),
            level: Self::str_field(&data, &["cardLevel", "level", "grade"]),
            annual_fee: Self::str_field(&data, &["annualFee", "annual_fee", "fee"]),
            points_rule: Self::str_field(&data, &["pointsRule", "points_rule", "points"]),
            credit_limit: Self::str_field(&data, &["creditLimit", "credit_limit", "limit"]),
            ..Default::default()
        };
        detail.benefits = Self::titled_pairs(
            &data,
            &["benefits", "rights"],
            &["title", "name"],
            &["description", "desc", "content"],
        )
        .into_iter()
        .map(|(title, description)| Benefit { title, description })
        .collect();
        detail.requirements = Self::titled_pairs(
            &data,
            &["requirements", "conditions"],
            &["title", "name"],
            &["content", "description", "desc"],
        )
        .into_iter()
        .map(|(title, content)| Requirement { title, content })
        .collect();

        Ok(Some(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(base: &str) -> ApiEndpoints {
        ApiEndpoints {
            list_url: format!("{base}/api/credit-card/list"),
            detail_url: format!("{base}/api/credit-card/detail"),
            origin: "https://bank.example".to_string(),
            referer: "https://bank.example/credit-card/".to_string(),
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn lists_cards_from_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/credit-card/list")
            .match_header("x-requested-with", "XMLHttpRequest")
            .match_header("origin", "https://bank.example")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success":true,"message":null,"data":[
                    {"cardId":"c1","cardName":"长城环球通","cardLevel":"白金卡"},
                    {"cardId":7,"cardName":"都市缤纷卡"},
                    {"cardId":"x"}
                ]}"#,
            )
            .create_async()
            .await;

        let mut extractor = ApiCardExtractor::new("中国银行", endpoints(&server.url())).unwrap();
        let cards = extractor.card_list().await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].card_name, "长城环球通");
        assert_eq!(cards[0].card_id.as_deref(), Some("c1"));
        assert_eq!(cards[0].level.as_deref(), Some("白金卡"));
        assert_eq!(cards[1].card_id.as_deref(), Some("7"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn falsy_success_yields_an_empty_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/credit-card/list")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false,"message":"系统繁忙","data":null}"#)
            .create_async()
            .await;

        let mut extractor = ApiCardExtractor::new("中国银行", endpoints(&server.url())).unwrap();
        assert!(extractor.card_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_200_status_yields_an_empty_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/credit-card/list")
            .with_status(503)
            .create_async()
            .await;

        let mut extractor = ApiCardExtractor::new("中国银行", endpoints(&server.url())).unwrap();
        assert!(extractor.card_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn detail_maps_benefits_and_requirements() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/credit-card/detail")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success":true,"data":{
                    "annualFee":"首年免年费",
                    "benefits":[{"title":"贵宾厅","description":"每年6次"}],
                    "requirements":[{"title":"年龄","content":"18-65周岁"}]
                }}"#,
            )
            .create_async()
            .await;

        let mut extractor = ApiCardExtractor::new("中国银行", endpoints(&server.url())).unwrap();
        let detail = extractor.card_detail("c1").await.unwrap().unwrap();
        assert_eq!(detail.annual_fee.as_deref(), Some("首年免年费"));
        assert_eq!(detail.benefits.len(), 1);
        assert_eq!(detail.benefits[0].title, "贵宾厅");
        assert_eq!(detail.requirements[0].content, "18-65周岁");
    }

    #[tokio::test]
    async fn null_detail_data_is_a_soft_miss() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/credit-card/detail")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":null}"#)
            .create_async()
            .await;

        let mut extractor = ApiCardExtractor::new("中国银行", endpoints(&server.url())).unwrap();
        assert!(extractor.card_detail("c1").await.unwrap().is_none());
    }
}
