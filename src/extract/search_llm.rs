//! Search+LLM extraction for banks without a scrapable page or API.
//!
//! Two phases, both grounded in web search results: first discover the
//! bank's card names, then extract one card's fields from a focused
//! per-card query. The model must answer with bare JSON; an answer that
//! does not decode discards that step, never the whole run.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CrawlPolicy, SearchSettings};
use crate::llm::prompts::{card_detail_prompt, card_names_prompt, SYSTEM_PROMPT};
use crate::llm::{strip_code_fence, ChatClient, ChatMessage, LlmError};
use crate::models::{Benefit, CardDetail, ExtractionSource, RawCardRecord, Requirement};
use crate::search::{SearchClient, SearchError};

use super::{CardExtractor, ExtractError};

pub struct SearchLlmExtractor {
    bank_name: String,
    search: SearchClient,
    llm: ChatClient,
    policy: CrawlPolicy,
    name_results: u32,
    detail_results: u32,
}

impl SearchLlmExtractor {
    pub fn new(
        bank_name: &str,
        search: SearchClient,
        llm: ChatClient,
        policy: &CrawlPolicy,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            bank_name: bank_name.to_string(),
            search,
            llm,
            policy: policy.clone(),
            name_results: settings.name_results,
            detail_results: settings.detail_results,
        }
    }

    /// Search with a fixed-backoff retry on connection failures only.
    async fn search_with_retry(&self, query: &str, num: u32) -> Result<Value, ExtractError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.search.search(query, num).await {
                Ok(results) => return Ok(results),
                Err(SearchError::Connection(message))
                    if attempt < self.policy.transport_retries =>
                {
                    warn!(
                        "{}: search attempt {}/{} failed: {}",
                        self.bank_name, attempt, self.policy.transport_retries, message
                    );
                    self.policy.pause_transport_retry().await;
                }
                Err(SearchError::Connection(message)) => {
                    return Err(ExtractError::Transport(message))
                }
                Err(e) => return Err(ExtractError::Unusable(e.to_string())),
            }
        }
    }

    /// Chat completion with the same connection-only retry.
    async fn complete_with_retry(&self, prompt: &str) -> Result<String, ExtractError> {
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.llm.complete(&messages).await {
                Ok(content) => return Ok(content),
                Err(LlmError::Connection(message)) if attempt < self.policy.transport_retries => {
                    warn!(
                        "{}: LLM attempt {}/{} failed: {}",
                        self.bank_name, attempt, self.policy.transport_retries, message
                    );
                    self.policy.pause_transport_retry().await;
                }
                Err(LlmError::Connection(message)) => {
                    return Err(ExtractError::Transport(message))
                }
                Err(e) => return Err(ExtractError::Unusable(e.to_string())),
            }
        }
    }
}

/// Decode the model's card-name answer: a JSON string array, deduped
/// with order kept.
fn parse_card_names(answer: &str) -> Result<Vec<String>, ExtractError> {
    let names: Vec<String> = serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| ExtractError::Unusable(format!("card-name answer not a JSON array: {e}")))?;
    let mut seen = Vec::new();
    for name in names {
        let name = name.trim().to_string();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    Ok(seen)
}

/// Decode the model's detail answer. `None` when the answer is not a
/// JSON object; the list-phase record stands on its own then.
fn parse_card_detail(answer: &str) -> Option<CardDetail> {
    let value: Value = serde_json::from_str(strip_code_fence(answer)).ok()?;
    let object = value.as_object()?;

    let mut detail = CardDetail {
        level: text_field(object.get("level")),
        card_type: text_field(object.get("card_type")),
        annual_fee: text_field(object.get("annual_fee")),
        points_rule: text_field(object.get("points_rule")),
        credit_limit: text_field(object.get("credit_limit")),
        ..Default::default()
    };
    if let Some(benefits) = object.get("benefits").and_then(Value::as_object) {
        for (title, description) in benefits {
            detail
                .benefits
                .push(Benefit::new(title.clone(), stringify(description)));
        }
    }
    if let Some(requirements) = object.get("requirements").and_then(Value::as_object) {
        for (title, content) in requirements {
            detail
                .requirements
                .push(Requirement::new(title.clone(), stringify(content)));
        }
    }
    Some(detail)
}

/// A non-empty textual field; numbers are stringified, null and empty
/// strings are absent.
fn text_field(value: Option<&Value>) -> Option<String> {
    let value = value?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map values the model emits are usually strings, but arrays and
/// numbers show up too.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("；"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CardExtractor for SearchLlmExtractor {
    fn bank_name(&self) -> &str {
        &self.bank_name
    }

    async fn card_list(&mut self) -> Result<Vec<RawCardRecord>, ExtractError> {
        let query = format!("{}信用卡 site:.cn", self.bank_name);
        let results = self.search_with_retry(&query, self.name_results).await?;
        if results.as_array().is_none_or(|a| a.is_empty()) {
            return Err(ExtractError::Unusable(format!(
                "no search results for {:?}",
                query
            )));
        }

        let results_json = serde_json::to_string_pretty(&results)
            .map_err(|e| ExtractError::Unusable(e.to_string()))?;
        let prompt = card_names_prompt(&self.bank_name, &results_json);
        let answer = self.complete_with_retry(&prompt).await?;
        let names = parse_card_names(&answer)?;
        debug!("{}: {} card names discovered", self.bank_name, names.len());

        Ok(names
            .into_iter()
            .map(|name| {
                let mut record =
                    RawCardRecord::new(&self.bank_name, &name, ExtractionSource::SearchLlm);
                // The card name doubles as the detail lookup key.
                record.card_id = Some(name);
                record
            })
            .collect())
    }

    async fn card_detail(&mut self, card_id: &str) -> Result<Option<CardDetail>, ExtractError> {
        let query = format!("{} {} 信用卡 申请条件 权益", self.bank_name, card_id);
        let results = self.search_with_retry(&query, self.detail_results).await?;
        if results.as_array().is_none_or(|a| a.is_empty()) {
            debug!("{}: no search results for {}", self.bank_name, card_id);
            return Ok(None);
        }

        let results_json = serde_json::to_string_pretty(&results)
            .map_err(|e| ExtractError::Unusable(e.to_string()))?;
        let prompt = card_detail_prompt(&self.bank_name, card_id, &results_json);
        let answer = self.complete_with_retry(&prompt).await?;
        let detail = parse_card_detail(&answer);
        if detail.is_none() {
            warn!(
                "{}: detail answer for {} did not decode",
                self.bank_name, card_id
            );
        }
        Ok(detail)
    }

    /// Detail lookups go through the LLM, which gets the longer pacing.
    fn pacing(&self, policy: &CrawlPolicy) -> (u64, u64) {
        policy.llm_delay_ms
    }

    /// The list phase only knows names; a card whose detail never
    /// decodes carries no information worth persisting.
    fn requires_detail(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_names_decode_and_dedupe() {
        let answer = "```json\n[\"白金卡\", \"金卡\", \"白金卡\", \" \"]\n```";
        let names = parse_card_names(answer).unwrap();
        assert_eq!(names, vec!["白金卡", "金卡"]);
    }

    #[test]
    fn card_names_reject_non_array_answers() {
        assert!(parse_card_names("抱歉，我无法回答").is_err());
        assert!(parse_card_names("{\"cards\":[]}").is_err());
    }

    #[test]
    fn detail_answer_decodes_in_declared_order() {
        let answer = r#"{
            "level": "白金卡",
            "card_type": null,
            "annual_fee": "首年免年费，刷卡6次免次年",
            "points_rule": "消费1元累积1分",
            "credit_limit": "5万-20万",
            "benefits": {"机场贵宾厅": "每年6次", "酒店优惠": ["五折", "升房"]},
            "requirements": {"年龄": "18-65周岁"}
        }"#;
        let detail = parse_card_detail(answer).unwrap();
        assert_eq!(detail.level.as_deref(), Some("白金卡"));
        assert_eq!(detail.card_type, None);
        assert_eq!(detail.benefits.len(), 2);
        assert_eq!(detail.benefits[0].title, "机场贵宾厅");
        assert_eq!(detail.benefits[1].description, "五折；升房");
        assert_eq!(detail.requirements[0].title, "年龄");
    }

    #[test]
    fn undecodable_detail_is_a_soft_miss() {
        assert!(parse_card_detail("not json at all").is_none());
        assert!(parse_card_detail("[1,2,3]").is_none());
    }

    fn chat_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn malformed_detail_drops_only_that_card() {
        let mut search_server = mockito::Server::new_async().await;
        search_server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"organic":[{"title":"t","link":"https://x","snippet":"s"}]}"#)
            .expect_at_least(4)
            .create_async()
            .await;

        let mut llm_server = mockito::Server::new_async().await;
        llm_server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::Regex("产品名称".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body("[\"A卡\", \"B卡\", \"C卡\"]"))
            .create_async()
            .await;
        for (card, answer) in [
            ("A卡", "{\"level\": \"金卡\", \"benefits\": {}, \"requirements\": {}}"),
            ("B卡", "抱歉，搜索结果中没有足够的信息。"),
            ("C卡", "```json\n{\"level\": \"白金卡\"}\n```"),
        ] {
            llm_server
                .mock("POST", "/chat/completions")
                .match_body(mockito::Matcher::Regex(format!("测试银行 {card}")))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(chat_body(answer))
                .create_async()
                .await;
        }

        let search = SearchClient::new(&SearchSettings {
            api_key: Some("k".to_string()),
            ..SearchSettings::default()
        })
        .unwrap()
        .with_base_url(&search_server.url());
        let llm = ChatClient::new(&crate::config::LlmSettings {
            api_key: Some("k".to_string()),
            ..crate::config::LlmSettings::default()
        })
        .unwrap()
        .with_base_url(&llm_server.url());

        let policy = CrawlPolicy::immediate();
        let mut extractor = SearchLlmExtractor::new(
            "测试银行",
            search,
            llm,
            &policy,
            &SearchSettings::default(),
        );
        let records = super::super::crawl_bank(&mut extractor, &policy).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.card_name.as_str()).collect();
        assert_eq!(names, vec!["A卡", "C卡"]);
        assert_eq!(records[0].level.as_deref(), Some("金卡"));
        assert_eq!(records[1].level.as_deref(), Some("白金卡"));
    }
}
