//! Per-bank extraction strategy configuration.
//!
//! The registry is configuration-driven: each bank name maps to one
//! strategy variant, never runtime type inspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// CSS selector set for a DOM-scraped bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomSelectors {
    /// Card listing page.
    pub list_url: String,
    /// One card entry on the listing page.
    pub card_item: String,
    pub card_name: String,
    pub card_type: String,
    /// Anchor inside a card entry whose href carries the card id.
    pub detail_link: String,
    /// Detail page URL with `{card_id}` placeholder.
    pub detail_url: String,
    /// Root element of the detail content.
    pub detail_root: String,
    pub annual_fee: String,
    pub benefit_item: String,
    pub benefit_title: String,
    pub benefit_desc: String,
    pub requirement_item: String,
    pub requirement_title: String,
    pub requirement_content: String,
}

/// Endpoints and request shape for a bank with a JSON card API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    pub list_url: String,
    pub detail_url: String,
    pub origin: String,
    pub referer: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    50
}

/// Extraction strategy for one bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Scrape a known page structure with the browser fetcher.
    Dom(DomSelectors),
    /// Call a discovered JSON endpoint directly.
    Api(ApiEndpoints),
    /// Discover card names via web search, extract fields via LLM.
    SearchLlm,
}

/// Default strategy table mirroring the strategies the sources support:
/// ICBC exposes a scrapable card listing, BOC a JSON API, everything
/// else goes through search+LLM.
pub fn default_strategies() -> BTreeMap<String, StrategyConfig> {
    let mut strategies = BTreeMap::new();
    strategies.insert(
        "中国工商银行".to_string(),
        StrategyConfig::Dom(DomSelectors {
            list_url: "https://www.icbc.com.cn/ICBC/信用卡/卡片世界".to_string(),
            card_item: ".card-list .card-item".to_string(),
            card_name: ".card-name".to_string(),
            card_type: ".card-type".to_string(),
            detail_link: "a".to_string(),
            detail_url: "https://www.icbc.com.cn/ICBC/信用卡/卡片世界/{card_id}.htm".to_string(),
            detail_root: ".card-detail".to_string(),
            annual_fee: ".annual-fee".to_string(),
            benefit_item: ".benefit-item".to_string(),
            benefit_title: ".benefit-title".to_string(),
            benefit_desc: ".benefit-desc".to_string(),
            requirement_item: ".requirement-item".to_string(),
            requirement_title: ".req-title".to_string(),
            requirement_content: ".req-content".to_string(),
        }),
    );
    strategies.insert(
        "中国银行".to_string(),
        StrategyConfig::Api(ApiEndpoints {
            list_url: "https://www.boc.cn/bcservice/api/credit-card/list".to_string(),
            detail_url: "https://www.boc.cn/bcservice/api/credit-card/detail".to_string(),
            origin: "https://www.boc.cn".to_string(),
            referer: "https://www.boc.cn/bcservice/credit-card/".to_string(),
            page_size: 50,
        }),
    );
    strategies
}
