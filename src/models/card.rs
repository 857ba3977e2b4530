//! Pipeline-internal card records, not yet validated against the
//! canonical schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Dom,
    Api,
    SearchLlm,
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionSource::Dom => write!(f, "dom"),
            ExtractionSource::Api => write!(f, "api"),
            ExtractionSource::SearchLlm => write!(f, "search_llm"),
        }
    }
}

/// One card benefit as extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub title: String,
    pub description: String,
}

impl Benefit {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// One application requirement as extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub title: String,
    pub content: String,
}

impl Requirement {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Detail fields fetched for a single card, merged into the partial
/// record the list phase produced.
#[derive(Debug, Clone, Default)]
pub struct CardDetail {
    pub card_type: Option<String>,
    pub level: Option<String>,
    pub annual_fee: Option<String>,
    pub benefits: Vec<Benefit>,
    pub requirements: Vec<Requirement>,
    pub points_rule: Option<String>,
    pub credit_limit: Option<String>,
}

/// Unvalidated card attributes as one extraction step produced them.
///
/// Owned by the extraction step until handed to the orchestrator, which
/// owns the transformation into a canonical card and the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCardRecord {
    pub bank_name: String,
    pub card_name: String,
    /// Identifier used to fetch card detail (href fragment, API id, or
    /// the card name for the search strategy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    /// Raw annual-fee text; structured at persistence time.
    #[serde(default)]
    pub annual_fee: Option<String>,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub points_rule: Option<String>,
    #[serde(default)]
    pub credit_limit: Option<String>,
    pub source: ExtractionSource,
    pub extracted_at: DateTime<Utc>,
}

impl RawCardRecord {
    pub fn new(bank_name: &str, card_name: &str, source: ExtractionSource) -> Self {
        Self {
            bank_name: bank_name.to_string(),
            card_name: card_name.to_string(),
            card_id: None,
            card_type: None,
            level: None,
            annual_fee: None,
            benefits: Vec::new(),
            requirements: Vec::new(),
            points_rule: None,
            credit_limit: None,
            source,
            extracted_at: Utc::now(),
        }
    }

    /// Overlay detail-phase fields onto this record. Detail values win
    /// where present; list-phase values survive where the detail page
    /// had nothing.
    pub fn apply_detail(&mut self, detail: CardDetail) {
        if detail.card_type.is_some() {
            self.card_type = detail.card_type;
        }
        if detail.level.is_some() {
            self.level = detail.level;
        }
        if detail.annual_fee.is_some() {
            self.annual_fee = detail.annual_fee;
        }
        if !detail.benefits.is_empty() {
            self.benefits = detail.benefits;
        }
        if !detail.requirements.is_empty() {
            self.requirements = detail.requirements;
        }
        if detail.points_rule.is_some() {
            self.points_rule = detail.points_rule;
        }
        if detail.credit_limit.is_some() {
            self.credit_limit = detail.credit_limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_detail_keeps_list_fields_when_detail_is_empty() {
        let mut record = RawCardRecord::new("测试银行", "测试卡", ExtractionSource::Dom);
        record.card_type = Some("金卡".to_string());

        record.apply_detail(CardDetail::default());

        assert_eq!(record.card_type.as_deref(), Some("金卡"));
        assert!(record.benefits.is_empty());
    }

    #[test]
    fn apply_detail_overlays_present_fields() {
        let mut record = RawCardRecord::new("测试银行", "测试卡", ExtractionSource::Dom);
        record.card_type = Some("金卡".to_string());

        record.apply_detail(CardDetail {
            annual_fee: Some("首年免年费".to_string()),
            benefits: vec![Benefit::new("机场贵宾厅", "每年6次")],
            ..Default::default()
        });

        assert_eq!(record.card_type.as_deref(), Some("金卡"));
        assert_eq!(record.annual_fee.as_deref(), Some("首年免年费"));
        assert_eq!(record.benefits.len(), 1);
    }
}
