//! Canonical persisted card representation, unique on `(bank, name)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::Requirement;

/// Structured annual-fee policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualFee {
    /// First-year fee, e.g. "免年费".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_year: Option<String>,
    /// Ongoing fee, or the whole raw text when it could not be split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular: Option<String>,
    /// Waiver condition, e.g. "刷卡满6次免次年年费".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver_condition: Option<String>,
}

impl AnnualFee {
    pub fn is_empty(&self) -> bool {
        self.first_year.is_none() && self.regular.is_none() && self.waiver_condition.is_none()
    }
}

/// Structured application condition distilled from the raw requirement
/// list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

/// The validated, persisted card entity.
///
/// Created on first import of a `(bank, name)` pair; later imports of
/// the same key overwrite fields and bump `updated_at`. The pipeline
/// never deletes rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCard {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    pub bank: String,
    pub name: String,
    pub card_type: Option<String>,
    pub level: Option<String>,
    pub annual_fee: AnnualFee,
    pub points_rule: Option<String>,
    /// Flattened "title：description" strings, extraction order kept.
    pub benefits: Vec<String>,
    /// Raw requirement pairs as extracted.
    pub requirements: Vec<Requirement>,
    pub credit_limit: Option<String>,
    pub application_condition: ApplicationCondition,
    pub foreign_transaction_fee: Option<String>,
    pub card_organization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
