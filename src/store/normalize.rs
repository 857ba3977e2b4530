//! Raw-record to canonical-card transformation.
//!
//! Runs at persistence time so extraction strategies stay free to emit
//! whatever raw text their source gives them.

use thiserror::Error;

use crate::models::{
    AnnualFee, ApplicationCondition, CanonicalCard, RawCardRecord, Requirement,
};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record has no bank name")]
    MissingBank,
    #[error("record has no card name")]
    MissingName,
}

/// Validate a raw record and shape it into the canonical card.
pub fn normalize(record: &RawCardRecord) -> Result<CanonicalCard, NormalizeError> {
    let bank = record.bank_name.trim();
    if bank.is_empty() {
        return Err(NormalizeError::MissingBank);
    }
    let name = record.card_name.trim();
    if name.is_empty() {
        return Err(NormalizeError::MissingName);
    }

    let benefits = record
        .benefits
        .iter()
        .map(|b| {
            if b.description.is_empty() {
                b.title.clone()
            } else if b.title.is_empty() {
                b.description.clone()
            } else {
                format!("{}：{}", b.title, b.description)
            }
        })
        .collect();

    let now = chrono::Utc::now();
    Ok(CanonicalCard {
        id: None,
        bank: bank.to_string(),
        name: name.to_string(),
        card_type: record.card_type.clone(),
        level: record.level.clone(),
        annual_fee: parse_annual_fee(record.annual_fee.as_deref()),
        points_rule: record.points_rule.clone(),
        benefits,
        requirements: record.requirements.clone(),
        credit_limit: record.credit_limit.clone(),
        application_condition: distill_application_condition(&record.requirements),
        foreign_transaction_fee: None,
        card_organization: record.card_type.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Split a raw annual-fee sentence into its structured parts. Clauses
/// mentioning the first year go to `first_year`, waiver clauses to
/// `waiver_condition`, the rest to `regular`. Text that does not split
/// lands in `regular` whole.
pub fn parse_annual_fee(raw: Option<&str>) -> AnnualFee {
    let Some(raw) = raw else {
        return AnnualFee::default();
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return AnnualFee::default();
    }

    let mut fee = AnnualFee::default();
    let clauses: Vec<&str> = raw
        .split(['，', ',', '；', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    for clause in &clauses {
        if clause.contains("首年") && fee.first_year.is_none() {
            fee.first_year = Some(clause.to_string());
        } else if clause.contains('免') && fee.waiver_condition.is_none() {
            fee.waiver_condition = Some(clause.to_string());
        } else if fee.regular.is_none() {
            fee.regular = Some(clause.to_string());
        }
    }
    if fee.is_empty() {
        fee.regular = Some(raw.to_string());
    }
    fee
}

/// Pull income, credit and age clauses out of the requirement list.
pub fn distill_application_condition(requirements: &[Requirement]) -> ApplicationCondition {
    let mut condition = ApplicationCondition::default();
    for req in requirements {
        let text = if req.content.is_empty() {
            req.title.clone()
        } else {
            format!("{}：{}", req.title, req.content)
        };
        let probe = format!("{}{}", req.title, req.content);
        if condition.income.is_none()
            && (probe.contains("收入") || probe.contains("年薪") || probe.contains("工资"))
        {
            condition.income = Some(text);
        } else if condition.credit_score.is_none()
            && (probe.contains("信用") || probe.contains("征信"))
        {
            condition.credit_score = Some(text);
        } else if condition.age.is_none()
            && (probe.contains("年龄") || probe.contains("周岁") || probe.contains('岁'))
        {
            condition.age = Some(text);
        }
    }
    condition
}
