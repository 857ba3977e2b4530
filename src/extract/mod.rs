//! Per-bank card extraction strategies.
//!
//! Every strategy implements the same two-phase contract: a card list
//! first, then a detail lookup per card. The generic crawl loop owns
//! pacing and the list/detail merge so strategies stay small.

pub mod api;
pub mod dom;
pub mod search_llm;

pub use api::ApiCardExtractor;
pub use dom::DomCardExtractor;
pub use search_llm::SearchLlmExtractor;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CrawlPolicy;
use crate::models::{CardDetail, RawCardRecord};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The strategy could not reach its source at all.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The source answered but not with anything usable.
    #[error("unusable response: {0}")]
    Unusable(String),
    /// A prerequisite (browser, API key) is missing for the whole run.
    #[error("{0}")]
    Unavailable(String),
}

/// One bank's extraction strategy: list cards, then enrich each with a
/// detail lookup.
#[async_trait]
pub trait CardExtractor: Send {
    fn bank_name(&self) -> &str;

    /// Phase one: the partial card records, each carrying a `card_id`
    /// when a detail lookup is possible.
    async fn card_list(&mut self) -> Result<Vec<RawCardRecord>, ExtractError>;

    /// Phase two: detail fields for one card. `None` means the detail
    /// lookup failed softly; `requires_detail` decides whether the
    /// list-phase record still stands.
    async fn card_detail(&mut self, card_id: &str) -> Result<Option<CardDetail>, ExtractError>;

    /// Delay range between detail lookups, milliseconds.
    fn pacing(&self, policy: &CrawlPolicy) -> (u64, u64) {
        policy.request_delay_ms
    }

    /// Whether a record without a detail result is worth keeping.
    /// Strategies whose list phase already carries real fields keep the
    /// partial record; strategies where the detail IS the data drop it.
    fn requires_detail(&self) -> bool {
        false
    }

    /// Release any held resources. Called exactly once after a crawl.
    async fn close(&mut self) {}
}

/// Drive one extractor through the list-then-detail loop.
///
/// Detail failures degrade to the partial record; only a failing list
/// phase fails the bank.
pub async fn crawl_bank(
    extractor: &mut dyn CardExtractor,
    policy: &CrawlPolicy,
) -> Result<Vec<RawCardRecord>, ExtractError> {
    let bank = extractor.bank_name().to_string();
    let cards = extractor.card_list().await?;
    info!("{}: {} cards listed", bank, cards.len());

    let pacing = extractor.pacing(policy);
    let mut records = Vec::with_capacity(cards.len());
    for mut record in cards {
        if let Some(card_id) = record.card_id.clone() {
            crate::config::sleep_range(pacing).await;
            match extractor.card_detail(&card_id).await {
                Ok(Some(detail)) => record.apply_detail(detail),
                Ok(None) if extractor.requires_detail() => {
                    debug!("{}: no detail for {}, card dropped", bank, record.card_name);
                    continue;
                }
                Ok(None) => {
                    debug!("{}: no detail for {}", bank, record.card_name);
                }
                Err(e) if extractor.requires_detail() => {
                    warn!(
                        "{}: detail lookup failed for {}, card dropped: {}",
                        bank, record.card_name, e
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        "{}: detail lookup failed for {}, keeping partial record: {}",
                        bank, record.card_name, e
                    );
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}
