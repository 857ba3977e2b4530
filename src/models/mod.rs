//! Data models for the card acquisition pipeline.

mod bank;
mod canonical;
mod card;

pub use bank::{BankTarget, DiscoveryMethod, LocatedPage};
pub use canonical::{AnnualFee, ApplicationCondition, CanonicalCard};
pub use card::{Benefit, CardDetail, ExtractionSource, RawCardRecord, Requirement};
