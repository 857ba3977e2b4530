//! Bank targets and located credit-card pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static per-bank crawl configuration. Immutable at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTarget {
    /// Display name of the bank, also the strategy-registry key.
    pub name: String,
    /// Bank homepage, used for link discovery and relative-href resolution.
    pub homepage_url: String,
    /// Likely credit-card section URLs, tried in order before discovery.
    #[serde(default)]
    pub candidate_urls: Vec<String>,
    /// Keywords used to find a credit-card link on the homepage.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl BankTarget {
    pub fn new(name: &str, homepage_url: &str) -> Self {
        Self {
            name: name.to_string(),
            homepage_url: homepage_url.to_string(),
            candidate_urls: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_candidates(mut self, urls: &[&str]) -> Self {
        self.candidate_urls = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// How a credit-card page was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// One of the pre-configured candidate URLs verified.
    CandidateUrl,
    /// Found by keyword link discovery on the bank homepage.
    HomepageLink,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryMethod::CandidateUrl => write!(f, "candidate_url"),
            DiscoveryMethod::HomepageLink => write!(f, "homepage_link"),
        }
    }
}

/// A verified credit-card page for one bank. Produced at most once per
/// bank per run; later runs produce new instances rather than updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedPage {
    pub bank_name: String,
    pub url: String,
    pub discovery_method: DiscoveryMethod,
    pub discovered_at: DateTime<Utc>,
}

impl LocatedPage {
    pub fn new(bank_name: &str, url: &str, discovery_method: DiscoveryMethod) -> Self {
        Self {
            bank_name: bank_name.to_string(),
            url: url.to_string(),
            discovery_method,
            discovered_at: Utc::now(),
        }
    }
}
