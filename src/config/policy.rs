//! Crawl pacing and retry policy.
//!
//! Transport failures back off much longer than the routine
//! inter-request sleeps: a dropped connection usually means the source
//! is rate limiting or blocking, so hammering it again quickly only
//! makes things worse.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlPolicy {
    /// Whole-bank attempts on transport failure.
    #[serde(default = "default_bank_retries")]
    pub bank_retries: u32,
    /// Randomized sleep between routine requests, milliseconds.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: (u64, u64),
    /// Randomized sleep before retrying a failed bank, milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: (u64, u64),
    /// Randomized sleep between LLM card-detail extractions.
    #[serde(default = "default_llm_delay")]
    pub llm_delay_ms: (u64, u64),
    /// Attempts for one search/LLM call on transport failure.
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    /// Fixed backoff between those attempts, milliseconds.
    #[serde(default = "default_transport_retry_delay")]
    pub transport_retry_delay_ms: u64,
}

fn default_bank_retries() -> u32 {
    3
}

fn default_request_delay() -> (u64, u64) {
    (1_000, 3_000)
}

fn default_retry_delay() -> (u64, u64) {
    (5_000, 10_000)
}

fn default_llm_delay() -> (u64, u64) {
    (2_000, 4_000)
}

fn default_transport_retries() -> u32 {
    3
}

fn default_transport_retry_delay() -> u64 {
    2_000
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            bank_retries: default_bank_retries(),
            request_delay_ms: default_request_delay(),
            retry_delay_ms: default_retry_delay(),
            llm_delay_ms: default_llm_delay(),
            transport_retries: default_transport_retries(),
            transport_retry_delay_ms: default_transport_retry_delay(),
        }
    }
}

impl CrawlPolicy {
    /// All delays zeroed and retries kept. For tests.
    pub fn immediate() -> Self {
        Self {
            bank_retries: default_bank_retries(),
            request_delay_ms: (0, 0),
            retry_delay_ms: (0, 0),
            llm_delay_ms: (0, 0),
            transport_retries: default_transport_retries(),
            transport_retry_delay_ms: 0,
        }
    }

    pub async fn pause_request(&self) {
        sleep_range(self.request_delay_ms).await;
    }

    pub async fn pause_retry(&self) {
        sleep_range(self.retry_delay_ms).await;
    }

    pub async fn pause_llm(&self) {
        sleep_range(self.llm_delay_ms).await;
    }

    pub async fn pause_transport_retry(&self) {
        if self.transport_retry_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.transport_retry_delay_ms)).await;
        }
    }
}

/// Sleep a random duration inside the given millisecond range.
pub async fn sleep_range((min, max): (u64, u64)) {
    let ms = if max > min {
        rand::rng().random_range(min..=max)
    } else {
        min
    };
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_is_longer_than_request_pacing() {
        let policy = CrawlPolicy::default();
        assert!(policy.retry_delay_ms.0 > policy.request_delay_ms.1);
    }

    #[tokio::test]
    async fn immediate_policy_does_not_sleep() {
        let policy = CrawlPolicy::immediate();
        let start = std::time::Instant::now();
        policy.pause_request().await;
        policy.pause_retry().await;
        policy.pause_llm().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
