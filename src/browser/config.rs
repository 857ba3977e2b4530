//! Browser fetcher configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User agent presented to bank sites. A desktop Chrome string; the
/// default headless UA is an instant giveaway.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run headless (default true).
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Explicit Chrome binary; common paths are probed when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    /// Extra Chrome arguments appended after the stealth set.
    #[serde(default)]
    pub chrome_args: Vec<String>,
    /// Page load timeout in seconds.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    /// Element lookup timeout in seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
    /// Attempts to launch the browser before giving up for the run.
    #[serde(default = "default_launch_retries")]
    pub launch_retries: u32,
    /// Fixed backoff between launch attempts, seconds.
    #[serde(default = "default_launch_retry_delay")]
    pub launch_retry_delay_secs: u64,
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_page_timeout() -> u64 {
    30
}

fn default_wait_timeout() -> u64 {
    15
}

fn default_launch_retries() -> u32 {
    3
}

fn default_launch_retry_delay() -> u64 {
    2
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: default_user_agent(),
            chrome_executable: None,
            chrome_args: Vec::new(),
            page_timeout_secs: default_page_timeout(),
            wait_timeout_secs: default_wait_timeout(),
            launch_retries: default_launch_retries(),
            launch_retry_delay_secs: default_launch_retry_delay(),
        }
    }
}

impl BrowserConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
