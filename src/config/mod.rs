//! Runtime configuration: settings file, bank table, crawl policy and
//! per-bank extraction strategies.

mod banks;
mod policy;
mod strategy;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::BrowserConfig;
use crate::models::BankTarget;

pub use banks::default_banks;
pub use policy::{sleep_range, CrawlPolicy};
pub use strategy::{ApiEndpoints, DomSelectors, StrategyConfig};

/// Name of the optional settings file inside the data directory.
pub const SETTINGS_FILE: &str = "cardscout.toml";

/// LLM chat-completion service settings (DeepSeek-shaped API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Taken from `DEEPSEEK_API_KEY` when not set in the file.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_api_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_llm_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: default_llm_api_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_llm_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Web-search service settings (Serper-shaped API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_api_url")]
    pub api_url: String,
    /// Taken from `SERPER_API_KEY` when not set in the file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Country code sent with every query.
    #[serde(default = "default_gl")]
    pub gl: String,
    /// Language code sent with every query.
    #[serde(default = "default_hl")]
    pub hl: String,
    /// Result count for card-name discovery queries.
    #[serde(default = "default_name_results")]
    pub name_results: u32,
    /// Result count for per-card detail queries.
    #[serde(default = "default_detail_results")]
    pub detail_results: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_api_url() -> String {
    "https://google.serper.dev".to_string()
}

fn default_gl() -> String {
    "cn".to_string()
}

fn default_hl() -> String {
    "zh-cn".to_string()
}

fn default_name_results() -> u32 {
    10
}

fn default_detail_results() -> u32 {
    5
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_url: default_search_api_url(),
            api_key: None,
            gl: default_gl(),
            hl: default_hl(),
            name_results: default_name_results(),
            detail_results: default_detail_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level settings, loaded from `cardscout.toml` with serde defaults
/// for everything absent, then overlaid with environment variables for
/// the API keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub policy: CrawlPolicy,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default = "default_banks")]
    pub banks: Vec<BankTarget>,
    /// Extraction strategy per bank name. Banks without an entry use
    /// the search+LLM strategy.
    #[serde(default = "strategy::default_strategies")]
    pub strategies: BTreeMap<String, StrategyConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            browser: BrowserConfig::default(),
            policy: CrawlPolicy::default(),
            llm: LlmSettings::default(),
            search: SearchSettings::default(),
            banks: default_banks(),
            strategies: strategy::default_strategies(),
        }
    }
}

impl Settings {
    /// Load settings for the given data directory (or the default one).
    ///
    /// A missing settings file is not an error; defaults apply.
    pub fn load(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = data_dir.unwrap_or_else(default_data_dir);
        let path = dir.join(SETTINGS_FILE);

        let mut settings = if path.is_file() {
            let raw = std::fs::read_to_string(&path)?;
            let settings: Settings = toml::from_str(&raw)?;
            debug!("Loaded settings from {}", path.display());
            settings
        } else {
            Settings::default()
        };
        settings.data_dir = dir;

        if settings.llm.api_key.is_none() {
            settings.llm.api_key = std::env::var("DEEPSEEK_API_KEY").ok();
        }
        if settings.search.api_key.is_none() {
            settings.search.api_key = std::env::var("SERPER_API_KEY").ok();
        }

        Ok(settings)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cardscout.db")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Strategy for a bank; banks without explicit configuration fall
    /// back to search+LLM extraction.
    pub fn strategy_for(&self, bank: &str) -> StrategyConfig {
        self.strategies
            .get(bank)
            .cloned()
            .unwrap_or(StrategyConfig::SearchLlm)
    }

    pub fn bank(&self, name: &str) -> Option<&BankTarget> {
        self.banks.iter().find(|b| b.name == name)
    }

    /// Create the data and results directories if absent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.results_dir())
    }
}

/// Write a default settings file if none exists yet, returning its path.
pub fn write_default_settings(data_dir: &Path) -> anyhow::Result<PathBuf> {
    let path = data_dir.join(SETTINGS_FILE);
    if !path.exists() {
        let rendered = toml::to_string_pretty(&Settings {
            data_dir: data_dir.to_path_buf(),
            ..Settings::default()
        })?;
        std::fs::write(&path, rendered)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_original_banks() {
        let settings = Settings::default();
        assert_eq!(settings.banks.len(), 13);
        assert!(settings.bank("中国工商银行").is_some());
        assert!(settings.bank("招商银行").is_some());
        assert!(settings.bank("华夏银行").is_some());
    }

    #[test]
    fn unconfigured_banks_use_search_llm() {
        let settings = Settings::default();
        assert!(matches!(
            settings.strategy_for("招商银行"),
            StrategyConfig::SearchLlm
        ));
        assert!(matches!(
            settings.strategy_for("中国工商银行"),
            StrategyConfig::Dom(_)
        ));
        assert!(matches!(
            settings.strategy_for("中国银行"),
            StrategyConfig::Api(_)
        ));
    }

    #[test]
    fn settings_roundtrip_through_toml() {
        let settings = Settings::default();
        let rendered = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.banks.len(), settings.banks.len());
        assert_eq!(parsed.policy.bank_retries, settings.policy.bank_retries);
    }
}
