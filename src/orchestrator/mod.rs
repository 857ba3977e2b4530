//! Crawl orchestration: one unit per bank, bounded concurrency, and the
//! persist/audit tail of every run.
//!
//! A unit owns everything it needs, including its own browser session
//! for DOM banks, so units never share mutable state. One failing bank
//! is contained; the run carries on and reports it at the end.

pub mod audit;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::browser::PageFetcher;
use crate::config::{Settings, StrategyConfig};
use crate::extract::{
    crawl_bank, ApiCardExtractor, CardExtractor, DomCardExtractor, ExtractError,
    SearchLlmExtractor,
};
use crate::llm::ChatClient;
use crate::locator::BankLocator;
use crate::models::{LocatedPage, RawCardRecord};
use crate::search::SearchClient;
use crate::store::CardStore;

/// Outcome of one crawl run.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub banks_attempted: usize,
    /// Banks whose extraction failed outright, with the reason.
    pub banks_failed: Vec<(String, String)>,
    pub records_extracted: usize,
    pub records_persisted: usize,
    pub records_skipped: usize,
}

impl CrawlReport {
    pub fn banks_succeeded(&self) -> usize {
        self.banks_attempted - self.banks_failed.len()
    }
}

pub struct CrawlOrchestrator {
    settings: Arc<Settings>,
    store: CardStore,
}

impl CrawlOrchestrator {
    pub fn new(settings: Settings) -> Self {
        let store = CardStore::new(settings.database_path());
        Self {
            settings: Arc::new(settings),
            store,
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    /// Run the full pipeline for the configured banks, or one bank when
    /// a filter is given.
    pub async fn run(
        &self,
        bank_filter: Option<&str>,
        workers: usize,
    ) -> anyhow::Result<CrawlReport> {
        self.settings.ensure_dirs()?;
        self.store.init()?;

        let banks: Vec<String> = match bank_filter {
            Some(name) => {
                if self.settings.bank(name).is_none() {
                    anyhow::bail!("unknown bank: {name}");
                }
                vec![name.to_string()]
            }
            None => self.settings.banks.iter().map(|b| b.name.clone()).collect(),
        };

        let mut report = CrawlReport {
            banks_attempted: banks.len(),
            ..Default::default()
        };
        let mut records: Vec<RawCardRecord> = Vec::new();

        if workers > 1 {
            self.run_concurrent(banks, workers, &mut report, &mut records)
                .await;
        } else {
            for bank in banks {
                match crawl_unit(self.settings.clone(), bank.clone()).await {
                    Ok(mut bank_records) => records.append(&mut bank_records),
                    Err(e) => {
                        error!("{}: bank failed: {}", bank, e);
                        report.banks_failed.push((bank, e.to_string()));
                    }
                }
            }
        }
        report.records_extracted = records.len();

        // Persisting and auditing happen even when some banks failed;
        // partial data is the normal case for this pipeline.
        let outcome = persist_records(&self.store, &records);
        report.records_persisted = outcome.persisted;
        report.records_skipped = outcome.skipped;

        let stamp = audit::timestamp();
        if let Err(e) = audit::write_cards(&self.settings.results_dir(), &records, &stamp) {
            warn!("Audit files could not be written: {}", e);
        }

        info!(
            "Crawl finished: {}/{} banks, {} records, {} persisted",
            report.banks_succeeded(),
            report.banks_attempted,
            report.records_extracted,
            report.records_persisted
        );
        Ok(report)
    }

    async fn run_concurrent(
        &self,
        banks: Vec<String>,
        workers: usize,
        report: &mut CrawlReport,
        records: &mut Vec<RawCardRecord>,
    ) {
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut units = JoinSet::new();
        for bank in banks {
            let semaphore = semaphore.clone();
            let settings = self.settings.clone();
            units.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            bank,
                            Err(ExtractError::Unavailable("worker pool closed".to_string())),
                        )
                    }
                };
                let result = crawl_unit(settings, bank.clone()).await;
                (bank, result)
            });
        }
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, Ok(mut bank_records))) => records.append(&mut bank_records),
                Ok((bank, Err(e))) => {
                    error!("{}: bank failed: {}", bank, e);
                    report.banks_failed.push((bank, e.to_string()));
                }
                Err(e) => {
                    error!("Crawl unit panicked: {}", e);
                    report
                        .banks_failed
                        .push(("<unknown>".to_string(), e.to_string()));
                }
            }
        }
    }

    /// Locate every bank's credit-card page and write the audit file.
    pub async fn locate(&self) -> anyhow::Result<Vec<LocatedPage>> {
        self.settings.ensure_dirs()?;
        let fetcher = PageFetcher::launch(&self.settings.browser)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let mut locator = BankLocator::new(fetcher, self.settings.policy.clone());
        let located = locator.locate_all(&self.settings.banks).await;
        locator.into_source().close().await;

        let stamp = audit::timestamp();
        audit::write_located(&self.settings.results_dir(), &located, &stamp)?;
        Ok(located)
    }
}

/// Crawl one bank, retrying the whole unit on transport failure only.
/// A source that answers with something unusable gives the same answer
/// again; missing prerequisites (browser, API keys) do too.
async fn crawl_unit(
    settings: Arc<Settings>,
    bank: String,
) -> Result<Vec<RawCardRecord>, ExtractError> {
    let retries = settings.policy.bank_retries;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match crawl_once(&settings, &bank).await {
            Ok(records) => return Ok(records),
            Err(e @ ExtractError::Transport(_)) if attempt < retries => {
                warn!(
                    "{}: attempt {}/{} failed, backing off: {}",
                    bank, attempt, retries, e
                );
                settings.policy.pause_retry().await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One extraction attempt for one bank, with the extractor's resources
/// released whatever the outcome.
async fn crawl_once(
    settings: &Settings,
    bank: &str,
) -> Result<Vec<RawCardRecord>, ExtractError> {
    let mut extractor = build_extractor(settings, bank).await?;
    let result = crawl_bank(extractor.as_mut(), &settings.policy).await;
    extractor.close().await;
    result
}

/// Build the extractor the strategy table names for a bank.
async fn build_extractor(
    settings: &Settings,
    bank: &str,
) -> Result<Box<dyn CardExtractor>, ExtractError> {
    match settings.strategy_for(bank) {
        StrategyConfig::Dom(selectors) => {
            let fetcher = PageFetcher::launch(&settings.browser)
                .await
                .map_err(|e| ExtractError::Unavailable(e.to_string()))?;
            Ok(Box::new(DomCardExtractor::new(bank, selectors, fetcher)))
        }
        StrategyConfig::Api(endpoints) => Ok(Box::new(ApiCardExtractor::new(bank, endpoints)?)),
        StrategyConfig::SearchLlm => {
            let search = SearchClient::new(&settings.search)
                .map_err(|e| ExtractError::Unavailable(e.to_string()))?;
            let llm = ChatClient::new(&settings.llm)
                .map_err(|e| ExtractError::Unavailable(e.to_string()))?;
            Ok(Box::new(SearchLlmExtractor::new(
                bank,
                search,
                llm,
                &settings.policy,
                &settings.search,
            )))
        }
    }
}

/// How a batch write went.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub persisted: usize,
    pub skipped: usize,
}

/// Write records one by one. A record that fails validation or the
/// write is logged and skipped; the rest of the batch still lands.
pub fn persist_records(store: &CardStore, records: &[RawCardRecord]) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();
    for record in records {
        match store.upsert_raw(record) {
            Ok(_) => outcome.persisted += 1,
            Err(e) => {
                warn!(
                    "{} / {}: not persisted: {}",
                    record.bank_name, record.card_name, e
                );
                outcome.skipped += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionSource;

    #[test]
    fn persist_skips_invalid_records_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::new(dir.path().join("cards.db"));
        store.init().unwrap();

        let good = RawCardRecord::new("测试银行", "白金卡", ExtractionSource::Api);
        let bad = RawCardRecord::new("测试银行", "", ExtractionSource::Api);
        let outcome = persist_records(&store, &[good, bad]);

        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn unusable_llm_answer_fails_the_bank_without_retrying() {
        let mut search_server = mockito::Server::new_async().await;
        let search_mock = search_server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"organic":[{"title":"t","link":"https://x","snippet":"s"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let mut llm_server = mockito::Server::new_async().await;
        let llm_mock = llm_server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "抱歉，无法列出。"}}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            policy: crate::config::CrawlPolicy::immediate(),
            llm: crate::config::LlmSettings {
                api_url: llm_server.url(),
                api_key: Some("k".to_string()),
                ..Default::default()
            },
            search: crate::config::SearchSettings {
                api_url: search_server.url(),
                api_key: Some("k".to_string()),
                ..Default::default()
            },
            ..Settings::default()
        };

        // 招商银行 has no strategy entry, so it goes through search+LLM.
        let result = crawl_unit(Arc::new(settings), "招商银行".to_string()).await;
        assert!(matches!(result, Err(ExtractError::Unusable(_))));
        // A malformed answer is terminal for the unit; one pass only.
        search_mock.assert_async().await;
        llm_mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_bank_filter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let orchestrator = CrawlOrchestrator::new(settings);
        let err = orchestrator.run(Some("不存在的银行"), 1).await.unwrap_err();
        assert!(err.to_string().contains("不存在的银行"));
    }
}
