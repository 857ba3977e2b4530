//! Bank credit-card page locator.
//!
//! For each bank: try the pre-configured candidate URLs in order and
//! keep the first that verifies as a credit-card page, then fall back
//! to keyword link discovery on the bank homepage. A candidate that
//! fails to load is skipped; a homepage that fails to load is a
//! transport failure and retries the whole bank.

pub mod link;

pub use link::{discover_card_link, resolve_href};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::browser::PageSource;
use crate::config::CrawlPolicy;
use crate::models::{BankTarget, DiscoveryMethod, LocatedPage};

/// Keywords that qualify a page as a credit-card page. Checked against
/// the title first, then the page content.
pub const PAGE_KEYWORDS: &[&str] = &["信用卡", "信用卡中心", "信用卡官网", "卡片", "信用卡产品"];

/// Whether a loaded page is actually about credit cards. The content
/// check runs over rendered body text, not raw markup: a keyword
/// buried in a script or an attribute does not make a card page.
pub fn verify_page(html: &str, title: &str) -> bool {
    if PAGE_KEYWORDS.iter().any(|keyword| title.contains(keyword)) {
        return true;
    }
    let text = body_text(html);
    PAGE_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Visible text content of the page body, scripts and styles excluded.
fn body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").unwrap();
    let mut text = String::new();
    for element in document.select(&body) {
        for node in element.descendants() {
            let Some(fragment) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| matches!(el.value().name(), "script" | "style" | "noscript"));
            if !hidden {
                text.push_str(fragment);
            }
        }
    }
    text
}

/// Progress through one location attempt for a single bank.
enum LocatorState {
    TryCandidates,
    TryHomepage,
    Found(LocatedPage),
    NotFound,
}

/// Locates the credit-card page of each configured bank using any
/// `PageSource`.
pub struct BankLocator<S: PageSource> {
    source: S,
    policy: CrawlPolicy,
}

impl<S: PageSource> BankLocator<S> {
    pub fn new(source: S, policy: CrawlPolicy) -> Self {
        Self { source, policy }
    }

    /// Hand the page source back, for an explicit shutdown.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Locate pages for all banks. A bank that cannot be located is
    /// logged and skipped, never fatal for the run.
    pub async fn locate_all(&mut self, banks: &[BankTarget]) -> Vec<LocatedPage> {
        let mut located = Vec::new();
        for bank in banks {
            if let Some(page) = self.locate(bank).await {
                located.push(page);
            }
        }
        info!("Located {}/{} bank credit-card pages", located.len(), banks.len());
        located
    }

    /// Locate one bank's credit-card page, retrying the whole bank on
    /// transport failure.
    pub async fn locate(&mut self, bank: &BankTarget) -> Option<LocatedPage> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(bank).await {
                Ok(Some(page)) => {
                    info!(
                        "{}: credit-card page {} ({})",
                        bank.name, page.url, page.discovery_method
                    );
                    return Some(page);
                }
                Ok(None) => {
                    warn!("{}: no credit-card page found", bank.name);
                    return None;
                }
                Err(e) if attempt < self.policy.bank_retries => {
                    warn!(
                        "{}: attempt {}/{} failed, backing off: {}",
                        bank.name, attempt, self.policy.bank_retries, e
                    );
                    self.policy.pause_retry().await;
                }
                Err(e) => {
                    warn!(
                        "{}: giving up after {} attempts: {}",
                        bank.name, self.policy.bank_retries, e
                    );
                    return None;
                }
            }
        }
    }

    /// One pass through the state machine. Transport errors on the
    /// homepage propagate; candidate load errors only advance to the
    /// next candidate.
    async fn attempt(
        &mut self,
        bank: &BankTarget,
    ) -> Result<Option<LocatedPage>, crate::browser::FetchError> {
        let mut state = LocatorState::TryCandidates;
        loop {
            state = match state {
                LocatorState::TryCandidates => match self.try_candidates(bank).await {
                    Some(page) => LocatorState::Found(page),
                    None => LocatorState::TryHomepage,
                },
                LocatorState::TryHomepage => {
                    debug!("{}: falling back to homepage link discovery", bank.name);
                    let result = self.source.load(&bank.homepage_url, None).await?;
                    self.policy.pause_request().await;
                    match discover_card_link(&result.html, &bank.keywords, &bank.homepage_url) {
                        Some(url) => LocatorState::Found(LocatedPage::new(
                            &bank.name,
                            &url,
                            DiscoveryMethod::HomepageLink,
                        )),
                        None => LocatorState::NotFound,
                    }
                }
                LocatorState::Found(page) => return Ok(Some(page)),
                LocatorState::NotFound => return Ok(None),
            };
        }
    }

    /// Candidate URLs in configured order; the first that loads and
    /// verifies wins and no later candidate is touched.
    async fn try_candidates(&mut self, bank: &BankTarget) -> Option<LocatedPage> {
        for url in &bank.candidate_urls {
            match self.source.load(url, None).await {
                Ok(result) => {
                    self.policy.pause_request().await;
                    if verify_page(&result.html, &result.title) {
                        return Some(LocatedPage::new(
                            &bank.name,
                            url,
                            DiscoveryMethod::CandidateUrl,
                        ));
                    }
                    debug!("{}: candidate {} did not verify", bank.name, url);
                }
                Err(e) => {
                    debug!("{}: candidate {} failed to load: {}", bank.name, url, e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::browser::{FetchError, FetchResult, PageSource};

    enum Canned {
        Page { title: String, html: String },
        Transport,
    }

    /// Serves canned pages and records every requested URL.
    struct StubSource {
        pages: HashMap<String, Canned>,
        requested: Vec<String>,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                requested: Vec::new(),
            }
        }

        fn page(mut self, url: &str, title: &str, html: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Canned::Page {
                    title: title.to_string(),
                    html: html.to_string(),
                },
            );
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), Canned::Transport);
            self
        }
    }

    #[async_trait]
    impl PageSource for StubSource {
        async fn load(
            &mut self,
            url: &str,
            _wait_selector: Option<&str>,
        ) -> Result<FetchResult, FetchError> {
            self.requested.push(url.to_string());
            match self.pages.get(url) {
                Some(Canned::Page { title, html }) => Ok(FetchResult {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    title: title.clone(),
                    html: html.clone(),
                    success: true,
                }),
                Some(Canned::Transport) | None => Err(FetchError::Navigation {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                }),
            }
        }
    }

    fn bank() -> BankTarget {
        BankTarget::new("XYZ银行", "https://bank.example/")
            .with_candidates(&[
                "https://bank.example/creditcard/",
                "https://bank.example/cards/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"])
    }

    #[tokio::test]
    async fn verified_candidate_short_circuits() {
        let source = StubSource::new()
            .page(
                "https://bank.example/creditcard/",
                "XYZ信用卡中心申请",
                "<html><body>apply now</body></html>",
            )
            .page(
                "https://bank.example/cards/",
                "XYZ信用卡",
                "<html><body>also valid</body></html>",
            );
        let mut locator = BankLocator::new(source, CrawlPolicy::immediate());

        let page = locator.locate(&bank()).await.unwrap();
        assert_eq!(page.url, "https://bank.example/creditcard/");
        assert_eq!(page.discovery_method, DiscoveryMethod::CandidateUrl);
        assert_eq!(page.bank_name, "XYZ银行");

        let source = locator.into_source();
        assert_eq!(source.requested, vec!["https://bank.example/creditcard/"]);
    }

    #[tokio::test]
    async fn title_keyword_alone_verifies() {
        let source = StubSource::new().page(
            "https://bank.example/creditcard/",
            "XYZ信用卡中心申请",
            "<html><body>nothing relevant here</body></html>",
        );
        let mut locator = BankLocator::new(source, CrawlPolicy::immediate());

        let page = locator.locate(&bank()).await.unwrap();
        assert_eq!(page.discovery_method, DiscoveryMethod::CandidateUrl);
    }

    #[tokio::test]
    async fn falls_back_to_homepage_link_discovery() {
        let source = StubSource::new()
            .page(
                "https://bank.example/creditcard/",
                "page not found",
                "<html><body>404</body></html>",
            )
            .failing("https://bank.example/cards/")
            .page(
                "https://bank.example/",
                "XYZ bank",
                r#"<html><body><a href="/xyk/index.html">信用卡</a></body></html>"#,
            );
        let mut locator = BankLocator::new(source, CrawlPolicy::immediate());

        let page = locator.locate(&bank()).await.unwrap();
        assert_eq!(page.url, "https://bank.example/xyk/index.html");
        assert_eq!(page.discovery_method, DiscoveryMethod::HomepageLink);
    }

    #[tokio::test]
    async fn homepage_without_card_link_is_not_found_without_retries() {
        let source = StubSource::new()
            .page(
                "https://bank.example/creditcard/",
                "page not found",
                "<html><body>404</body></html>",
            )
            .page(
                "https://bank.example/cards/",
                "page not found",
                "<html><body>404</body></html>",
            )
            .page(
                "https://bank.example/",
                "XYZ bank",
                "<html><body><a href=\"/loans\">loans</a></body></html>",
            );
        let mut locator = BankLocator::new(source, CrawlPolicy::immediate());

        assert!(locator.locate(&bank()).await.is_none());
        // A clean not-found is terminal, not a transport failure.
        let source = locator.into_source();
        assert_eq!(source.requested.len(), 3);
    }

    #[tokio::test]
    async fn homepage_transport_failure_retries_the_bank() {
        let source = StubSource::new()
            .failing("https://bank.example/creditcard/")
            .failing("https://bank.example/cards/")
            .failing("https://bank.example/");
        let policy = CrawlPolicy::immediate();
        let retries = policy.bank_retries as usize;
        let mut locator = BankLocator::new(source, policy);

        assert!(locator.locate(&bank()).await.is_none());
        let source = locator.into_source();
        // Each attempt walks both candidates and the homepage.
        assert_eq!(source.requested.len(), 3 * retries);
    }

    #[tokio::test]
    async fn locate_all_skips_unlocatable_banks() {
        let good = BankTarget::new("好银行", "https://good.example/")
            .with_candidates(&["https://good.example/cards/"]);
        let bad = BankTarget::new("坏银行", "https://bad.example/").with_keywords(&["信用卡"]);

        let source = StubSource::new()
            .page(
                "https://good.example/cards/",
                "好银行信用卡",
                "<html></html>",
            )
            .failing("https://bad.example/");
        let mut locator = BankLocator::new(source, CrawlPolicy::immediate());

        let located = locator.locate_all(&[good, bad]).await;
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].bank_name, "好银行");
    }

    #[test]
    fn verify_checks_title_then_content() {
        assert!(verify_page("<html></html>", "XYZ信用卡中心"));
        assert!(verify_page("<html><body>信用卡产品一览</body></html>", "home"));
        assert!(!verify_page("<html><body>loans only</body></html>", "loans"));
    }

    #[test]
    fn verify_ignores_keywords_outside_body_text() {
        let html = r#"<html><body>
            <script>var nav = "信用卡中心";</script>
            <style>.信用卡 { color: red; }</style>
            <a href="/信用卡/">apply</a>
        </body></html>"#;
        assert!(!verify_page(html, "loans"));

        let visible = r#"<html><body><div>信用卡产品</div></body></html>"#;
        assert!(verify_page(visible, "loans"));
    }
}
