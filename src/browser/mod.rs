//! Browser-based page fetcher.
//!
//! Uses chromiumoxide (CDP) with stealth evasion so bank sites that
//! probe for automation still serve real content. Element lookups poll
//! until a timeout and only ever return visible elements; absence is
//! reported as `None`/empty, and the caller decides whether that is an
//! error.

mod config;
mod stealth;

pub use config::{BrowserConfig, USER_AGENT};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stealth::STEALTH_SCRIPTS;

/// Interval between element lookup polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum FetchError {
    /// No browser could be started. Unrecoverable for the whole run.
    #[error("browser unavailable: {0}")]
    Browser(String),
    /// Navigation failed at the transport level.
    #[error("navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
    /// The page did not finish loading in time.
    #[error("page load timed out for {0}")]
    Timeout(String),
}

/// Result of loading one page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub html: String,
    /// False when a requested wait-selector never appeared.
    pub success: bool,
}

/// Anything that can load a URL and hand back the rendered page.
/// Lets the locator run against canned pages in tests.
#[async_trait]
pub trait PageSource: Send {
    async fn load(&mut self, url: &str, wait_selector: Option<&str>)
        -> Result<FetchResult, FetchError>;
}

/// Stealth browser fetcher. One fetcher owns one browser session; a
/// session is never shared across concurrent crawl units.
pub struct PageFetcher {
    config: BrowserConfig,
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
}

impl PageFetcher {
    /// Common Chrome executable paths to probe.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Launch a browser, retrying a fixed number of times with a fixed
    /// backoff. Exhausting the retries is fatal for the run.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_launch(config).await {
                Ok(fetcher) => return Ok(fetcher),
                Err(e) if attempt < config.launch_retries => {
                    warn!(
                        "Browser launch failed (attempt {}/{}): {}",
                        attempt, config.launch_retries, e
                    );
                    tokio::time::sleep(Duration::from_secs(config.launch_retry_delay_secs)).await;
                }
                Err(e) => return Err(FetchError::Browser(e)),
            }
        }
    }

    async fn try_launch(config: &BrowserConfig) -> Result<Self, String> {
        let mut builder = CdpBrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-notifications")
            .arg("--ignore-certificate-errors")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg(format!("--user-agent={}", config.user_agent));

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = Self::chrome_executable(config) {
            builder = builder.chrome_executable(path);
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder.build()?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| e.to_string())?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Browser launched (headless={})", config.headless);
        Ok(Self {
            config: config.clone(),
            browser,
            handler_task,
            page: None,
        })
    }

    /// Find the Chrome binary: explicit config, then common paths, then
    /// `which`. `None` falls back to chromiumoxide's own detection.
    fn chrome_executable(config: &BrowserConfig) -> Option<PathBuf> {
        if let Some(path) = &config.chrome_executable {
            return Some(path.clone());
        }
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }
        for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        return Some(PathBuf::from(path));
                    }
                }
            }
        }
        None
    }

    /// Get or create the working tab, with stealth scripts registered
    /// for every document it will load. Pages are cheap handles, so a
    /// clone is handed out.
    async fn page(&mut self) -> Result<Page, FetchError> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        for script in STEALTH_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(*script))
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
        }
        self.page = Some(page.clone());
        Ok(page)
    }

    /// Navigate to a URL and return the rendered page.
    pub async fn fetch(
        &mut self,
        url: &str,
        wait_selector: Option<&str>,
    ) -> Result<FetchResult, FetchError> {
        let timeout = self.config.page_timeout();
        let wait_timeout = self.config.wait_timeout();
        let page = self.page().await?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(FetchError::Timeout(url.to_string())),
        }

        let mut success = true;
        if let Some(selector) = wait_selector {
            if self.find(selector, wait_timeout).await.is_none() {
                debug!("Wait selector {:?} never appeared on {}", selector, url);
                success = false;
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let title = page
            .get_title()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(FetchResult {
            url: url.to_string(),
            final_url,
            title,
            html,
            success,
        })
    }

    /// First visible element matching the selector, or `None` once the
    /// timeout elapses. Absence is not an error.
    pub async fn find(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let page = self.page.as_ref()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(elements) = page.find_elements(selector).await {
                for element in elements {
                    if Self::is_visible(&element).await {
                        return Some(element);
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// All visible elements matching the selector; empty on timeout.
    pub async fn find_all(&self, selector: &str, timeout: Duration) -> Vec<Element> {
        let Some(page) = self.page.as_ref() else {
            return Vec::new();
        };
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(elements) = page.find_elements(selector).await {
                let mut visible = Vec::new();
                for element in elements {
                    if Self::is_visible(&element).await {
                        visible.push(element);
                    }
                }
                if !visible.is_empty() {
                    return visible;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Vec::new();
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// First visible match inside a parent element, without polling:
    /// the parent was already waited for.
    pub async fn find_in(&self, parent: &Element, selector: &str) -> Option<Element> {
        let elements = parent.find_elements(selector).await.ok()?;
        for element in elements {
            if Self::is_visible(&element).await {
                return Some(element);
            }
        }
        None
    }

    /// All visible matches inside a parent element.
    pub async fn find_all_in(&self, parent: &Element, selector: &str) -> Vec<Element> {
        let Ok(elements) = parent.find_elements(selector).await else {
            return Vec::new();
        };
        let mut visible = Vec::new();
        for element in elements {
            if Self::is_visible(&element).await {
                visible.push(element);
            }
        }
        visible
    }

    async fn is_visible(element: &Element) -> bool {
        let check = r#"function() {
            const style = window.getComputedStyle(this);
            if (style.display === 'none' || style.visibility === 'hidden') return false;
            const rect = this.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }"#;
        match element.call_js_fn(check, false).await {
            Ok(result) => result
                .result
                .value
                .as_ref()
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Element text, empty string on any failure.
    pub async fn text(element: &Element) -> String {
        element
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    /// Attribute value, empty string on any failure.
    pub async fn attr(element: &Element, name: &str) -> String {
        element
            .attribute(name)
            .await
            .ok()
            .flatten()
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn wait_timeout(&self) -> Duration {
        self.config.wait_timeout()
    }

    /// Shut the browser down. Sessions are released explicitly at the
    /// end of each crawl unit, never left to drop order.
    pub async fn close(mut self) {
        self.page = None;
        if let Err(e) = self.browser.close().await {
            debug!("Browser close: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn load(
        &mut self,
        url: &str,
        wait_selector: Option<&str>,
    ) -> Result<FetchResult, FetchError> {
        self.fetch(url, wait_selector).await
    }
}
