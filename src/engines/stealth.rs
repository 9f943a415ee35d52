//! Local stealth engine: launches a fresh, anti-detection-patched
//! Chrome for each request and tears it down afterward instead of
//! pooling it. The launch-argument construction is lifted from the
//! teacher's `browser.rs::BrowserPool::acquire_browser` (fixed
//! viewport/UA, `--disable-blink-features=AutomationControlled`, the
//! standard scraping flag set) and Chrome discovery from
//! `browser_setup::ensure_chrome`.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::browser_setup::ensure_chrome;
use crate::error::{FetchError, Result};
use crate::fetcher::{EngineParams, FetchEngine, WaitStrategy};
use crate::types::{FetchResult, ResponseType};

const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Extra settle time given to JS-heavy pages after the full `load`
/// event, on top of any caller-requested `renderDelayMs`.
const WAIT_FOR_JS_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// How long to wait for network activity to go quiet before falling
/// back to a plain `domcontentloaded` wait.
const NETWORK_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Fetches a URL with a freshly launched, stealth-patched local
/// browser. No pooling: a new identity every request.
pub struct StealthEngine {
    chrome_path: Option<String>,
    wait_override: Option<WaitStrategy>,
}

impl StealthEngine {
    pub fn new() -> Self {
        Self {
            chrome_path: None,
            wait_override: None,
        }
    }

    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Overrides the per-request wait-strategy selection below with a
    /// fixed strategy. Used by tests; production callers let
    /// [`Self::wait_for`] decide from `waitForJs`/`renderDelayMs`.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait_override = Some(wait);
        self
    }

    /// Picks the wait strategy per spec §4.1: `waitForJs` wins over
    /// an explicit render delay, which wins over the networkidle
    /// default.
    fn wait_for(&self, params: &EngineParams<'_>) -> WaitStrategy {
        if let Some(wait) = &self.wait_override {
            return wait.clone();
        }
        if params.wait_for_js {
            WaitStrategy::Load
        } else if params.render_delay_ms > 0 {
            WaitStrategy::DomContentLoaded
        } else {
            WaitStrategy::NetworkIdle { idle_ms: NETWORK_IDLE_TIMEOUT_MS }
        }
    }

    async fn launch(&self) -> Result<Browser> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .window_size(1920, 1080)
            .arg(format!("--user-agent={STEALTH_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-default-apps")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--mute-audio")
            .arg("--no-first-run")
            .arg("--lang=en-US");

        if let Some(ref path) = self.chrome_path {
            builder = builder.chrome_executable(path);
        } else {
            let chrome_path = ensure_chrome().await?;
            debug!(path = %chrome_path.display(), "using auto-detected chrome for stealth engine");
            builder = builder.chrome_executable(chrome_path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("building stealth browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Browser(format!("launching stealth browser: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("stealth browser CDP handler error: {e}");
                }
            }
        });

        Ok(browser)
    }

    /// Navigates, waits, and reads back the rendered page. Kept
    /// separate from [`Self::fetch`] so the browser/page teardown in
    /// `fetch` runs whether this succeeds or fails.
    async fn render(&self, page: &Page, params: &EngineParams<'_>) -> Result<(String, String)> {
        page.set_user_agent(SetUserAgentOverrideParams::new(STEALTH_USER_AGENT))
            .await
            .map_err(|e| FetchError::Browser(format!("setting user agent: {e}")))?;
        let _ = page
            .execute(SetTimezoneOverrideParams::new("America/New_York"))
            .await;

        match self.wait_for(params) {
            WaitStrategy::Load => {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
                tokio::time::sleep(WAIT_FOR_JS_SETTLE_DELAY).await;
            }
            WaitStrategy::DomContentLoaded => {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
            }
            WaitStrategy::NetworkIdle { idle_ms } => {
                let settled = tokio::time::timeout(Duration::from_millis(idle_ms), page.wait_for_navigation()).await;
                if settled.is_err() {
                    debug!("stealth engine networkidle wait timed out, falling back to domcontentloaded");
                }
            }
            WaitStrategy::Selector { css, timeout_ms } => {
                let found = tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    page.find_element(css.as_str()),
                )
                .await;
                if found.is_err() {
                    debug!(selector = %css, "stealth engine selector wait timed out");
                }
            }
            WaitStrategy::Delay { ms } => {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }

        if params.render_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(params.render_delay_ms)).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(format!("reading content: {e}")))?;
        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| params.url.to_string());

        Ok((html, final_url))
    }
}

impl Default for StealthEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchEngine for StealthEngine {
    fn name(&self) -> &'static str {
        "stealth"
    }

    async fn fetch(&self, params: EngineParams<'_>) -> Result<FetchResult> {
        let started = std::time::Instant::now();
        let browser = self.launch().await?;

        let page = match browser.new_page(params.url).await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await.ok();
                return Err(FetchError::Browser(format!("opening page: {e}")));
            }
        };

        let outcome = self.render(&page, &params).await;

        if let Err(e) = page.close().await {
            warn!("failed to close stealth page: {e}");
        }
        browser.close().await.ok();

        let (html, final_url) = outcome?;

        Ok(FetchResult {
            success: true,
            url: params.url.to_string(),
            final_url,
            status_code: 200,
            content: html,
            markdown: None,
            headers: Default::default(),
            response_type: ResponseType::Text,
            engine_used: "stealth".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cached_profile: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params(wait_for_js: bool, render_delay_ms: u64) -> EngineParams<'static> {
        static HEADERS: std::sync::OnceLock<HashMap<String, String>> = std::sync::OnceLock::new();
        EngineParams {
            url: "https://example.com",
            headers: HEADERS.get_or_init(HashMap::new),
            response_type: ResponseType::Text,
            render_delay_ms,
            use_proxy: false,
            wait_for_js,
        }
    }

    #[test]
    fn test_default_wait_picks_networkidle_when_no_hints() {
        let engine = StealthEngine::new();
        assert!(matches!(engine.wait_for(&params(false, 0)), WaitStrategy::NetworkIdle { .. }));
    }

    #[test]
    fn test_wait_for_js_hint_picks_load() {
        let engine = StealthEngine::new();
        assert!(matches!(engine.wait_for(&params(true, 0)), WaitStrategy::Load));
    }

    #[test]
    fn test_render_delay_hint_picks_domcontentloaded() {
        let engine = StealthEngine::new();
        assert!(matches!(engine.wait_for(&params(false, 3000)), WaitStrategy::DomContentLoaded));
    }

    #[test]
    fn test_wait_for_js_wins_over_render_delay() {
        let engine = StealthEngine::new();
        assert!(matches!(engine.wait_for(&params(true, 3000)), WaitStrategy::Load));
    }

    #[test]
    fn test_with_wait_overrides_per_request_selection() {
        let engine = StealthEngine::new().with_wait(WaitStrategy::Selector { css: "h1".into(), timeout_ms: 1000 });
        assert!(matches!(engine.wait_for(&params(false, 0)), WaitStrategy::Selector { .. }));
    }

    #[test]
    fn test_with_chrome_path_sets_field() {
        let engine = StealthEngine::new().with_chrome_path("/usr/bin/chromium");
        assert_eq!(engine.chrome_path.as_deref(), Some("/usr/bin/chromium"));
    }

    #[test]
    fn test_engine_name() {
        assert_eq!(StealthEngine::new().name(), "stealth");
    }
}
