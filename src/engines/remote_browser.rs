//! Remote browser engine: borrows a tab from the shared
//! [`crate::browser_pool::BrowserPool`] instead of launching its own
//! browser, unlike the teacher's `browser.rs::BrowserFetcher` (which
//! lazily launches and owns one local browser). That launch logic is
//! reused instead by the stealth engine.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::browser_pool::BrowserPool;
use crate::error::{FetchError, Result};
use crate::fetcher::{EngineParams, FetchEngine, WaitStrategy};
use crate::types::{FetchResult, ResponseType};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fetches a URL via a tab checked out from the remote browser pool.
pub struct RemoteBrowserEngine {
    pool: Arc<BrowserPool>,
    wait: WaitStrategy,
}

impl RemoteBrowserEngine {
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self {
            pool,
            wait: WaitStrategy::DomContentLoaded,
        }
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl FetchEngine for RemoteBrowserEngine {
    fn name(&self) -> &'static str {
        "remote_browser"
    }

    async fn fetch(&self, params: EngineParams<'_>) -> Result<FetchResult> {
        let started = std::time::Instant::now();
        let url = params.url.to_string();
        let wait = self.wait.clone();
        let render_delay_ms = params.render_delay_ms;

        let (html, final_url) = self
            .pool
            .with_page(move |page| {
                let url = url.clone();
                let wait = wait.clone();
                async move {
                    page.set_user_agent(SetUserAgentOverrideParams::new(DEFAULT_USER_AGENT))
                        .await
                        .map_err(|e| FetchError::Browser(format!("set user agent: {e}")))?;

                    page.goto(&url)
                        .await
                        .map_err(|e| FetchError::Browser(format!("navigate: {e}")))?;

                    match &wait {
                        WaitStrategy::Load | WaitStrategy::DomContentLoaded => {
                            page.wait_for_navigation()
                                .await
                                .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
                        }
                        WaitStrategy::NetworkIdle { idle_ms } => {
                            page.wait_for_navigation()
                                .await
                                .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
                            tokio::time::sleep(Duration::from_millis(*idle_ms)).await;
                        }
                        WaitStrategy::Selector { css, timeout_ms } => {
                            let found = tokio::time::timeout(
                                Duration::from_millis(*timeout_ms),
                                page.find_element(css.as_str()),
                            )
                            .await;
                            if found.is_err() {
                                debug!(selector = %css, "selector wait timed out, continuing");
                            }
                        }
                        WaitStrategy::Delay { ms } => {
                            page.wait_for_navigation()
                                .await
                                .map_err(|e| FetchError::Browser(format!("navigation wait: {e}")))?;
                            tokio::time::sleep(Duration::from_millis(*ms)).await;
                        }
                    }

                    if render_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(render_delay_ms)).await;
                    }

                    let html = page
                        .content()
                        .await
                        .map_err(|e| FetchError::Browser(format!("get content: {e}")))?;
                    let final_url = page
                        .url()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| url.clone());

                    Ok((html, final_url))
                }
            })
            .await?;

        Ok(FetchResult {
            success: true,
            url: params.url.to_string(),
            final_url,
            status_code: 200,
            content: html,
            markdown: None,
            headers: Default::default(),
            response_type: ResponseType::Text,
            engine_used: "remote_browser".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cached_profile: false,
        })
    }
}
