//! Unblock engine: delegates to a remote anti-bot "unblocker" REST
//! service instead of rendering locally. Grounded on the teacher's
//! `proxy.rs` `reqwest::Client` construction pattern, generalized to
//! POST a JSON payload instead of proxying raw traffic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FetchError, Result};
use crate::fetcher::{EngineParams, FetchEngine};
use crate::types::{FetchResult, ResponseType};

const UNBLOCK_TIMEOUT: Duration = Duration::from_secs(45);
const WAIT_FOR_TIMEOUT_MS: u64 = 5000;

#[derive(Serialize)]
struct UnblockRequestBody<'a> {
    url: &'a str,
    #[serde(rename = "bestAttempt")]
    best_attempt: bool,
    content: bool,
    #[serde(rename = "waitForTimeout")]
    wait_for_timeout: u64,
}

#[derive(Deserialize)]
struct UnblockResponseBody {
    content: String,
}

/// Derives the unblock REST endpoint from the browser pool's
/// WebSocket URL: swap `ws`/`wss` for `http`/`https`, append
/// `/chrome/unblock`.
pub fn derive_endpoint(browserless_url: &str) -> String {
    let http_base = if let Some(rest) = browserless_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = browserless_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        browserless_url.to_string()
    };
    format!("{}/chrome/unblock", http_base.trim_end_matches('/'))
}

/// Calls a remote unblock endpoint that runs its own, out-of-process
/// anti-bot evasion and returns the rendered page.
pub struct UnblockEngine {
    endpoint: String,
    client: reqwest::Client,
}

impl UnblockEngine {
    /// Builds an engine whose endpoint is derived from the configured
    /// browser pool URL (see [`derive_endpoint`]).
    pub fn new(browserless_url: impl AsRef<str>) -> Self {
        Self {
            endpoint: derive_endpoint(browserless_url.as_ref()),
            client: reqwest::Client::builder()
                .timeout(UNBLOCK_TIMEOUT)
                .build()
                .expect("building unblock client"),
        }
    }
}

#[async_trait]
impl FetchEngine for UnblockEngine {
    fn name(&self) -> &'static str {
        "unblock"
    }

    async fn fetch(&self, params: EngineParams<'_>) -> Result<FetchResult> {
        let started = std::time::Instant::now();

        let body = UnblockRequestBody {
            url: params.url,
            best_attempt: true,
            content: true,
            wait_for_timeout: WAIT_FOR_TIMEOUT_MS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::EngineError {
                engine: "unblock".to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::EngineError {
                engine: "unblock".to_string(),
                reason: format!("unblock service returned {}", response.status()),
            });
        }

        let parsed: UnblockResponseBody = response.json().await.map_err(|e| FetchError::EngineError {
            engine: "unblock".to_string(),
            reason: format!("parsing unblock response: {e}"),
        })?;

        Ok(FetchResult {
            success: true,
            url: params.url.to_string(),
            final_url: params.url.to_string(),
            status_code: 200,
            content: parsed.content,
            markdown: None,
            headers: Default::default(),
            response_type: ResponseType::Text,
            engine_used: "unblock".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cached_profile: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_name() {
        let engine = UnblockEngine::new("ws://localhost:9222");
        assert_eq!(engine.name(), "unblock");
    }

    #[test]
    fn test_derive_endpoint_from_ws() {
        assert_eq!(derive_endpoint("ws://localhost:9222"), "http://localhost:9222/chrome/unblock");
    }

    #[test]
    fn test_derive_endpoint_from_wss() {
        assert_eq!(
            derive_endpoint("wss://browserless.example.com"),
            "https://browserless.example.com/chrome/unblock"
        );
    }

    #[test]
    fn test_derive_endpoint_strips_trailing_slash() {
        assert_eq!(derive_endpoint("ws://localhost:9222/"), "http://localhost:9222/chrome/unblock");
    }

    #[test]
    fn test_derive_endpoint_passes_through_non_ws_scheme() {
        assert_eq!(derive_endpoint("https://already-http.example.com"), "https://already-http.example.com/chrome/unblock");
    }
}
