//! Fast HTTP engine: a plain `reqwest` GET, optionally through a
//! proxy. Generalizes the teacher's `fetcher_http.rs::HttpFetcher`
//! (bare GET + `.text()`) with custom headers, a redirect/timeout
//! budget, and `response_type=base64` support, reusing
//! `proxy.rs::ProxyPool::create_client` for the proxied case.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

use crate::error::{FetchError, Result};
use crate::fetcher::{EngineParams, FetchEngine};
use crate::proxy::ProxyPool;
use crate::types::{FetchResult, ResponseType};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// The fast, no-browser fetch engine.
pub struct FastEngine {
    proxy_pool: std::sync::Arc<ProxyPool>,
}

impl FastEngine {
    pub fn new(proxy_pool: std::sync::Arc<ProxyPool>) -> Self {
        Self { proxy_pool }
    }

    async fn client_for(&self, use_proxy: bool) -> Result<Client> {
        if use_proxy && self.proxy_pool.is_enabled() {
            return self.proxy_pool.create_client(DEFAULT_USER_AGENT).await;
        }

        Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Other(format!("building http client: {e}")))
    }
}

fn build_header_map(headers: &std::collections::HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        if let (Ok(name), Ok(val)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            map.insert(name, val);
        }
    }
    map
}

#[async_trait]
impl FetchEngine for FastEngine {
    fn name(&self) -> &'static str {
        "fast"
    }

    async fn fetch(&self, params: EngineParams<'_>) -> Result<FetchResult> {
        let started = std::time::Instant::now();
        let client = self.client_for(params.use_proxy).await?;

        if params.render_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(params.render_delay_ms)).await;
        }

        let response = client
            .get(params.url)
            .headers(build_header_map(params.headers))
            .send()
            .await
            .map_err(|e| FetchError::EngineError {
                engine: "fast".to_string(),
                reason: e.to_string(),
            })?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let response_headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| FetchError::EngineError {
            engine: "fast".to_string(),
            reason: e.to_string(),
        })?;

        let (content, response_type) = match params.response_type {
            ResponseType::Base64 => (
                base64::engine::general_purpose::STANDARD.encode(&bytes),
                ResponseType::Base64,
            ),
            ResponseType::Text => (String::from_utf8_lossy(&bytes).into_owned(), ResponseType::Text),
        };

        let headers = response_headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        Ok(FetchResult {
            success: true,
            url: params.url.to_string(),
            final_url,
            status_code,
            content,
            markdown: None,
            headers,
            response_type,
            engine_used: "fast".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cached_profile: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_client_for_direct_builds_without_proxy() {
        let engine = FastEngine::new(std::sync::Arc::new(ProxyPool::new()));
        let client = engine.client_for(false).await.unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn test_client_for_proxy_falls_back_when_pool_disabled() {
        let engine = FastEngine::new(std::sync::Arc::new(ProxyPool::new()));
        let client = engine.client_for(true).await.unwrap();
        drop(client);
    }

    #[test]
    fn test_build_header_map_filters_invalid_values() {
        let mut headers = HashMap::new();
        headers.insert("X-Test".to_string(), "value".to_string());
        headers.insert("Bad\nName".to_string(), "oops".to_string());
        let map = build_header_map(&headers);
        assert_eq!(map.get("X-Test").unwrap(), "value");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_engine_name() {
        let engine = FastEngine::new(std::sync::Arc::new(ProxyPool::new()));
        assert_eq!(engine.name(), "fast");
    }
}
