//! Engine abstraction for retrieving a URL's rendered content.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{FetchResult, ResponseType};

/// Strategy for waiting until a page is considered fully loaded.
#[derive(Debug, Clone, Default)]
pub enum WaitStrategy {
    /// Wait for the page load event.
    Load,
    /// Wait only for `domcontentloaded`, not the full load event.
    #[default]
    DomContentLoaded,
    /// Wait until network activity settles, falling back after
    /// `idle_ms` of no activity to a plain `domcontentloaded` wait.
    NetworkIdle {
        /// Milliseconds of network inactivity to wait for before
        /// falling back.
        idle_ms: u64,
    },
    /// Wait until a CSS selector matches an element on the page.
    Selector {
        /// CSS selector to wait for.
        css: String,
        /// Maximum time to wait in milliseconds before timing out.
        timeout_ms: u64,
    },
    /// Wait a fixed delay after the page load event.
    Delay {
        /// Milliseconds to wait after page load.
        ms: u64,
    },
}

/// The full set of knobs a fetch engine receives for one request.
/// Plain data rather than borrowing `FetchRequest` directly so engines
/// don't need to know about `EngineKind`/`from_cached_profile`.
#[derive(Debug, Clone)]
pub struct EngineParams<'a> {
    pub url: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub response_type: ResponseType,
    pub render_delay_ms: u64,
    pub use_proxy: bool,
    pub wait_for_js: bool,
}

/// Trait implemented by each concrete fetch engine (fast HTTP, remote
/// browser, local stealth browser, unblock). Carries the full request
/// contract instead of the teacher's bare `fetch(url) -> String`.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// A stable identifier used in logs and persisted domain profiles
    /// (e.g. `"fast"`, `"stealth"`).
    fn name(&self) -> &'static str;

    /// Fetches `params.url` and returns the result, including the
    /// HTTP status code the quality judge needs.
    async fn fetch(&self, params: EngineParams<'_>) -> Result<FetchResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_strategy_default() {
        let strategy = WaitStrategy::default();
        assert!(matches!(strategy, WaitStrategy::DomContentLoaded));
    }

    #[test]
    fn test_wait_strategy_network_idle() {
        let strategy = WaitStrategy::NetworkIdle { idle_ms: 500 };
        match strategy {
            WaitStrategy::NetworkIdle { idle_ms } => assert_eq!(idle_ms, 500),
            _ => panic!("Expected NetworkIdle"),
        }
    }

    #[test]
    fn test_wait_strategy_selector() {
        let strategy = WaitStrategy::Selector {
            css: "div.content".to_string(),
            timeout_ms: 5000,
        };
        match strategy {
            WaitStrategy::Selector { css, timeout_ms } => {
                assert_eq!(css, "div.content");
                assert_eq!(timeout_ms, 5000);
            }
            _ => panic!("Expected Selector"),
        }
    }

    #[test]
    fn test_wait_strategy_delay() {
        let strategy = WaitStrategy::Delay { ms: 1000 };
        match strategy {
            WaitStrategy::Delay { ms } => assert_eq!(ms, 1000),
            _ => panic!("Expected Delay"),
        }
    }

    #[test]
    fn test_wait_strategy_clone() {
        let original = WaitStrategy::Selector {
            css: "h1".to_string(),
            timeout_ms: 3000,
        };
        let cloned = original.clone();
        assert!(matches!(cloned, WaitStrategy::Selector { .. }));
    }

    #[test]
    fn test_wait_strategy_debug() {
        let strategy = WaitStrategy::Load;
        let debug = format!("{:?}", strategy);
        assert!(debug.contains("Load"));
    }

    #[test]
    fn test_engine_params_construction() {
        let headers = HashMap::new();
        let params = EngineParams {
            url: "https://example.com",
            headers: &headers,
            response_type: ResponseType::Text,
            render_delay_ms: 0,
            use_proxy: false,
            wait_for_js: false,
        };
        assert_eq!(params.url, "https://example.com");
        assert!(!params.use_proxy);
    }
}
