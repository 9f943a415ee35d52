//! Concrete fetch engine implementations.

mod fast;
#[cfg(feature = "headless")]
mod remote_browser;
#[cfg(feature = "headless")]
mod stealth;
mod unblock;

pub use fast::FastEngine;
#[cfg(feature = "headless")]
pub use remote_browser::RemoteBrowserEngine;
#[cfg(feature = "headless")]
pub use stealth::StealthEngine;
pub use unblock::UnblockEngine;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{FetchError, Result};
use crate::fetcher::FetchEngine;
use crate::proxy::ProxyPool;
use crate::types::EngineKind;

/// A handle to the shared browser pool, or a zero-sized placeholder
/// when the `headless` feature is off. Lets callers (`AppState`,
/// `main.rs`) hold an `Option<BrowserPoolHandle>` field without
/// `#[cfg]`-gating the field itself.
#[cfg(feature = "headless")]
pub type BrowserPoolHandle = Arc<crate::browser_pool::BrowserPool>;
#[cfg(not(feature = "headless"))]
pub type BrowserPoolHandle = ();

/// Builds the concrete engine for a non-`Auto` [`EngineKind`]. `Auto`
/// is handled by the escalation scheduler, which picks a concrete
/// engine per ladder step — this function is never called with it.
pub fn build(
    kind: EngineKind,
    config: &AppConfig,
    proxy_pool: &Arc<ProxyPool>,
    browser_pool: &Option<BrowserPoolHandle>,
) -> Result<Arc<dyn FetchEngine>> {
    match kind {
        EngineKind::Auto => Err(FetchError::Other(
            "build() called with EngineKind::Auto; callers must resolve a concrete engine first".to_string(),
        )),
        EngineKind::Fast => Ok(Arc::new(FastEngine::new(Arc::clone(proxy_pool)))),
        #[cfg(feature = "headless")]
        EngineKind::RemoteBrowser => {
            let pool = browser_pool
                .clone()
                .ok_or_else(|| FetchError::Other("remote_browser engine requires BROWSERLESS_URL".to_string()))?;
            Ok(Arc::new(RemoteBrowserEngine::new(pool)))
        }
        #[cfg(not(feature = "headless"))]
        EngineKind::RemoteBrowser => Err(FetchError::Other(
            "remote_browser engine requires the 'headless' feature".to_string(),
        )),
        #[cfg(feature = "headless")]
        EngineKind::Stealth => Ok(Arc::new(StealthEngine::new())),
        #[cfg(not(feature = "headless"))]
        EngineKind::Stealth => Err(FetchError::Other(
            "stealth engine requires the 'headless' feature".to_string(),
        )),
        EngineKind::Unblock => {
            let browserless_url = config
                .browserless_url
                .clone()
                .ok_or_else(|| FetchError::Other("unblock engine requires a configured endpoint".to_string()))?;
            Ok(Arc::new(UnblockEngine::new(browserless_url)))
        }
    }
}
