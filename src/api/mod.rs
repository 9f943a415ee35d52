//! HTTP surface: the `axum` router and the shared state every handler
//! reads from.
//!
//! New module — the teacher shipped as a library/CLI with no HTTP
//! server of its own. Routing and extractor shape are grounded on
//! `other_examples/…riptide-headless-src-cdp.rs`'s `State`-held
//! launcher plus `Json` in/out handlers.

mod admin;
mod fetch;
mod status;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "headless")]
use crate::advanced::AdvancedOrchestrator;
use crate::config::{ConfigHandle, Paths};
use crate::engines::BrowserPoolHandle;
use crate::escalation::Scheduler;
use crate::logging::RingBufferWriter;
use crate::profile_store::ProfileStore;
use crate::proxy::ProxyPool;

/// Everything a request handler needs, cloned cheaply behind `Arc`s
/// and an `axum::extract::State`.
///
/// `browser_pool` is typed via [`BrowserPoolHandle`], a type alias
/// that collapses to `()` when the `headless` feature is off, so this
/// field never needs its own `#[cfg]`.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    #[cfg(feature = "headless")]
    pub advanced: Option<Arc<AdvancedOrchestrator>>,
    pub config: ConfigHandle,
    pub paths: Arc<Paths>,
    pub proxy_pool: Arc<ProxyPool>,
    pub browser_pool: Option<BrowserPoolHandle>,
    pub profile_store: Arc<ProfileStore>,
    pub logs: RingBufferWriter,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/fetch", post(fetch::fetch))
        .route("/api/status", get(status::status));

    #[cfg(feature = "headless")]
    let router = router.route("/api/fetch/advanced", post(fetch::fetch_advanced));

    router
        .route("/api/config", get(admin::get_config).post(admin::set_config))
        .route(
            "/api/domain-profiles",
            get(admin::list_domain_profiles).post(admin::upsert_domain_profile),
        )
        .route(
            "/api/domain-profiles/{domain}",
            get(admin::get_domain_profile).delete(admin::delete_domain_profile),
        )
        .with_state(state)
}
