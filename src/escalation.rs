//! Auto-escalation scheduler: walks an ordered ladder of
//! (engine, proxy, render delay) steps until the content quality
//! judge is satisfied, then persists the winning step as that
//! domain's [`DomainProfile`].
//!
//! The orchestration shape — iterate a list of collaborators, give
//! each a bounded timeout, continue past failures instead of aborting
//! — is carried over from the teacher's `search.rs::Search::search`
//! (there run in parallel across ranked search engines; here walked
//! sequentially, since each step is strictly more expensive than the
//! last and should only run if its predecessor was judged
//! insufficient).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::extract_domain;
use crate::engines;
use crate::error::{FetchError, Result};
use crate::fetcher::{EngineParams, FetchEngine};
use crate::profile_store::ProfileStore;
use crate::quality::sufficient;
use crate::types::{EngineKind, EscalationStep, FetchRequest, FetchResult, ResponseType};

const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// The true ladder default: the cheapest step, tried first for any
/// domain with no persisted profile. Never persisted as a win (it is
/// the scheduler's own starting point).
pub const DEFAULT_STEP: EscalationStep = EscalationStep::new(EngineKind::Fast, true, 0);

/// Builds the escalation ladder from the current global config. Steps
/// gated on "remote endpoint configured" or "proxy configured" drop
/// out entirely rather than running and failing.
pub fn build_ladder(config: &AppConfig) -> Vec<EscalationStep> {
    let has_proxy = config.proxy_url.is_some();
    let has_remote = config.browserless_url.is_some();

    let mut ladder = Vec::with_capacity(6);
    if has_proxy {
        ladder.push(EscalationStep::new(EngineKind::Fast, true, 0));
    }
    ladder.push(EscalationStep::new(EngineKind::Fast, false, 0));
    if has_remote {
        ladder.push(EscalationStep::new(EngineKind::RemoteBrowser, false, 2000));
    }
    ladder.push(EscalationStep::new(EngineKind::Stealth, false, 3000));
    if has_remote {
        ladder.push(EscalationStep::new(EngineKind::Stealth, false, 5000));
        ladder.push(EscalationStep::new(EngineKind::Unblock, false, 0));
    }
    ladder
}

/// Runs one request through the escalation scheduler: a forced
/// engine skips straight to a single attempt; `Auto` consults the
/// domain's persisted profile first, then walks a ladder built from
/// the current config.
pub struct Scheduler {
    store: Arc<ProfileStore>,
}

impl Scheduler {
    pub fn new(store: Arc<ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn run(
        &self,
        request: &FetchRequest,
        config: &AppConfig,
        build_engine: impl Fn(EngineKind) -> Result<Arc<dyn FetchEngine>>,
    ) -> Result<FetchResult> {
        if request.response_type == ResponseType::Base64 {
            // Binary payloads can't be judged by the content-quality
            // heuristics; always a direct single-shot fast fetch.
            return self.run_step(request, EscalationStep::new(EngineKind::Fast, request.use_proxy, 0), &build_engine).await;
        }

        if request.engine != EngineKind::Auto {
            return self.run_step(
                request,
                EscalationStep::new(request.engine, request.use_proxy, request.render_delay_ms),
                &build_engine,
            ).await;
        }

        let domain = extract_domain(&request.url)?;

        if let Some(profile) = self.store.get(&domain)? {
            let step = profile.as_step();
            match self.run_step(request, step, &build_engine).await {
                Ok(result) if sufficient(&result.content, result.status_code) => {
                    if let Err(e) = self.store.increment_hit(&domain) {
                        warn!(domain = %domain, error = %e, "failed to record cache hit");
                    }
                    let mut result = result;
                    result.from_cached_profile = true;
                    return Ok(result);
                }
                // Per spec: a cached-profile failure is reported, not
                // re-escalated, so operators see degradation instead
                // of it being silently masked by the ladder.
                Ok(result) => return Ok(result),
                Err(e) => return Err(e),
            }
        }

        self.walk_ladder(request, &domain, config, &build_engine).await
    }

    async fn walk_ladder(
        &self,
        request: &FetchRequest,
        domain: &str,
        config: &AppConfig,
        build_engine: &impl Fn(EngineKind) -> Result<Arc<dyn FetchEngine>>,
    ) -> Result<FetchResult> {
        let ladder = build_ladder(config);
        for (index, step) in ladder.iter().enumerate() {
            match self.run_step(request, *step, build_engine).await {
                Ok(result) if sufficient(&result.content, result.status_code) => {
                    info!(domain = %domain, step = index, engine = %step.engine, "escalation ladder succeeded");
                    self.persist_if_applicable(domain, *step);
                    return Ok(result);
                }
                Ok(_) => debug!(domain = %domain, step = index, "ladder step insufficient, escalating"),
                Err(e) => debug!(domain = %domain, step = index, error = %e, "ladder step failed, escalating"),
            }
        }

        Err(FetchError::ExhaustedEscalation {
            domain: domain.to_string(),
            steps: ladder.len(),
        })
    }

    /// Per the resolved Open Question: every winning step is
    /// persisted except the true ladder default itself, since
    /// persisting it would add a DB round-trip to the already-fastest
    /// path for no benefit.
    fn persist_if_applicable(&self, domain: &str, step: EscalationStep) {
        if step == DEFAULT_STEP {
            return;
        }
        let profile = crate::types::DomainProfile::from_step(domain, step, chrono::Utc::now());
        if let Err(e) = self.store.upsert(&profile) {
            warn!(domain = %domain, error = %e, "failed to persist domain profile");
        }
    }

    async fn run_step(
        &self,
        request: &FetchRequest,
        step: EscalationStep,
        build_engine: &impl Fn(EngineKind) -> Result<Arc<dyn FetchEngine>>,
    ) -> Result<FetchResult> {
        let engine = build_engine(step.engine)?;
        let empty_headers: HashMap<String, String> = HashMap::new();
        let headers = if request.headers.is_empty() { &empty_headers } else { &request.headers };

        let params = EngineParams {
            url: &request.url,
            headers,
            response_type: request.response_type,
            render_delay_ms: step.render_delay_ms,
            use_proxy: step.use_proxy,
            wait_for_js: request.wait_for_js,
        };

        timeout(STEP_TIMEOUT, engine.fetch(params))
            .await
            .map_err(|_| FetchError::EngineError {
                engine: step.engine.to_string(),
                reason: "step timed out".to_string(),
            })?
    }
}
