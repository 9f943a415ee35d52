//! Shared data model: requests, results, and persisted profiles.
//!
//! Generalizes the teacher's builder-style request struct
//! (`query.rs::SearchQuery`) and plain response struct
//! (`result.rs::SearchResult`) to the fields this service's API needs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which concrete engine to use for a fetch. `Auto` walks the
/// escalation ladder; any other variant forces a single engine and
/// skips the ladder entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Auto,
    Fast,
    RemoteBrowser,
    Stealth,
    Unblock,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::Auto
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineKind::Auto => "auto",
            EngineKind::Fast => "fast",
            EngineKind::RemoteBrowser => "remote_browser",
            EngineKind::Stealth => "stealth",
            EngineKind::Unblock => "unblock",
        };
        f.write_str(s)
    }
}

/// How the fetched body should be encoded in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Text,
    Base64,
}

/// The requested output shape. Stripping/markdown conversion is an
/// external library call (`html2md`-style), not part of the engine
/// contract itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Html,
    HtmlStripped,
    Markdown,
}

/// A single `POST /api/fetch` request.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub render_js: bool,
    #[serde(default)]
    pub wait_for_js: bool,
    #[serde(default)]
    pub render_delay_ms: u64,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub use_proxy: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            engine: EngineKind::Auto,
            render_js: false,
            wait_for_js: false,
            render_delay_ms: 0,
            proxy: None,
            headers: HashMap::new(),
            preset: None,
            format: OutputFormat::Html,
            response_type: ResponseType::Text,
            use_proxy: false,
        }
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_render_delay_ms(mut self, ms: u64) -> Self {
        self.render_delay_ms = ms;
        self
    }

    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    pub fn with_wait_for_js(mut self, wait_for_js: bool) -> Self {
        self.wait_for_js = wait_for_js;
        self
    }
}

/// The result of a `POST /api/fetch` request.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub success: bool,
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    pub headers: HashMap<String, String>,
    pub response_type: ResponseType,
    pub engine_used: String,
    pub duration_ms: u64,
    pub from_cached_profile: bool,
}

/// A regex pattern used to capture matching API responses made by the
/// page while it loads.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCapturePattern {
    pub url_pattern: String,
}

/// A resource to download through the live browser context (shares
/// cookies/session with the navigated page).
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSpec {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Where a captured resource should be uploaded after the fetch
/// completes: `${baseUrl}/api/files/${bucket}/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSink {
    pub base_url: String,
    pub bucket: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A `POST /api/fetch/advanced` request: extends [`FetchRequest`] with
/// a single opaque script to run after navigation, response-capture
/// patterns, binary downloads, and an optional upload sink.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvancedFetchRequest {
    pub url: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub render_delay_ms: u64,
    #[serde(default)]
    pub proxy: Option<String>,
    /// A single script evaluated against the live page after
    /// navigation. Not a structured action DSL — the service takes an
    /// opaque caller-authored script, nothing more.
    #[serde(default)]
    pub js_action: Option<String>,
    #[serde(default)]
    pub capture_patterns: Vec<ApiCapturePattern>,
    #[serde(default)]
    pub downloads: Vec<DownloadSpec>,
    #[serde(default)]
    pub upload_sink: Option<UploadSink>,
}

/// One API response captured while the page was loading.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedResponse {
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub body: String,
    pub timestamp_ms: u64,
}

/// One binary resource fetched via a new tab in the shared browser
/// context.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedResource {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// The outcome of an upload fan-out to an [`UploadSink`].
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_url: Option<String>,
    pub error: Option<String>,
}

/// The result of a `POST /api/fetch/advanced` request.
#[derive(Debug, Clone, Serialize)]
pub struct AdvancedFetchResult {
    pub success: bool,
    pub url: String,
    pub final_url: String,
    pub html: String,
    pub api_calls: Vec<CapturedResponse>,
    pub resources: Vec<DownloadedResource>,
    pub uploads: Vec<UploadOutcome>,
    pub duration_ms: u64,
}

/// One step of the auto-escalation ladder: an engine paired with a
/// proxy choice, a render-JS hint, and an extra render delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub engine: EngineKind,
    pub use_proxy: bool,
    pub render_js: bool,
    pub render_delay_ms: u64,
}

impl EscalationStep {
    pub const fn new(engine: EngineKind, use_proxy: bool, render_delay_ms: u64) -> Self {
        Self {
            engine,
            use_proxy,
            render_js: false,
            render_delay_ms,
        }
    }

    pub const fn with_render_js(mut self, render_js: bool) -> Self {
        self.render_js = render_js;
        self
    }
}

/// The persisted per-domain anti-bot profile: the ladder step that
/// last worked for this domain, so future requests skip straight to
/// it instead of re-walking the ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainProfile {
    pub domain: String,
    pub engine: EngineKind,
    pub use_proxy: bool,
    pub render_js: bool,
    pub render_delay_ms: u64,
    pub preset: Option<String>,
    pub hit_count: u64,
    pub last_status_code: Option<u16>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl DomainProfile {
    pub fn from_step(domain: impl Into<String>, step: EscalationStep, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            domain: domain.into(),
            engine: step.engine,
            use_proxy: step.use_proxy,
            render_js: step.render_js,
            render_delay_ms: step.render_delay_ms,
            preset: None,
            hit_count: 1,
            last_status_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn as_step(&self) -> EscalationStep {
        EscalationStep::new(self.engine, self.use_proxy, self.render_delay_ms).with_render_js(self.render_js)
    }
}

/// State of one browser-pool slot, reported by `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct BrowserSlot {
    pub index: usize,
    pub connected: bool,
    pub tabs_used: u64,
    pub active_tab_count: u32,
    pub stale: bool,
}

/// A named bundle of request headers (e.g. `"chrome"`), analogous to
/// the teacher's per-engine default config.
#[derive(Debug, Clone)]
pub struct HeaderPreset {
    pub name: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}
