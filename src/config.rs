//! Global service configuration: a read-mostly snapshot held behind an
//! atomic swap so every in-flight request sees a consistent value
//! without blocking the admin API's writer.
//!
//! Generalizes the teacher's plain owned config structs
//! (`browser.rs::BrowserPoolConfig`, `proxy.rs::ProxyConfig`) into one
//! `AppConfig` snapshot type, swapped via `arc_swap::ArcSwap` instead
//! of rebuilt in place.

use crate::types::EngineKind;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A point-in-time snapshot of the service's tunable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub browserless_url: Option<String>,
    pub proxy_url: Option<String>,
    pub default_engine: EngineKind,
    pub browser_stealth: bool,
    pub browser_headless: bool,
    pub max_tabs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browserless_url: None,
            proxy_url: None,
            default_engine: EngineKind::Auto,
            browser_stealth: true,
            browser_headless: true,
            max_tabs: 4,
        }
    }
}

impl AppConfig {
    /// Builds a config from environment variables, falling back to
    /// hard defaults for anything unset.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("BROWSERLESS_URL") {
            if !v.is_empty() {
                cfg.browserless_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("PROXY_URL") {
            if !v.is_empty() {
                cfg.proxy_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("BROWSER_MAX_TABS") {
            if let Ok(n) = v.parse() {
                cfg.max_tabs = n;
            }
        }
        cfg
    }
}

/// Where on disk the service reads/writes persisted configuration and
/// runtime artifacts, derived from `DATA_DIR`/`LOGS_DIR` env vars.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Paths {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data")),
            logs_dir: std::env::var("LOGS_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./logs")),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("profiles.sqlite3")
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("app.log")
    }
}

/// The shared, hot-swappable configuration handle. Cloned cheaply
/// (an `Arc` underneath) and passed through `axum` state.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ArcSwap<AppConfig>>);

impl ConfigHandle {
    pub fn new(initial: AppConfig) -> Self {
        Self(Arc::new(ArcSwap::new(Arc::new(initial))))
    }

    /// Loads `<data_dir>/settings.json` if present, otherwise falls
    /// back to environment variables.
    pub fn load(paths: &Paths) -> Self {
        let settings_path = paths.settings_path();
        match std::fs::read_to_string(&settings_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(cfg) => Self::new(cfg),
                Err(e) => {
                    tracing::warn!(path = %settings_path.display(), error = %e, "failed to parse settings.json, falling back to env");
                    Self::new(AppConfig::from_env())
                }
            },
            Err(_) => Self::new(AppConfig::from_env()),
        }
    }

    /// The current snapshot. Cheap: an `Arc` clone, no lock.
    pub fn current(&self) -> Arc<AppConfig> {
        self.0.load_full()
    }

    /// Atomically replaces the snapshot and persists it to disk.
    pub fn update(&self, new_config: AppConfig, paths: &Paths) -> crate::error::Result<()> {
        self.0.store(Arc::new(new_config.clone()));
        persist(&new_config, &paths.settings_path())?;
        Ok(())
    }
}

fn persist(config: &AppConfig, path: &Path) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::error::FetchError::Other(format!("creating data dir: {e}")))?;
    }
    let file = std::fs::File::create(path)
        .map_err(|e| crate::error::FetchError::Other(format!("writing settings.json: {e}")))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| crate::error::FetchError::Other(format!("serializing settings.json: {e}")))?;
    Ok(())
}
