//! # fetchcore
//!
//! An adaptive URL fetch service. Given a URL, it walks an escalation
//! ladder of fetch strategies — a plain HTTP client, a pooled remote
//! browser, a freshly launched stealth browser, an external unblocking
//! service — until a content-quality judge is satisfied, then
//! remembers the winning strategy per domain so future requests to the
//! same site skip straight to it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fetchcore::escalation::Scheduler;
//! use fetchcore::profile_store::ProfileStore;
//! use fetchcore::types::FetchRequest;
//! use std::sync::Arc;
//!
//! # async fn run() -> fetchcore::error::Result<()> {
//! let store = Arc::new(ProfileStore::in_memory()?);
//! let scheduler = Scheduler::new(store);
//! let request = FetchRequest::new("https://example.com");
//! // let result = scheduler.run(&request, build_engine).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "headless")]
pub mod advanced;
pub mod api;
#[cfg(feature = "headless")]
pub mod browser_pool;
#[cfg(feature = "headless")]
pub mod browser_setup;
pub mod config;
pub mod domain;
pub mod engines;
pub mod error;
pub mod escalation;
pub mod fetcher;
pub mod logging;
pub mod presets;
pub mod profile_store;
pub mod proxy;
pub mod quality;
pub mod types;

pub use error::{FetchError, Result};
