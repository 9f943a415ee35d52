//! N-slot pool of browser connections to one remote CDP endpoint.
//!
//! Generalizes the teacher's single-browser `BrowserPool`
//! (`browser.rs`, one lazily launched browser gated by a tab
//! semaphore) and the pack's multi-connection pool
//! (`other_examples/…foia-src-browser-pool.rs`, a fixed `Vec` of
//! connections selected round-robin with per-connection health
//! tracking) into a fixed-size array of slots against a single
//! `BROWSERLESS_URL`, each slot independently connected, recycled, and
//! retried.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::error::{FetchError, Result};

/// Tabs a slot serves before it is marked stale; the next arrival that
/// finds it idle tears it down and reconnects, bounding per-process
/// memory growth in the remote browser without interrupting in-flight
/// work.
const MAX_TABS_BEFORE_RECYCLE: u64 = 200;

struct Slot {
    browser: Mutex<Option<Arc<Browser>>>,
    /// A tab pointed at a blank document, opened alongside the
    /// connection solely to keep the remote browser instance alive
    /// when every work tab is momentarily closed.
    keepalive: Mutex<Option<Page>>,
    connecting: Notify,
    is_connecting: AtomicBool,
    tabs_used: AtomicU64,
    active_tab_count: AtomicU64,
    stale: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Self {
            browser: Mutex::new(None),
            keepalive: Mutex::new(None),
            connecting: Notify::new(),
            is_connecting: AtomicBool::new(false),
            tabs_used: AtomicU64::new(0),
            active_tab_count: AtomicU64::new(0),
            stale: AtomicBool::new(false),
        }
    }
}

/// Point-in-time view of one slot, reported by `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub index: usize,
    pub connected: bool,
    pub tabs_used: u64,
    pub active_tab_count: u64,
    pub stale: bool,
}

/// A pool of `slots` independent connections to `endpoint`, dispatched
/// round robin. Each slot lazily connects on first use and recycles
/// itself after [`MAX_TABS_BEFORE_RECYCLE`] tabs.
pub struct BrowserPool {
    endpoint: String,
    slots: Vec<Slot>,
    cursor: AtomicUsize,
}

impl BrowserPool {
    pub fn new(endpoint: impl Into<String>, slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            endpoint: endpoint.into(),
            slots: (0..slots).map(|_| Slot::new()).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_slot_index(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len()
    }

    /// Resolves `self.endpoint` to a concrete `webSocketDebuggerUrl`.
    /// Browserless-style endpoints are often bare `ws(s)://host:port`
    /// addresses that must be exchanged for a session-specific
    /// WebSocket URL via the CDP `/json/version` handshake; an
    /// endpoint that is already a full debugger URL (contains a path)
    /// is used as-is.
    async fn resolve_ws_endpoint(&self) -> Result<String> {
        if self.endpoint.matches('/').count() > 2 {
            return Ok(self.endpoint.clone());
        }

        let http_base = self
            .endpoint
            .replacen("wss://", "https://", 1)
            .replacen("ws://", "http://", 1);
        let version_url = format!("{}/json/version", http_base.trim_end_matches('/'));

        let body: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| FetchError::PoolDisconnected(format!("resolving {version_url}: {e}")))?
            .json()
            .await
            .map_err(|e| FetchError::PoolDisconnected(format!("parsing version info from {version_url}: {e}")))?;

        body.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| FetchError::PoolDisconnected(format!("no webSocketDebuggerUrl in {version_url} response")))
    }

    async fn connect(&self) -> Result<(Browser, Page)> {
        let ws_url = self.resolve_ws_endpoint().await?;
        let (browser, mut handler) = Browser::connect(&ws_url)
            .await
            .map_err(|e| FetchError::PoolDisconnected(format!("connect to {ws_url}: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser pool CDP handler error: {e}");
                }
            }
            debug!("browser pool CDP handler exited");
        });

        let keepalive = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::PoolDisconnected(format!("opening keepalive tab: {e}")))?;

        Ok((browser, keepalive))
    }

    /// Returns the slot's connection, connecting it if this is the
    /// first use or it was recycled. Concurrent callers targeting the
    /// same not-yet-connected slot wait on the single in-flight
    /// connect attempt instead of racing to dial twice.
    async fn ensure_connected(&self, slot: &Slot) -> Result<Arc<Browser>> {
        loop {
            {
                let guard = slot.browser.lock().await;
                if let Some(ref browser) = *guard {
                    return Ok(Arc::clone(browser));
                }
            }

            if slot
                .is_connecting
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let result = self.connect().await;
                let mut guard = slot.browser.lock().await;
                let outcome = match result {
                    Ok((browser, keepalive)) => {
                        let browser = Arc::new(browser);
                        *guard = Some(Arc::clone(&browser));
                        *slot.keepalive.lock().await = Some(keepalive);
                        Ok(browser)
                    }
                    Err(e) => Err(e),
                };
                drop(guard);
                slot.is_connecting.store(false, Ordering::SeqCst);
                slot.connecting.notify_waiters();
                return outcome;
            }

            slot.connecting.notified().await;
        }
    }

    /// Drops the slot's connection and keepalive tab and resets its
    /// counters, forcing the next [`ensure_connected`] call to dial
    /// fresh.
    async fn teardown(&self, slot: &Slot) {
        if let Some(page) = slot.keepalive.lock().await.take() {
            page.close().await.ok();
        }
        *slot.browser.lock().await = None;
        slot.tabs_used.store(0, Ordering::SeqCst);
        slot.stale.store(false, Ordering::SeqCst);
    }

    /// Opens a new tab on a round-robin slot and hands it to `f`,
    /// recycling the slot afterward if it has crossed the tab budget.
    /// On a `PoolDisconnected` failure, reconnects the slot once and
    /// retries before giving up.
    pub async fn with_page<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn(Page) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T>> + Send,
    {
        let index = self.next_slot_index();
        let slot = &self.slots[index];

        match self.open_tab_and_run(slot, &f).await {
            Ok(value) => Ok(value),
            Err(FetchError::PoolDisconnected(reason)) => {
                warn!(slot = index, reason = %reason, "reconnecting slot after disconnect");
                self.teardown(slot).await;
                self.open_tab_and_run(slot, &f).await
            }
            Err(e) => Err(e),
        }
    }

    async fn open_tab_and_run<F, Fut, T>(&self, slot: &Slot, f: &F) -> Result<T>
    where
        F: Fn(Page) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T>> + Send,
    {
        // A slot crossed the recycle budget on a previous call but was
        // still serving in-flight tabs at the time; only tear it down
        // once it is actually idle, so recycling never interrupts
        // in-flight work.
        if slot.stale.load(Ordering::SeqCst) && slot.active_tab_count.load(Ordering::SeqCst) == 0 {
            debug!("recycling idle stale browser pool slot");
            self.teardown(slot).await;
        }

        let browser = self.ensure_connected(slot).await?;
        slot.active_tab_count.fetch_add(1, Ordering::SeqCst);

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::PoolDisconnected(format!("open tab: {e}")));

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                slot.active_tab_count.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        let result = f(page).await;
        slot.active_tab_count.fetch_sub(1, Ordering::SeqCst);
        let used = slot.tabs_used.fetch_add(1, Ordering::SeqCst) + 1;

        if used >= MAX_TABS_BEFORE_RECYCLE {
            slot.stale.store(true, Ordering::SeqCst);
        }

        result
    }

    /// A snapshot of every slot's state.
    pub async fn status(&self) -> Vec<SlotStatus> {
        let mut out = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            let connected = slot.browser.lock().await.is_some();
            out.push(SlotStatus {
                index,
                connected,
                tabs_used: slot.tabs_used.load(Ordering::SeqCst),
                active_tab_count: slot.active_tab_count.load(Ordering::SeqCst),
                stale: slot.stale.load(Ordering::SeqCst),
            });
        }
        out
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_has_requested_slot_count() {
        let pool = BrowserPool::new("ws://localhost:9222", 4);
        assert_eq!(pool.slot_count(), 4);
    }

    #[test]
    fn test_new_pool_clamps_zero_slots_to_one() {
        let pool = BrowserPool::new("ws://localhost:9222", 0);
        assert_eq!(pool.slot_count(), 1);
    }

    #[test]
    fn test_round_robin_cursor_wraps() {
        let pool = BrowserPool::new("ws://localhost:9222", 3);
        let seen: Vec<usize> = (0..6).map(|_| pool.next_slot_index()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[tokio::test]
    async fn test_status_reports_disconnected_slots_initially() {
        let pool = BrowserPool::new("ws://localhost:9222", 2);
        let statuses = pool.status().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.connected));
        assert!(statuses.iter().all(|s| !s.stale));
    }
}
