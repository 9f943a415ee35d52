//! `GET /api/status`: uptime, recent log lines, and browser pool
//! slot health.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
#[cfg(feature = "headless")]
use crate::browser_pool::SlotStatus;

#[derive(Serialize)]
pub struct StatusBody {
    pub uptime_seconds: u64,
    #[cfg(feature = "headless")]
    pub browser_pool: Vec<SlotStatus>,
    pub recent_logs: Vec<String>,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    #[cfg(feature = "headless")]
    let browser_pool = match &state.browser_pool {
        Some(pool) => pool.status().await,
        None => Vec::new(),
    };

    Json(StatusBody {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        #[cfg(feature = "headless")]
        browser_pool,
        recent_logs: state.logs.snapshot(),
    })
}
