//! `POST /api/fetch` and `POST /api/fetch/advanced`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::engines;
use crate::error::FetchError;
use crate::presets;
#[cfg(feature = "headless")]
use crate::types::{AdvancedFetchRequest, AdvancedFetchResult};
use crate::types::{FetchRequest, FetchResult, ResponseType};

#[derive(Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl From<&FetchError> for ErrorBody {
    fn from(e: &FetchError) -> Self {
        Self {
            success: false,
            error: e.user_message(),
        }
    }
}

fn status_for(err: &FetchError) -> StatusCode {
    match err {
        FetchError::BadRequest(_) => StatusCode::BAD_REQUEST,
        FetchError::ExhaustedEscalation { .. } => StatusCode::BAD_GATEWAY,
        FetchError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Merges a named header preset's headers underneath any
/// request-supplied headers, which always win on conflict.
fn apply_preset(mut request: FetchRequest) -> FetchRequest {
    if let Some(name) = &request.preset {
        if let Some(preset) = presets::lookup(name) {
            for (key, value) in preset.headers {
                request.headers.entry((*key).to_string()).or_insert_with(|| (*value).to_string());
            }
        }
    }
    request
}

/// Builds a `success: false` result body for a failed fetch. The
/// endpoint contract is that `/api/fetch` always answers HTTP 200;
/// callers distinguish failure via the `success` field and `error`
/// is carried in `content` for visibility without a second field.
fn failure_result(request: &FetchRequest, err: &FetchError) -> FetchResult {
    FetchResult {
        success: false,
        url: request.url.clone(),
        final_url: request.url.clone(),
        status_code: 0,
        content: err.user_message(),
        markdown: None,
        headers: Default::default(),
        response_type: ResponseType::Text,
        engine_used: "none".to_string(),
        duration_ms: 0,
        from_cached_profile: false,
    }
}

pub async fn fetch(State(state): State<AppState>, Json(request): Json<FetchRequest>) -> Json<FetchResult> {
    if request.url.trim().is_empty() {
        let err = FetchError::BadRequest("url must not be empty".to_string());
        return Json(failure_result(&request, &err));
    }

    let request = apply_preset(request);
    let config = state.config.current();
    let browser_pool = state.browser_pool.clone();
    let proxy_pool = state.proxy_pool.clone();

    let result = state
        .scheduler
        .run(&request, &config, move |kind| engines::build(kind, &config, &proxy_pool, &browser_pool))
        .await;

    match result {
        Ok(result) => Json(result),
        Err(e) => Json(failure_result(&request, &e)),
    }
}

#[cfg(feature = "headless")]
fn failure_advanced_result(request: &AdvancedFetchRequest, err: &FetchError) -> AdvancedFetchResult {
    AdvancedFetchResult {
        success: false,
        url: request.url.clone(),
        final_url: request.url.clone(),
        html: err.user_message(),
        api_calls: Vec::new(),
        resources: Vec::new(),
        uploads: Vec::new(),
        duration_ms: 0,
    }
}

#[cfg(feature = "headless")]
pub async fn fetch_advanced(
    State(state): State<AppState>,
    Json(request): Json<AdvancedFetchRequest>,
) -> Json<AdvancedFetchResult> {
    if request.url.trim().is_empty() {
        let err = FetchError::BadRequest("url must not be empty".to_string());
        return Json(failure_advanced_result(&request, &err));
    }

    let Some(orchestrator) = &state.advanced else {
        let err = FetchError::Other("advanced fetch requires a configured browser pool".to_string());
        return Json(failure_advanced_result(&request, &err));
    };

    let url = request.url.clone();
    match orchestrator.run(request).await {
        Ok(result) => Json(result),
        Err(e) => Json(AdvancedFetchResult {
            success: false,
            url: url.clone(),
            final_url: url,
            html: e.user_message(),
            api_calls: Vec::new(),
            resources: Vec::new(),
            uploads: Vec::new(),
            duration_ms: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_apply_preset_fills_missing_headers_only() {
        let mut request = FetchRequest::new("https://example.com").with_preset("chrome");
        request.headers.insert("User-Agent".to_string(), "custom-agent".to_string());
        let merged = apply_preset(request);
        assert_eq!(merged.headers.get("User-Agent").unwrap(), "custom-agent");
        assert!(merged.headers.contains_key("Accept"));
    }

    #[test]
    fn test_apply_preset_unknown_name_is_noop() {
        let request = FetchRequest::new("https://example.com").with_preset("netscape");
        let merged = apply_preset(request);
        assert_eq!(merged.headers, HashMap::new());
    }

    #[test]
    fn test_status_for_bad_request() {
        let err = FetchError::BadRequest("x".into());
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }
}
