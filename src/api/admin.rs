//! `GET`/`POST /api/config` and the `/api/domain-profiles` CRUD
//! surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::fetch::ErrorBody;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::types::{DomainProfile, EngineKind};

pub async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json((*state.config.current()).clone())
}

pub async fn set_config(
    State(state): State<AppState>,
    Json(new_config): Json<AppConfig>,
) -> Result<Json<AppConfig>, (StatusCode, Json<ErrorBody>)> {
    state
        .config
        .update(new_config.clone(), &state.paths)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&e))))?;
    Ok(Json(new_config))
}

#[derive(Serialize)]
pub struct DomainProfilesBody {
    pub profiles: Vec<DomainProfile>,
}

pub async fn list_domain_profiles(
    State(state): State<AppState>,
) -> Result<Json<DomainProfilesBody>, (StatusCode, Json<ErrorBody>)> {
    let profiles = state
        .profile_store
        .all()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&e))))?;
    Ok(Json(DomainProfilesBody { profiles }))
}

pub async fn delete_domain_profile(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let deleted = state
        .profile_store
        .delete(&domain)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&e))))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn get_domain_profile(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<DomainProfile>, (StatusCode, Json<ErrorBody>)> {
    let profile = state
        .profile_store
        .get(&domain)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&e))))?;
    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                success: false,
                error: format!("no profile for domain '{domain}'"),
            }),
        )),
    }
}

#[derive(Deserialize)]
pub struct UpsertDomainProfileRequest {
    pub domain: String,
    pub engine: EngineKind,
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default)]
    pub render_js: bool,
    #[serde(default)]
    pub render_delay_ms: u64,
    #[serde(default)]
    pub preset: Option<String>,
}

/// Admin-authored profiles start with a zero hit count and no
/// recorded status; both fill in naturally as the scheduler reuses
/// the profile.
pub async fn upsert_domain_profile(
    State(state): State<AppState>,
    Json(req): Json<UpsertDomainProfileRequest>,
) -> Result<Json<DomainProfile>, (StatusCode, Json<ErrorBody>)> {
    let now = chrono::Utc::now();
    let profile = DomainProfile {
        domain: req.domain,
        engine: req.engine,
        use_proxy: req.use_proxy,
        render_js: req.render_js,
        render_delay_ms: req.render_delay_ms,
        preset: req.preset,
        hit_count: 0,
        last_status_code: None,
        created_at: now,
        updated_at: now,
    };
    state
        .profile_store
        .upsert(&profile)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&e))))?;
    Ok(Json(profile))
}
