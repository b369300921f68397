use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::models::envelope::Envelope;
use crate::models::reputation::ManualBlockKind;
use crate::Engine;

/// Shared state for the admin/admission façade. Thin by design: every
/// handler below only deserializes its request and calls into `Engine`
/// (spec.md §6) — no business logic lives here.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub api_key: String,
}

fn engine_error_status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::ValidationError(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        EngineError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: EngineError) -> axum::response::Response {
    let status = engine_error_status(&e);
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

// -- admission (the hot-path external surface, spec.md §6) ------------------

pub async fn check_admission(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> impl IntoResponse {
    let decision = state.engine.check(&envelope);

    let mut headers = HeaderMap::new();
    if let Some(limit) = decision.limit {
        if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
            headers.insert("X-RateLimit-Limit", v);
        }
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
    if !decision.allowed {
        if let Some(retry_after) = decision.retry_after {
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("Retry-After", v);
            }
        }
    }

    let status = if decision.allowed { StatusCode::OK } else { StatusCode::TOO_MANY_REQUESTS };
    (status, headers, Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub address: String,
    #[serde(default)]
    pub bypass_cache: bool,
}

pub async fn check_reputation(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> impl IntoResponse {
    let classification = state.engine.classify(&req.address, req.bypass_cache).await;
    Json(classification)
}

// -- API keys (admin CRUD, spec.md §6) ---------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub window_seconds: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

pub async fn create_key(State(state): State<AppState>, Json(req): Json<CreateKeyRequest>) -> axum::response::Response {
    let metadata = req.metadata.map(|v| v.to_string()).unwrap_or_else(|| "{}".to_string());
    match state.engine.api_keys().create(
        &req.name,
        req.limit.unwrap_or(state.engine.settings().rate_limit.limit),
        req.window_seconds.unwrap_or(state.engine.settings().rate_limit.window_seconds),
        req.expires_at.as_deref(),
        &metadata,
    ) {
        Ok((record, plaintext)) => Json(json!({ "key": record, "plaintext": plaintext })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_keys(State(state): State<AppState>, Query(p): Query<PageParams>) -> axum::response::Response {
    match state.engine.api_keys().list(p.limit.unwrap_or(100), p.offset.unwrap_or(0)) {
        Ok(keys) => Json(keys).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_key(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.engine.api_keys().get_by_id(id) {
        Ok(key) => Json(key).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn rotate_key(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.engine.api_keys().rotate(id) {
        Ok((record, plaintext)) => Json(json!({ "key": record, "plaintext": plaintext })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn deactivate_key(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.engine.api_keys().deactivate(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_key(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.engine.api_keys().delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// -- bans ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBanRequest {
    pub identifier: String,
    pub reason: String,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

pub async fn create_ban(State(state): State<AppState>, Json(req): Json<CreateBanRequest>) -> axum::response::Response {
    match state.engine.bans().create(&req.identifier, &req.reason, req.duration_seconds) {
        Ok(ban) => Json(ban).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_bans(State(state): State<AppState>, Query(p): Query<PageParams>) -> axum::response::Response {
    match state.engine.bans().list(p.limit.unwrap_or(100), p.offset.unwrap_or(0)) {
        Ok(bans) => Json(bans).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_ban(State(state): State<AppState>, Path(identifier): Path<String>) -> axum::response::Response {
    match state.engine.bans().get(&identifier) {
        Ok(ban) => Json(ban).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn remove_ban(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.engine.bans().remove(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// -- geo-blocks -----------------------------------------------------------------

pub async fn get_geo(State(state): State<AppState>) -> axum::response::Response {
    let enabled = state.engine.geo().is_enabled().unwrap_or(false);
    let countries = state.engine.geo().list().unwrap_or_default();
    Json(json!({ "enabled": enabled, "blocked_countries": countries })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SetGeoEnabledRequest {
    pub enabled: bool,
}

pub async fn set_geo_enabled(State(state): State<AppState>, Json(req): Json<SetGeoEnabledRequest>) -> axum::response::Response {
    match state.engine.geo().set_enabled(req.enabled) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddGeoRequest {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn add_geo(State(state): State<AppState>, Json(req): Json<AddGeoRequest>) -> axum::response::Response {
    match state.engine.geo().add(&req.code, req.name.as_deref()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn remove_geo(State(state): State<AppState>, Path(code): Path<String>) -> axum::response::Response {
    match state.engine.geo().remove(&code) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceGeoRequest {
    pub entries: Vec<(String, Option<String>)>,
}

pub async fn replace_geo(State(state): State<AppState>, Json(req): Json<ReplaceGeoRequest>) -> axum::response::Response {
    match state.engine.geo().replace_all(&req.entries) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// -- manual reputation blocks ---------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddManualBlockRequest {
    pub identifier: String,
    pub kind: ManualBlockKind,
    pub reason: String,
    pub blocked_by: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

pub async fn add_manual_block(State(state): State<AppState>, Json(req): Json<AddManualBlockRequest>) -> axum::response::Response {
    match state.engine.manual_blocks().add_manual_block(
        &req.identifier,
        req.kind,
        &req.reason,
        &req.blocked_by,
        req.expires_at.as_deref(),
    ) {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn list_manual_blocks(State(state): State<AppState>) -> axum::response::Response {
    match state.engine.manual_blocks().list_manual_blocks() {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveManualBlockParams {
    pub kind: ManualBlockKind,
}

pub async fn remove_manual_block(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(p): Query<RemoveManualBlockParams>,
) -> axum::response::Response {
    match state.engine.manual_blocks().remove_manual_block(&identifier, p.kind) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

// -- request-log aggregates -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub top_n: Option<i64>,
}

pub async fn get_aggregate(State(state): State<AppState>, Query(p): Query<AggregateParams>) -> axum::response::Response {
    match state.engine.request_log().aggregate(&p.from, &p.to, p.top_n.unwrap_or(10)) {
        Ok(agg) => Json(agg).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "tor_list_last_update": state.engine.tor_last_update(),
    }))
}
