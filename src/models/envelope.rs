use serde::{Deserialize, Serialize};

/// Inbound request metadata envelope — the only input the admission
/// endpoint accepts. `address` should already be resolved by the caller's
/// transport from standard proxy headers (`cf-connecting-ip`, first of
/// comma-split `x-forwarded-for`, or `x-real-ip`) when not supplied directly.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Envelope {
    pub address: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestMetadata {
    pub path: Option<String>,
    pub method: Option<String>,
    pub country: Option<String>,
    pub user_agent: Option<String>,
}

/// The six admission decision reasons (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Ok,
    RateLimited,
    Banned,
    GeoBlocked,
    InvalidKey,
    ExpiredKey,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Ok => "ok",
            DecisionReason::RateLimited => "rate_limited",
            DecisionReason::Banned => "banned",
            DecisionReason::GeoBlocked => "geo_blocked",
            DecisionReason::InvalidKey => "invalid_key",
            DecisionReason::ExpiredKey => "expired_key",
        }
    }
}

/// The admission endpoint's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub remaining: u32,
    pub reset_at: i64,
    pub limit: Option<u32>,
    pub retry_after: Option<i64>,
}

impl Decision {
    /// The spec.md §9 fail-open fallback: `{allowed=true, reason=ok,
    /// remaining=0, reset_at=0}`, emitted only when an unexpected store
    /// error occurs mid-pipeline.
    pub fn fail_open() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Ok,
            remaining: 0,
            reset_at: 0,
            limit: None,
            retry_after: None,
        }
    }
}
