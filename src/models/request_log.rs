use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub identifier: String,
    pub path: Option<String>,
    pub method: Option<String>,
    pub allowed: bool,
    pub reason_code: String,
    pub country: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogRow {
    pub id: i64,
    pub identifier: String,
    pub path: Option<String>,
    pub method: Option<String>,
    pub allowed: bool,
    pub reason_code: String,
    pub country: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: String,
}

/// Admin-facing aggregate statistics over a time range (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub total: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub by_reason: Vec<(String, u64)>,
    pub top_identifiers: Vec<(String, u64)>,
    pub top_paths: Vec<(String, u64)>,
    pub active_bans: u64,
    pub active_keys: u64,
}
