use serde::{Deserialize, Serialize};

/// A registered API key. The store only ever persists `key_fingerprint`
/// (hex SHA-256 of the plaintext) — the plaintext is returned to the
/// caller exactly once, at creation and at rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub key_fingerprint: String,
    pub display_name: String,
    pub limit: u32,
    pub window_seconds: u64,
    pub active: bool,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub metadata: String,
}
