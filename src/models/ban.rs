use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub id: i64,
    pub identifier: String,
    pub reason: String,
    pub banned_at: String,
    pub expires_at: Option<String>,
    pub created_by: String,
}

impl Ban {
    /// Seconds until expiry from `now`, or `None` if permanent.
    pub fn retry_after(&self, now: chrono::DateTime<chrono::Utc>) -> Option<i64> {
        self.expires_at.as_ref().map(|ts| {
            let expires = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
                .map(|naive| chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(naive, chrono::Utc))
                .unwrap_or(now);
            (expires - now).num_seconds().max(0)
        })
    }
}
