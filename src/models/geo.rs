use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoBlockSetting {
    pub enabled: bool,
    pub blocked_countries: Vec<String>,
}
