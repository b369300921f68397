use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use super::defaults;

/// Top-level configuration for the admission & reputation engine.
/// Deserializes from a TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "defaults::default_server_config")]
    pub server: ServerConfig,

    #[serde(default = "defaults::default_admin_api_config")]
    pub admin_api: AdminApiConfig,

    #[serde(default = "defaults::default_storage_config")]
    pub storage: StorageConfig,

    #[serde(default = "defaults::default_rate_limit_config")]
    pub rate_limit: RateLimitConfig,

    #[serde(default = "defaults::default_abuse_config")]
    pub abuse: AbuseConfig,

    #[serde(default = "defaults::default_ban_config")]
    pub ban: BanConfig,

    #[serde(default = "defaults::default_request_log_config")]
    pub request_log: RequestLogConfig,

    #[serde(default = "defaults::default_geo_config")]
    pub geo: GeoConfig,

    #[serde(default = "defaults::default_reputation_config")]
    pub reputation: ReputationConfig,

    #[serde(default = "defaults::default_tor_list_config")]
    pub tor_list: TorListConfig,

    #[serde(default = "defaults::default_providers_config")]
    pub providers: ProvidersConfig,

    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: defaults::default_server_config(),
            admin_api: defaults::default_admin_api_config(),
            storage: defaults::default_storage_config(),
            rate_limit: defaults::default_rate_limit_config(),
            abuse: defaults::default_abuse_config(),
            ban: defaults::default_ban_config(),
            request_log: defaults::default_request_log_config(),
            geo: defaults::default_geo_config(),
            reputation: defaults::default_reputation_config(),
            tor_list: defaults::default_tor_list_config(),
            providers: defaults::default_providers_config(),
            logging: defaults::default_logging_config(),
        }
    }
}

/// Admin/admission-endpoint HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::default_bind")]
    pub bind: String,

    #[serde(default = "defaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Admin API authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminApiConfig {
    #[serde(default = "defaults::default_api_key")]
    pub api_key: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::default_sqlite_path")]
    pub sqlite_path: String,
}

/// Default rate-limit config applied when the request carries no API key.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "defaults::default_rl_limit")]
    pub limit: u32,

    #[serde(default = "defaults::default_rl_window_seconds")]
    pub window_seconds: u64,

    #[serde(default = "defaults::default_rl_sliding")]
    pub sliding: bool,
}

/// Abuse-detector (burst/baseline) tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct AbuseConfig {
    #[serde(default = "defaults::default_burst_threshold")]
    pub burst_threshold: u32,

    #[serde(default = "defaults::default_burst_window_seconds")]
    pub burst_window_seconds: u64,

    #[serde(default = "defaults::default_burst_multiplier")]
    pub burst_multiplier: f64,
}

/// Ban-registry tuning (auto-ban default duration).
#[derive(Debug, Clone, Deserialize)]
pub struct BanConfig {
    #[serde(default = "defaults::default_auto_ban_duration_secs")]
    pub auto_ban_duration_secs: i64,
}

/// Request-log audit verbosity and retention. Every admission check is
/// persisted to the request log regardless of this setting — the abuse
/// detector's burst/baseline rules depend on it; `log_all_requests` only
/// controls whether an additional `tracing` line is emitted per request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestLogConfig {
    #[serde(default)]
    pub log_all_requests: bool,

    #[serde(default = "defaults::default_retention_days")]
    pub retention_days: i64,
}

/// Geo-blocking default state (authoritative state lives in the registry
/// at runtime; this is only the startup seed).
#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub blocked_countries: Vec<String>,
}

/// Reputation engine tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "defaults::default_ip_ttl_seconds")]
    pub ip_ttl_seconds: i64,

    #[serde(default = "defaults::default_tor_detection_enabled")]
    pub tor_detection_enabled: bool,

    #[serde(default = "defaults::default_asn_ttl_seconds")]
    pub asn_ttl_seconds: i64,
}

/// Tor bulk-exit-list background updater configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TorListConfig {
    #[serde(default = "defaults::default_tor_list_url")]
    pub url: String,

    #[serde(default = "defaults::default_tor_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "defaults::default_tor_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "defaults::default_tor_fetch_on_startup")]
    pub fetch_on_startup: bool,
}

/// External reputation-provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "defaults::default_provider_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub privacy_api_token: Option<String>,

    #[serde(default)]
    pub reputation_api_key: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    pub level: String,

    #[serde(default = "defaults::default_log_file")]
    pub file: String,
}
