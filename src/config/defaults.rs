use super::settings::{
    AbuseConfig, AdminApiConfig, BanConfig, GeoConfig, LoggingConfig, ProvidersConfig,
    RateLimitConfig, ReputationConfig, RequestLogConfig, ServerConfig, StorageConfig,
    TorListConfig,
};

// ---------------------------------------------------------------------------
// Top-level struct defaults
// ---------------------------------------------------------------------------

pub fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind: default_bind(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

pub fn default_admin_api_config() -> AdminApiConfig {
    AdminApiConfig {
        api_key: default_api_key(),
    }
}

pub fn default_storage_config() -> StorageConfig {
    StorageConfig {
        sqlite_path: default_sqlite_path(),
    }
}

pub fn default_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        limit: default_rl_limit(),
        window_seconds: default_rl_window_seconds(),
        sliding: default_rl_sliding(),
    }
}

pub fn default_abuse_config() -> AbuseConfig {
    AbuseConfig {
        burst_threshold: default_burst_threshold(),
        burst_window_seconds: default_burst_window_seconds(),
        burst_multiplier: default_burst_multiplier(),
    }
}

pub fn default_ban_config() -> BanConfig {
    BanConfig {
        auto_ban_duration_secs: default_auto_ban_duration_secs(),
    }
}

pub fn default_request_log_config() -> RequestLogConfig {
    RequestLogConfig {
        log_all_requests: false,
        retention_days: default_retention_days(),
    }
}

pub fn default_geo_config() -> GeoConfig {
    GeoConfig {
        enabled: false,
        blocked_countries: Vec::new(),
    }
}

pub fn default_reputation_config() -> ReputationConfig {
    ReputationConfig {
        ip_ttl_seconds: default_ip_ttl_seconds(),
        tor_detection_enabled: default_tor_detection_enabled(),
        asn_ttl_seconds: default_asn_ttl_seconds(),
    }
}

pub fn default_tor_list_config() -> TorListConfig {
    TorListConfig {
        url: default_tor_list_url(),
        refresh_interval_secs: default_tor_refresh_interval_secs(),
        fetch_timeout_secs: default_tor_fetch_timeout_secs(),
        fetch_on_startup: default_tor_fetch_on_startup(),
    }
}

pub fn default_providers_config() -> ProvidersConfig {
    ProvidersConfig {
        timeout_ms: default_provider_timeout_ms(),
        privacy_api_token: None,
        reputation_api_key: None,
    }
}

pub fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file: default_log_file(),
    }
}

// ---------------------------------------------------------------------------
// Leaf field defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

pub fn default_request_timeout_secs() -> u64 {
    5
}

pub fn default_api_key() -> String {
    "change-me".to_string()
}

pub fn default_sqlite_path() -> String {
    "/opt/checkpoint/data/checkpoint.db".to_string()
}

pub fn default_rl_limit() -> u32 {
    100
}

pub fn default_rl_window_seconds() -> u64 {
    60
}

pub fn default_rl_sliding() -> bool {
    false
}

pub fn default_burst_threshold() -> u32 {
    50
}

pub fn default_burst_window_seconds() -> u64 {
    10
}

pub fn default_burst_multiplier() -> f64 {
    5.0
}

pub fn default_auto_ban_duration_secs() -> i64 {
    3600
}

pub fn default_retention_days() -> i64 {
    30
}

pub fn default_ip_ttl_seconds() -> i64 {
    3600
}

pub fn default_tor_detection_enabled() -> bool {
    true
}

pub fn default_asn_ttl_seconds() -> i64 {
    86_400
}

pub fn default_tor_list_url() -> String {
    "https://check.torproject.org/torbulkexitlist".to_string()
}

pub fn default_tor_refresh_interval_secs() -> u64 {
    3600
}

pub fn default_tor_fetch_timeout_secs() -> u64 {
    10
}

pub fn default_tor_fetch_on_startup() -> bool {
    true
}

pub fn default_provider_timeout_ms() -> u64 {
    5000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_file() -> String {
    "/opt/checkpoint/logs/checkpoint.log".to_string()
}
