pub mod admission;
pub mod admin_api;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod reputation_engine;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use admission::abuse::AbuseConfig;
use admission::pipeline::{AdmissionPipeline, DefaultRateLimit};
use config::settings::Settings;
use error::EngineResult;
use models::envelope::{Decision, Envelope};
use models::reputation::Classification;
use registry::api_keys::ApiKeyRegistry;
use registry::bans::BanRegistry;
use registry::geo::GeoBlockRegistry;
use registry::request_log::RequestLog;
use reputation_engine::engine::ReputationEngine;
use reputation_engine::tor_updater::TorListUpdater;
use store::Store;

/// The process-wide engine: one `Store` handle, the admission pipeline
/// (C10), and the reputation engine (C9) plus its background Tor-list
/// updater (C7), all initialized once at startup and shared by reference
/// — spec.md §9's redesign note against process-wide singletons and
/// dynamic service lookups. The admin CRUD surface (keys/bans/geo/request
/// log, §6) is exposed as thin registry accessors over the same `Store`.
pub struct Engine {
    store: Arc<Store>,
    pipeline: AdmissionPipeline,
    reputation: ReputationEngine,
    tor_updater: Arc<TorListUpdater>,
    settings: Settings,
}

impl Engine {
    /// Opens the store, runs schema migrations (handled by
    /// `Store::new`'s `CREATE TABLE IF NOT EXISTS` bootstrap), seeds the
    /// geo-block registry from config, and builds the provider registry —
    /// the process-wide initialization sequence spec.md §5 requires
    /// before accepting requests.
    pub fn new(settings: Settings) -> EngineResult<Self> {
        let store = Arc::new(Store::new(&settings.storage.sqlite_path)?);

        if settings.geo.enabled {
            store.geo_set_enabled(true)?;
        }
        for code in &settings.geo.blocked_countries {
            store.geo_add(code, None)?;
        }

        let providers = reputation_engine::providers::build_registry(
            settings.providers.timeout_ms,
            settings.providers.privacy_api_token.clone(),
            settings.providers.reputation_api_key.clone(),
        );

        let reputation = ReputationEngine::new(
            Arc::clone(&store),
            providers,
            settings.reputation.ip_ttl_seconds,
            settings.reputation.asn_ttl_seconds,
            settings.reputation.tor_detection_enabled,
        );

        let tor_updater = Arc::new(TorListUpdater::new(
            Arc::clone(&store),
            settings.tor_list.url.clone(),
            settings.tor_list.refresh_interval_secs,
            settings.tor_list.fetch_timeout_secs,
            settings.tor_list.fetch_on_startup,
        ));

        let pipeline = AdmissionPipeline::new(
            Arc::clone(&store),
            DefaultRateLimit {
                limit: settings.rate_limit.limit,
                window_seconds: settings.rate_limit.window_seconds,
                sliding: settings.rate_limit.sliding,
            },
            AbuseConfig {
                burst_threshold: settings.abuse.burst_threshold,
                burst_window_seconds: settings.abuse.burst_window_seconds,
                burst_multiplier: settings.abuse.burst_multiplier,
                auto_ban_duration_secs: settings.ban.auto_ban_duration_secs,
            },
            settings.request_log.log_all_requests,
        );

        Ok(Self {
            store,
            pipeline,
            reputation,
            tor_updater,
            settings,
        })
    }

    /// The admission endpoint's only external surface (spec.md §6).
    pub fn check(&self, envelope: &Envelope) -> Decision {
        self.pipeline.check(envelope)
    }

    /// The reputation endpoint (spec.md §6).
    pub async fn classify(&self, address: &str, bypass_cache: bool) -> Classification {
        self.reputation.classify(address, bypass_cache).await
    }

    pub fn api_keys(&self) -> ApiKeyRegistry<'_> {
        ApiKeyRegistry::new(&self.store)
    }

    pub fn bans(&self) -> BanRegistry<'_> {
        BanRegistry::new(&self.store)
    }

    pub fn geo(&self) -> GeoBlockRegistry<'_> {
        GeoBlockRegistry::new(&self.store)
    }

    pub fn request_log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.store)
    }

    pub fn manual_blocks(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tor_last_update(&self) -> i64 {
        self.tor_updater.last_update()
    }

    /// Starts the Tor-list updater and the periodic retention sweep
    /// (counters, bans, request log, reputation caches). Returns the
    /// join handles so the caller can `.abort()` them on shutdown —
    /// lifecycle ordering mirrors the teacher's `main.rs::cleanup_loop`
    /// spawn-then-ctrl_c-then-abort shape.
    pub fn spawn_background_tasks(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let updater = Arc::clone(&self.tor_updater);
        handles.push(tokio::spawn(async move {
            updater.run().await;
        }));

        let engine = Arc::clone(&self);
        let window_seconds = engine.settings.rate_limit.window_seconds;
        let retention_days = engine.settings.request_log.retention_days;
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = engine.store.cleanup_counters(window_seconds) {
                    warn!(error = %e, "counter cleanup failed");
                }
                if let Err(e) = engine.store.cleanup_bans() {
                    warn!(error = %e, "ban cleanup failed");
                }
                if let Err(e) = engine.store.cleanup_request_log(retention_days) {
                    warn!(error = %e, "request log cleanup failed");
                }
                if let Err(e) = engine.store.cleanup_reputation() {
                    warn!(error = %e, "reputation cleanup failed");
                }
                info!("retention sweep complete");
            }
        }));

        handles
    }
}
