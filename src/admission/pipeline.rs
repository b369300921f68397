use tracing::{error, info};

use crate::error::EngineError;
use crate::models::counter::CounterConfig;
use crate::models::envelope::{Decision, DecisionReason, Envelope};
use crate::models::identifier::Identifier;
use crate::models::request_log::RequestLogEntry;
use crate::registry::api_keys::ApiKeyRegistry;
use crate::store::Store;

use super::abuse::{AbuseConfig, AbuseDetector};

/// Default rate-limit configuration applied when the request carries no
/// (or an invalid) API key.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRateLimit {
    pub limit: u32,
    pub window_seconds: u64,
    pub sliding: bool,
}

/// Top-level admission orchestration (C10, spec.md §4.10): a layered
/// short-circuit function modeled on the teacher's
/// `protection::pipeline::ProtectionPipeline::process` early-return
/// structure (ban -> geo -> key -> rate limit -> abuse, each an
/// `if let Some(...) = ... { return ... }`).
pub struct AdmissionPipeline {
    store: std::sync::Arc<Store>,
    default_rate_limit: DefaultRateLimit,
    abuse_cfg: AbuseConfig,
    log_all_requests: bool,
}

impl AdmissionPipeline {
    pub fn new(
        store: std::sync::Arc<Store>,
        default_rate_limit: DefaultRateLimit,
        abuse_cfg: AbuseConfig,
        log_all_requests: bool,
    ) -> Self {
        Self {
            store,
            default_rate_limit,
            abuse_cfg,
            log_all_requests,
        }
    }

    /// `Check(envelope) -> Decision` (spec.md §4.10). Any unexpected store
    /// error mid-pipeline is caught here and mapped to the fixed fail-open
    /// fallback plus an error log (spec.md §9's redesign note) — the
    /// pipeline otherwise never returns a bare `Result` to its caller.
    pub fn check(&self, envelope: &Envelope) -> Decision {
        match self.check_inner(envelope) {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, "admission pipeline error, failing open");
                Decision::fail_open()
            }
        }
    }

    fn check_inner(&self, envelope: &Envelope) -> Result<Decision, EngineError> {
        // Step 1: derive a preliminary identifier. Ban/geo checks below run
        // against this identifier; a supplied api_key resolves to its
        // numeric key id only at step 4 (spec.md §4.10 step 1 & step 4).
        let mut identifier = match (&envelope.api_key, &envelope.address) {
            (Some(token), _) => Identifier::ApiKeyId(token.clone()),
            (None, Some(addr)) => Identifier::NetworkAddress(addr.clone()),
            (None, None) => {
                let decision = Decision {
                    allowed: false,
                    reason: DecisionReason::InvalidKey,
                    remaining: 0,
                    reset_at: 0,
                    limit: None,
                    retry_after: None,
                };
                self.log(&decision, "", envelope)?;
                return Ok(decision);
            }
        };

        // Step 2: ban check.
        if let Some(ban) = self.store.is_banned(identifier.value())? {
            let decision = Decision {
                allowed: false,
                reason: DecisionReason::Banned,
                remaining: 0,
                reset_at: 0,
                limit: None,
                retry_after: ban.retry_after(chrono::Utc::now()),
            };
            self.log(&decision, identifier.value(), envelope)?;
            return Ok(decision);
        }

        // Step 3: geo check.
        if self.store.geo_is_enabled()? {
            if let Some(country) = &envelope.metadata.country {
                if self.store.geo_is_blocked(country)? {
                    let decision = Decision {
                        allowed: false,
                        reason: DecisionReason::GeoBlocked,
                        remaining: 0,
                        reset_at: 0,
                        limit: None,
                        retry_after: None,
                    };
                    self.log(&decision, identifier.value(), envelope)?;
                    return Ok(decision);
                }
            }
        }

        // Step 4: key validation / effective rate-limit config.
        let effective_cfg = if let Some(token) = &envelope.api_key {
            let registry = ApiKeyRegistry::new(&self.store);
            let key = registry.lookup(token)?;
            match key {
                None => {
                    let decision = Decision {
                        allowed: false,
                        reason: DecisionReason::InvalidKey,
                        remaining: 0,
                        reset_at: 0,
                        limit: None,
                        retry_after: None,
                    };
                    self.log(&decision, identifier.value(), envelope)?;
                    return Ok(decision);
                }
                Some(key) if ApiKeyRegistry::is_expired(&key) => {
                    let decision = Decision {
                        allowed: false,
                        reason: DecisionReason::ExpiredKey,
                        remaining: 0,
                        reset_at: 0,
                        limit: None,
                        retry_after: None,
                    };
                    self.log(&decision, identifier.value(), envelope)?;
                    return Ok(decision);
                }
                Some(key) => {
                    identifier = Identifier::ApiKeyId(key.id.to_string());
                    CounterConfig {
                        limit: key.limit,
                        window_seconds: key.window_seconds,
                        sliding: self.default_rate_limit.sliding,
                    }
                }
            }
        } else {
            CounterConfig {
                limit: self.default_rate_limit.limit,
                window_seconds: self.default_rate_limit.window_seconds,
                sliding: self.default_rate_limit.sliding,
            }
        };

        // Step 5: rate-limit check.
        let counter_result = self.store.check_counter(identifier.value(), effective_cfg);

        let mut decision = Decision {
            allowed: counter_result.allowed,
            reason: if counter_result.allowed {
                DecisionReason::Ok
            } else {
                DecisionReason::RateLimited
            },
            remaining: counter_result.remaining,
            reset_at: counter_result.reset_at,
            limit: Some(counter_result.limit),
            retry_after: if counter_result.allowed {
                None
            } else {
                Some((counter_result.reset_at - chrono::Utc::now().timestamp()).max(0))
            },
        };

        // Step 6: persist the rate-limit verdict to the request log before
        // consulting the abuse detector, not after. `count_in_window`/
        // `baseline_rate_per_minute` (the detector's own inputs, step 7
        // below) read exclusively from this table, so the *current* request
        // has to already be in it by the time the detector runs, or a burst
        // of N requests only ever accumulates N-1 logged rows by the time
        // the Nth is evaluated and the threshold is never reached. This is
        // also why the teacher-style unit test for the detector itself logs
        // each request manually before constructing the detector: the row
        // always exists before the check that consults it. `log_all_requests`
        // does not gate this row — every request is persisted regardless —
        // it only gates the extra audit trace line below.
        self.log(&decision, identifier.value(), envelope)?;

        // Step 7: abuse check, only when the rate limiter allowed. Any ban
        // created here takes effect starting with the *next* request; the
        // row just persisted above keeps the pre-abuse-check verdict.
        if decision.allowed {
            let detector = AbuseDetector::new(&self.store, self.abuse_cfg);
            if detector.check(identifier.value()) {
                decision.allowed = false;
                decision.reason = DecisionReason::Banned;
                decision.remaining = 0;
                // reset_at retained from step 5 per spec.md §4.10 step 6.
            }
        }

        if self.log_all_requests {
            info!(
                identifier = identifier.value(),
                allowed = decision.allowed,
                reason = decision.reason.as_str(),
                "admission check"
            );
        }

        Ok(decision)
    }

    fn log(&self, decision: &Decision, identifier: &str, envelope: &Envelope) -> Result<(), EngineError> {
        let entry = RequestLogEntry {
            identifier: identifier.to_string(),
            path: envelope.metadata.path.clone(),
            method: envelope.metadata.method.clone(),
            allowed: decision.allowed,
            reason_code: decision.reason.as_str().to_string(),
            country: envelope.metadata.country.clone(),
            user_agent: envelope.metadata.user_agent.clone(),
        };
        Ok(self.store.log_request(&entry)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::envelope::RequestMetadata;
    use std::sync::Arc;

    fn pipeline(store: Arc<Store>) -> AdmissionPipeline {
        AdmissionPipeline::new(
            store,
            DefaultRateLimit {
                limit: 3,
                window_seconds: 60,
                sliding: false,
            },
            AbuseConfig {
                burst_threshold: 5,
                burst_window_seconds: 10,
                burst_multiplier: 5.0,
                auto_ban_duration_secs: 3600,
            },
            false,
        )
    }

    fn envelope(address: &str) -> Envelope {
        Envelope {
            address: Some(address.to_string()),
            api_key: None,
            metadata: RequestMetadata::default(),
        }
    }

    #[test]
    fn three_then_block() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let p = pipeline(store);
        let env = envelope("203.0.113.7");

        for expected_remaining in [2u32, 1, 0] {
            let d = p.check(&env);
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = p.check(&env);
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::RateLimited);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn missing_address_and_key_is_invalid() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let p = pipeline(store);
        let env = Envelope::default();
        let d = p.check(&env);
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::InvalidKey);
    }

    #[test]
    fn invalid_key_denied() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let p = pipeline(store);
        let env = Envelope {
            address: None,
            api_key: Some("rl_unknown".to_string()),
            metadata: RequestMetadata::default(),
        };
        let d = p.check(&env);
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::InvalidKey);
    }

    #[test]
    fn valid_key_allows_and_uses_key_limit() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let (_, plaintext) = ApiKeyRegistry::new(&store).create("svc", 10, 60, None, "{}").unwrap();
        let p = pipeline(store);
        let env = Envelope {
            address: None,
            api_key: Some(plaintext),
            metadata: RequestMetadata::default(),
        };
        let d = p.check(&env);
        assert!(d.allowed);
        assert_eq!(d.remaining, 9);
    }

    #[test]
    fn expired_key_denied() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let past = (chrono::Utc::now() - chrono::Duration::seconds(1))
            .format(crate::store::TS_FORMAT)
            .to_string();
        // Bypass validation (which rejects past expiry on create) by inserting directly.
        let fp = {
            use sha2::{Digest, Sha256};
            hex::encode(Sha256::digest(b"rl_expired_test_key_000000"))
        };
        store
            .insert_api_key(&fp, "expiring", 10, 60, Some(&past), "{}")
            .unwrap();
        let p = pipeline(store);
        let env = Envelope {
            address: None,
            api_key: Some("rl_expired_test_key_000000".to_string()),
            metadata: RequestMetadata::default(),
        };
        let d = p.check(&env);
        assert!(!d.allowed);
        // Lookup filters on expires_at > now, so this resolves as invalid_key
        // rather than expired_key (spec.md §9 open question: `active=1`
        // with `expires_at < now` must still fail the `Lookup` filter).
        assert_eq!(d.reason, DecisionReason::InvalidKey);
    }

    #[test]
    fn geo_block_respects_case_fold() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        store.geo_set_enabled(true).unwrap();
        store.geo_add("CN", None).unwrap();
        let p = pipeline(store);

        let mut env = envelope("1.2.3.4");
        env.metadata.country = Some("cn".to_string());
        let d = p.check(&env);
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::GeoBlocked);

        let mut env2 = envelope("1.2.3.5");
        env2.metadata.country = Some("US".to_string());
        let d2 = p.check(&env2);
        assert!(d2.allowed);
    }

    #[test]
    fn burst_auto_ban_then_subsequent_denied() {
        let store = Arc::new(Store::new(":memory:").unwrap());
        let p = AdmissionPipeline::new(
            Arc::clone(&store),
            DefaultRateLimit {
                limit: 1000,
                window_seconds: 60,
                sliding: true,
            },
            AbuseConfig {
                burst_threshold: 5,
                burst_window_seconds: 10,
                burst_multiplier: 5.0,
                auto_ban_duration_secs: 3600,
            },
            false,
        );
        let env = envelope("198.51.100.9");

        for _ in 0..4 {
            let d = p.check(&env);
            assert!(d.allowed);
        }
        let fifth = p.check(&env);
        assert!(!fifth.allowed);
        assert_eq!(fifth.reason, DecisionReason::Banned);

        let sixth = p.check(&env);
        assert!(!sixth.allowed);
        assert_eq!(sixth.reason, DecisionReason::Banned);
        assert!(sixth.retry_after.unwrap_or(0) <= 3600);
    }
}
