use tracing::error;

use crate::store::Store;

/// Abuse-detector tuning (spec.md §4.10.1).
#[derive(Debug, Clone, Copy)]
pub struct AbuseConfig {
    pub burst_threshold: u32,
    pub burst_window_seconds: u64,
    pub burst_multiplier: f64,
    pub auto_ban_duration_secs: i64,
}

/// Fires when an identifier's short-window burst count or rate-vs-baseline
/// trips one of the two rules below, creating a system auto-ban as a side
/// effect (spec.md §4.10.1). Consulted only when the rate-limit step of
/// the admission pipeline already allowed the request.
pub struct AbuseDetector<'a> {
    store: &'a Store,
    cfg: AbuseConfig,
}

impl<'a> AbuseDetector<'a> {
    pub fn new(store: &'a Store, cfg: AbuseConfig) -> Self {
        Self { store, cfg }
    }

    /// Returns `true` if the detector fired and an auto-ban was created.
    /// Auto-ban creation must not fail silently (spec.md §7): if the
    /// store write fails, the detector reports *not-fire* and logs at
    /// error level, letting the request through.
    pub fn check(&self, identifier: &str) -> bool {
        let current = match self.store.count_in_window(identifier, self.cfg.burst_window_seconds) {
            Ok(n) => n,
            Err(e) => {
                error!(identifier = %identifier, error = %e, "abuse detector count query failed");
                return false;
            }
        };

        if current >= self.cfg.burst_threshold {
            let reason = format!(
                "Burst detection: {current} requests in {}s",
                self.cfg.burst_window_seconds
            );
            return self.fire(identifier, &reason);
        }

        let baseline = match self.store.baseline_rate_per_minute(identifier, 60) {
            Ok(b) => b,
            Err(e) => {
                error!(identifier = %identifier, error = %e, "abuse detector baseline query failed");
                return false;
            }
        };

        if baseline > 0.0 {
            let current_rate = current as f64 / (self.cfg.burst_window_seconds as f64 / 60.0);
            if current_rate > baseline * self.cfg.burst_multiplier {
                let reason = format!("Baseline spike: {current_rate:.2} req/min vs baseline {baseline:.2}");
                return self.fire(identifier, &reason);
            }
        }

        false
    }

    fn fire(&self, identifier: &str, reason: &str) -> bool {
        match self
            .store
            .create_auto_ban(identifier, reason, self.cfg.auto_ban_duration_secs)
        {
            Ok(_) => true,
            Err(e) => {
                error!(identifier = %identifier, error = %e, "auto-ban creation failed, allowing request");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::counter::CounterConfig;

    fn cfg() -> AbuseConfig {
        AbuseConfig {
            burst_threshold: 5,
            burst_window_seconds: 10,
            burst_multiplier: 5.0,
            auto_ban_duration_secs: 3600,
        }
    }

    #[test]
    fn fires_absolute_rule_and_creates_ban() {
        let store = Store::new(":memory:").unwrap();
        let identifier = "203.0.113.7";
        for _ in 0..5 {
            let _ = store.check_counter(
                identifier,
                CounterConfig {
                    limit: 1000,
                    window_seconds: 60,
                    sliding: true,
                },
            );
            store
                .log_request(&crate::models::request_log::RequestLogEntry {
                    identifier: identifier.to_string(),
                    path: None,
                    method: None,
                    allowed: true,
                    reason_code: "ok".to_string(),
                    country: None,
                    user_agent: None,
                })
                .unwrap();
        }

        let detector = AbuseDetector::new(&store, cfg());
        assert!(detector.check(identifier));
        assert!(store.is_banned(identifier).unwrap().is_some());
    }

    #[test]
    fn does_not_fire_below_threshold() {
        let store = Store::new(":memory:").unwrap();
        let identifier = "203.0.113.8";
        store
            .log_request(&crate::models::request_log::RequestLogEntry {
                identifier: identifier.to_string(),
                path: None,
                method: None,
                allowed: true,
                reason_code: "ok".to_string(),
                country: None,
                user_agent: None,
            })
            .unwrap();

        let detector = AbuseDetector::new(&store, cfg());
        assert!(!detector.check(identifier));
        assert!(store.is_banned(identifier).unwrap().is_none());
    }
}
