use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::store::Store;

fn valid_ipv4_literal(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|p| {
        if p.is_empty() || p.len() > 3 || !p.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        if p.len() > 1 && p.starts_with('0') {
            return false;
        }
        p.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
    })
}

fn parse_exit_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| valid_ipv4_literal(line))
        .map(str::to_string)
        .collect()
}

/// Background fetcher for the Tor bulk-exit list (C7, spec.md §4.7).
/// Owns the two process-wide singletons the spec calls out: the fetch
/// scheduler and an in-flight-fetch guard flag — neither exposed outside
/// this module.
pub struct TorListUpdater {
    store: Arc<Store>,
    client: reqwest::Client,
    url: String,
    interval: Duration,
    fetch_on_startup: bool,
    in_flight: AtomicBool,
    last_update: AtomicI64,
}

impl TorListUpdater {
    pub fn new(store: Arc<Store>, url: String, refresh_interval_secs: u64, fetch_timeout_secs: u64, fetch_on_startup: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch_timeout_secs))
            .build()
            .expect("failed to build tor-list HTTP client");
        Self {
            store,
            client,
            url,
            interval: Duration::from_secs(refresh_interval_secs),
            fetch_on_startup,
            in_flight: AtomicBool::new(false),
            last_update: AtomicI64::new(0),
        }
    }

    pub fn last_update(&self) -> i64 {
        self.last_update.load(Ordering::Relaxed)
    }

    /// Runs the refresh loop. Intended to be spawned as a background task;
    /// an in-flight fetch is allowed to finish on shutdown (the caller
    /// simply stops polling the task, it does not abort mid-fetch).
    pub async fn run(&self) {
        if self.fetch_on_startup {
            self.fetch_once().await;
        }

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await; // first tick fires immediately; already handled above

        loop {
            interval.tick().await;
            self.fetch_once().await;
        }
    }

    async fn fetch_once(&self) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("tor list fetch already in flight, skipping tick");
            return;
        }

        let result = self.client.get(&self.url).send().await;
        match result {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    let addresses = parse_exit_list(&body);
                    if addresses.is_empty() {
                        warn!("tor list fetch returned no valid addresses, retaining existing data");
                    } else {
                        match self.store.sync_tor_exits(&addresses) {
                            Ok(()) => {
                                self.last_update.store(Utc::now().timestamp(), Ordering::Relaxed);
                                info!(count = addresses.len(), "tor exit list refreshed");
                            }
                            Err(e) => warn!(error = %e, "failed to persist tor exit list"),
                        }
                    }
                }
                Err(e) => warn!(error = %e, "failed to read tor list response body"),
            },
            Ok(resp) => warn!(status = %resp.status(), "tor list fetch returned non-2xx"),
            Err(e) => warn!(error = %e, "tor list fetch failed"),
        }

        self.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_list() {
        let body = "# comment\n1.2.3.4\n\n5.6.7.8\n  9.10.11.12  \n";
        let parsed = parse_exit_list(body);
        assert_eq!(parsed, vec!["1.2.3.4", "5.6.7.8", "9.10.11.12"]);
    }

    #[test]
    fn rejects_leading_zero_octets() {
        assert!(!valid_ipv4_literal("01.2.3.4"));
        assert!(valid_ipv4_literal("0.2.3.4"));
        assert!(!valid_ipv4_literal("1.2.3.256"));
        assert!(!valid_ipv4_literal("not.an.ip.addr"));
    }
}
