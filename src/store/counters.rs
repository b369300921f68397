use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::error;

use crate::models::counter::{CounterConfig, CounterResult};

use super::Store;

impl Store {
    /// `CounterStore::Check` (spec.md §4.1). Fixed- and sliding-window math
    /// over the `counter_buckets` table. The read-check-increment happens
    /// inside one `Mutex<Connection>`-guarded critical section, mirroring
    /// every read-modify-write method in the teacher's `storage/sqlite.rs`
    /// (e.g. `add_blocked_ip`'s `INSERT OR REPLACE` then
    /// `last_insert_rowid`, done under one lock acquisition) — this is what
    /// makes two concurrent checks against the same bucket at the limit
    /// boundary unable to both observe `allowed=true`.
    ///
    /// On store error, fails open with zero budget and logs at error level
    /// (spec.md §4.1 "Failure").
    pub fn check_counter(&self, identifier: &str, cfg: CounterConfig) -> CounterResult {
        match self.check_counter_inner(identifier, cfg) {
            Ok(result) => result,
            Err(e) => {
                error!(identifier = %identifier, error = %e, "counter store error, failing open");
                CounterResult {
                    allowed: true,
                    remaining: 0,
                    reset_at: 0,
                    limit: cfg.limit,
                    window_seconds: cfg.window_seconds,
                }
            }
        }
    }

    fn check_counter_inner(
        &self,
        identifier: &str,
        cfg: CounterConfig,
    ) -> rusqlite::Result<CounterResult> {
        let now = Utc::now().timestamp();
        let window_seconds = cfg.window_seconds.max(1) as i64;
        let window_start = (now / window_seconds) * window_seconds;

        if cfg.sliding {
            self.check_sliding(identifier, cfg, now, window_start, window_seconds)
        } else {
            self.check_fixed(identifier, cfg, window_start, window_seconds)
        }
    }

    fn bucket_count(
        &self,
        conn: &rusqlite::Connection,
        identifier: &str,
        window_start: i64,
    ) -> rusqlite::Result<u32> {
        conn.query_row(
            "SELECT count FROM counter_buckets WHERE identifier = ?1 AND window_start = ?2",
            params![identifier, window_start],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|v| v.unwrap_or(0) as u32)
    }

    fn increment_bucket(
        &self,
        conn: &rusqlite::Connection,
        identifier: &str,
        window_start: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO counter_buckets (identifier, window_start, count, last_touched)
             VALUES (?1, ?2, 1, datetime('now'))
             ON CONFLICT(identifier, window_start)
             DO UPDATE SET count = count + 1, last_touched = datetime('now')",
            params![identifier, window_start],
        )?;
        Ok(())
    }

    fn check_fixed(
        &self,
        identifier: &str,
        cfg: CounterConfig,
        window_start: i64,
        window_seconds: i64,
    ) -> rusqlite::Result<CounterResult> {
        let conn = self.lock();
        let c = self.bucket_count(&conn, identifier, window_start)?;
        let allowed = c < cfg.limit;
        if allowed {
            self.increment_bucket(&conn, identifier, window_start)?;
        }
        let used = c + if allowed { 1 } else { 0 };
        let remaining = cfg.limit.saturating_sub(used);
        Ok(CounterResult {
            allowed,
            remaining,
            reset_at: window_start + window_seconds,
            limit: cfg.limit,
            window_seconds: window_seconds as u64,
        })
    }

    fn check_sliding(
        &self,
        identifier: &str,
        cfg: CounterConfig,
        now: i64,
        window_start: i64,
        window_seconds: i64,
    ) -> rusqlite::Result<CounterResult> {
        let conn = self.lock();
        let cur = self.bucket_count(&conn, identifier, window_start)? as f64;
        let prev = self.bucket_count(&conn, identifier, window_start - window_seconds)? as f64;

        let elapsed = now - window_start;
        let overlap = ((window_seconds - elapsed) as f64 / window_seconds as f64).max(0.0);
        let effective = prev * overlap + cur;

        let allowed = effective < cfg.limit as f64;
        if allowed {
            self.increment_bucket(&conn, identifier, window_start)?;
        }

        let remaining = (cfg.limit as f64 - effective - 1.0).floor().max(0.0) as u32;

        Ok(CounterResult {
            allowed,
            remaining,
            reset_at: now + window_seconds,
            limit: cfg.limit,
            window_seconds: window_seconds as u64,
        })
    }

    /// Background sweep: delete buckets older than two window-lengths,
    /// with a two-hour age floor (spec.md §4.1 retention policy).
    pub fn cleanup_counters(&self, window_seconds: u64) -> rusqlite::Result<usize> {
        let conn = self.lock();
        let now = Utc::now().timestamp();
        let floor = (2 * window_seconds.max(1)) as i64;
        let cutoff = now - floor.max(7200);
        let n = conn.execute(
            "DELETE FROM counter_buckets WHERE window_start < ?1",
            params![cutoff],
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::counter::CounterConfig;

    fn store() -> Store {
        Store::new(":memory:").unwrap()
    }

    #[test]
    fn fixed_window_allows_up_to_limit() {
        let s = store();
        let cfg = CounterConfig {
            limit: 3,
            window_seconds: 60,
            sliding: false,
        };
        for i in 0..3 {
            let r = s.check_counter("203.0.113.7", cfg);
            assert!(r.allowed, "request {i} should be allowed");
        }
        let r = s.check_counter("203.0.113.7", cfg);
        assert!(!r.allowed);
        assert_eq!(r.remaining, 0);
    }

    #[test]
    fn sliding_window_overlap_at_zero_elapsed() {
        let s = store();
        let cfg = CounterConfig {
            limit: 1000,
            window_seconds: 60,
            sliding: true,
        };
        let r = s.check_counter("1.2.3.4", cfg);
        assert!(r.allowed);
    }
}
