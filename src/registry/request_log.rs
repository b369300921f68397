use crate::error::EngineResult;
use crate::models::request_log::{Aggregate, RequestLogEntry, RequestLogRow};
use crate::store::Store;

/// Wraps `store::request_log` and assembles the admin aggregate view
/// (spec.md §4.4), pulling active-ban/active-key counts from C2/C3.
pub struct RequestLog<'a> {
    store: &'a Store,
}

impl<'a> RequestLog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn log(&self, entry: &RequestLogEntry) -> EngineResult<()> {
        Ok(self.store.log_request(entry)?)
    }

    pub fn count_in_window(&self, identifier: &str, seconds: u64) -> EngineResult<u32> {
        Ok(self.store.count_in_window(identifier, seconds)?)
    }

    pub fn baseline_rate_per_minute(&self, identifier: &str, period_minutes: u64) -> EngineResult<f64> {
        Ok(self.store.baseline_rate_per_minute(identifier, period_minutes)?)
    }

    pub fn recent_for(&self, identifier: &str, limit: i64) -> EngineResult<Vec<RequestLogRow>> {
        Ok(self.store.recent_for(identifier, limit)?)
    }

    pub fn aggregate(&self, from: &str, to: &str, top_n: i64) -> EngineResult<Aggregate> {
        let (total, allowed, blocked) = self.store.aggregate_counts(from, to)?;
        let by_reason = self.store.aggregate_by_reason(from, to)?;
        let top_identifiers = self.store.top_n("identifier", from, to, top_n)?;
        let top_paths = self.store.top_n("path", from, to, top_n)?;
        let active_bans = self.store.list_active_bans(i64::MAX, 0)?.len() as u64;
        let active_keys = self.store.count_active_api_keys()? as u64;

        Ok(Aggregate {
            total,
            allowed,
            blocked,
            by_reason,
            top_identifiers,
            top_paths,
            active_bans,
            active_keys,
        })
    }

    pub fn cleanup(&self, retention_days: i64) -> EngineResult<usize> {
        Ok(self.store.cleanup_request_log(retention_days)?)
    }
}
