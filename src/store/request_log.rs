use rusqlite::params;

use crate::models::request_log::{RequestLogEntry, RequestLogRow};

use super::{now_str, Store};

impl Store {
    pub fn log_request(&self, entry: &RequestLogEntry) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO request_log (identifier, path, method, allowed, reason_code, country, user_agent, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.identifier,
                entry.path,
                entry.method,
                entry.allowed as i64,
                entry.reason_code,
                entry.country,
                entry.user_agent,
                now_str(),
            ],
        )?;
        Ok(())
    }

    /// Count requests for `identifier` in the last `seconds` — feeds the
    /// abuse detector's absolute burst rule (spec.md §4.10.1).
    pub fn count_in_window(&self, identifier: &str, seconds: u64) -> rusqlite::Result<u32> {
        let conn = self.lock();
        let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(seconds as i64))
            .format(super::TS_FORMAT)
            .to_string();
        conn.query_row(
            "SELECT COUNT(*) FROM request_log WHERE identifier = ?1 AND timestamp >= ?2",
            params![identifier, cutoff],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u32)
    }

    /// Average requests per minute for `identifier` over the last
    /// `period_minutes` — feeds the baseline-spike rule.
    pub fn baseline_rate_per_minute(&self, identifier: &str, period_minutes: u64) -> rusqlite::Result<f64> {
        let count = self.count_in_window(identifier, period_minutes * 60)?;
        Ok(count as f64 / period_minutes.max(1) as f64)
    }

    pub fn recent_for(&self, identifier: &str, limit: i64) -> rusqlite::Result<Vec<RequestLogRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, identifier, path, method, allowed, reason_code, country, user_agent, timestamp
             FROM request_log WHERE identifier = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![identifier, limit], |row| {
            Ok(RequestLogRow {
                id: row.get(0)?,
                identifier: row.get(1)?,
                path: row.get(2)?,
                method: row.get(3)?,
                allowed: row.get::<_, i64>(4)? != 0,
                reason_code: row.get(5)?,
                country: row.get(6)?,
                user_agent: row.get(7)?,
                timestamp: row.get(8)?,
            })
        })?;
        rows.collect()
    }

    pub fn aggregate_counts(&self, from: &str, to: &str) -> rusqlite::Result<(u64, u64, u64)> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(allowed), 0), COALESCE(SUM(1 - allowed), 0)
             FROM request_log WHERE timestamp >= ?1 AND timestamp <= ?2",
            params![from, to],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                ))
            },
        )
    }

    pub fn aggregate_by_reason(&self, from: &str, to: &str) -> rusqlite::Result<Vec<(String, u64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT reason_code, COUNT(*) FROM request_log
             WHERE timestamp >= ?1 AND timestamp <= ?2
             GROUP BY reason_code ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map(params![from, to], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect()
    }

    pub fn top_n(&self, column: &str, from: &str, to: &str, top_n: i64) -> rusqlite::Result<Vec<(String, u64)>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {column}, COUNT(*) as c FROM request_log
             WHERE timestamp >= ?1 AND timestamp <= ?2
             GROUP BY {column} ORDER BY c DESC LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![from, to, top_n], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect()
    }

    pub fn cleanup_request_log(&self, retention_days: i64) -> rusqlite::Result<usize> {
        let conn = self.lock();
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(retention_days))
            .format(super::TS_FORMAT)
            .to_string();
        conn.execute("DELETE FROM request_log WHERE timestamp < ?1", params![cutoff])
    }
}
