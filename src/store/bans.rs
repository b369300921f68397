use rusqlite::{params, OptionalExtension};

use crate::models::ban::Ban;

use super::{now_str, Store};

fn row_to_ban(row: &rusqlite::Row) -> rusqlite::Result<Ban> {
    Ok(Ban {
        id: row.get(0)?,
        identifier: row.get(1)?,
        reason: row.get(2)?,
        banned_at: row.get(3)?,
        expires_at: row.get(4)?,
        created_by: row.get(5)?,
    })
}

impl Store {
    /// `IsBanned` (spec.md §4.2): newest active row, tie-break `banned_at DESC`.
    pub fn is_banned(&self, identifier: &str) -> rusqlite::Result<Option<Ban>> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            "SELECT id, identifier, reason, banned_at, expires_at, created_by
             FROM bans
             WHERE identifier = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY banned_at DESC, id DESC
             LIMIT 1",
            params![identifier, now],
            row_to_ban,
        )
        .optional()
    }

    pub fn create_ban(
        &self,
        identifier: &str,
        reason: &str,
        duration_seconds: Option<i64>,
        created_by: &str,
    ) -> rusqlite::Result<Ban> {
        let conn = self.lock();
        let banned_at = now_str();
        let expires_at = duration_seconds
            .map(|secs| (chrono::Utc::now() + chrono::Duration::seconds(secs)).format(super::TS_FORMAT).to_string());
        conn.execute(
            "INSERT INTO bans (identifier, reason, banned_at, expires_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![identifier, reason, banned_at, expires_at, created_by],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Ban {
            id,
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            banned_at,
            expires_at,
            created_by: created_by.to_string(),
        })
    }

    /// `CreateAutoBan` (spec.md §4.2): default duration from config,
    /// `created_by="system"`. Permitted to create a duplicate while one is
    /// active — history accumulates, `IsBanned` always resolves to the
    /// single newest active row (invariant 6, §8).
    pub fn create_auto_ban(
        &self,
        identifier: &str,
        reason: &str,
        duration_seconds: i64,
    ) -> rusqlite::Result<Ban> {
        self.create_ban(identifier, reason, Some(duration_seconds), "system")
    }

    pub fn remove_ban(&self, id: i64) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM bans WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn remove_all_bans(&self, identifier: &str) -> rusqlite::Result<usize> {
        let conn = self.lock();
        conn.execute("DELETE FROM bans WHERE identifier = ?1", params![identifier])
    }

    pub fn list_active_bans(&self, limit: i64, offset: i64) -> rusqlite::Result<Vec<Ban>> {
        let conn = self.lock();
        let now = now_str();
        let mut stmt = conn.prepare(
            "SELECT id, identifier, reason, banned_at, expires_at, created_by
             FROM bans
             WHERE expires_at IS NULL OR expires_at > ?1
             ORDER BY banned_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![now, limit, offset], row_to_ban)?;
        rows.collect()
    }

    /// Delete expired ban rows, returning the count removed.
    pub fn cleanup_bans(&self) -> rusqlite::Result<usize> {
        let conn = self.lock();
        let now = now_str();
        conn.execute(
            "DELETE FROM bans WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )
    }
}
