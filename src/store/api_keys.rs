use rusqlite::{params, OptionalExtension};

use crate::models::api_key::ApiKey;

use super::{now_str, Store};

fn row_to_key(row: &rusqlite::Row) -> rusqlite::Result<ApiKey> {
    Ok(ApiKey {
        id: row.get(0)?,
        key_fingerprint: row.get(1)?,
        display_name: row.get(2)?,
        limit: row.get::<_, i64>(3)? as u32,
        window_seconds: row.get::<_, i64>(4)? as u64,
        active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        last_used_at: row.get(8)?,
        metadata: row.get(9)?,
    })
}

const SELECT_COLS: &str = "id, key_fingerprint, display_name, limit_count, window_seconds, \
     active, created_at, expires_at, last_used_at, metadata";

impl Store {
    pub fn insert_api_key(
        &self,
        fingerprint: &str,
        display_name: &str,
        limit: u32,
        window_seconds: u64,
        expires_at: Option<&str>,
        metadata: &str,
    ) -> rusqlite::Result<ApiKey> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO api_keys (key_fingerprint, display_name, limit_count, window_seconds, expires_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![fingerprint, display_name, limit, window_seconds as i64, expires_at, metadata],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM api_keys WHERE id = ?1"),
            params![id],
            row_to_key,
        )
    }

    /// `Lookup` (spec.md §4.3): hash is computed by the caller; this
    /// returns the active, non-expired row and touches `last_used_at`.
    /// Per spec.md §9's open question, expired keys are left `active = 1`
    /// — the `expires_at > now` filter is required in addition to `active`.
    pub fn lookup_api_key_by_fingerprint(&self, fingerprint: &str) -> rusqlite::Result<Option<ApiKey>> {
        let conn = self.lock();
        let now = now_str();
        let found = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLS} FROM api_keys
                     WHERE key_fingerprint = ?1 AND active = 1
                       AND (expires_at IS NULL OR expires_at > ?2)"
                ),
                params![fingerprint, now],
                row_to_key,
            )
            .optional()?;
        if let Some(ref key) = found {
            conn.execute(
                "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
                params![now, key.id],
            )?;
        }
        Ok(found)
    }

    pub fn get_api_key_by_id(&self, id: i64) -> rusqlite::Result<Option<ApiKey>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM api_keys WHERE id = ?1"),
            params![id],
            row_to_key,
        )
        .optional()
    }

    pub fn list_api_keys(&self, limit: i64, offset: i64) -> rusqlite::Result<Vec<ApiKey>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM api_keys ORDER BY id ASC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, offset], row_to_key)?;
        rows.collect()
    }

    /// `Rotate`: replaces the fingerprint, resets `last_used_at`, keeps id.
    pub fn rotate_api_key(&self, id: i64, new_fingerprint: &str) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE api_keys SET key_fingerprint = ?1, last_used_at = NULL WHERE id = ?2",
            params![new_fingerprint, id],
        )?;
        Ok(())
    }

    pub fn deactivate_api_key(&self, id: i64) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute("UPDATE api_keys SET active = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn delete_api_key(&self, id: i64) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM api_keys WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn count_active_api_keys(&self) -> rusqlite::Result<i64> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            "SELECT COUNT(*) FROM api_keys WHERE active = 1 AND (expires_at IS NULL OR expires_at > ?1)",
            params![now],
            |row| row.get(0),
        )
    }

    pub fn fingerprint_exists(&self, fingerprint: &str) -> rusqlite::Result<bool> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM api_keys WHERE key_fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}
