use rusqlite::params;

use super::Store;

impl Store {
    pub fn geo_is_enabled(&self) -> rusqlite::Result<bool> {
        let conn = self.lock();
        conn.query_row(
            "SELECT enabled FROM geo_block_settings WHERE id = 1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v != 0)
    }

    pub fn geo_set_enabled(&self, enabled: bool) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE geo_block_settings SET enabled = ?1 WHERE id = 1",
            params![enabled as i64],
        )?;
        Ok(())
    }

    /// Case-folded to uppercase on write and on compare (spec.md §3/§4.5).
    pub fn geo_is_blocked(&self, code: &str) -> rusqlite::Result<bool> {
        let conn = self.lock();
        let code = code.to_uppercase();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM geo_blocked_countries WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn geo_add(&self, code: &str, name: Option<&str>) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO geo_blocked_countries (code, name) VALUES (?1, ?2)",
            params![code.to_uppercase(), name],
        )?;
        Ok(())
    }

    pub fn geo_remove(&self, code: &str) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM geo_blocked_countries WHERE code = ?1",
            params![code.to_uppercase()],
        )?;
        Ok(())
    }

    pub fn geo_list(&self) -> rusqlite::Result<Vec<(String, Option<String>)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT code, name FROM geo_blocked_countries ORDER BY code ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    pub fn geo_replace_all(&self, entries: &[(String, Option<String>)]) -> rusqlite::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM geo_blocked_countries", [])?;
        for (code, name) in entries {
            tx.execute(
                "INSERT INTO geo_blocked_countries (code, name) VALUES (?1, ?2)",
                params![code.to_uppercase(), name],
            )?;
        }
        tx.commit()
    }
}
