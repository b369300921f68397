use rusqlite::{params, OptionalExtension};

use crate::models::reputation::{
    AsnRecord, ManualBlockEntry, ManualBlockKind, ProviderCacheEntry, ReputationRecord,
    ReputationSource, TorExitEntry,
};

use super::{now_str, Store};

fn row_to_reputation(row: &rusqlite::Row) -> rusqlite::Result<ReputationRecord> {
    let source_str: String = row.get(8)?;
    Ok(ReputationRecord {
        address: row.get(0)?,
        is_proxy: row.get::<_, i64>(1)? != 0,
        is_vpn: row.get::<_, i64>(2)? != 0,
        is_tor: row.get::<_, i64>(3)? != 0,
        is_hosting: row.get::<_, i64>(4)? != 0,
        is_residential: row.get::<_, i64>(5)? != 0,
        confidence: row.get::<_, i64>(6)? as u8,
        reason: row.get(7)?,
        source: source_str.parse::<ReputationSource>().unwrap_or(ReputationSource::Heuristic),
        asn: row.get(9)?,
        asn_org: row.get(10)?,
        country: row.get(11)?,
        checked_at: row.get(12)?,
        expires_at: row.get(13)?,
    })
}

const REP_COLS: &str = "address, is_proxy, is_vpn, is_tor, is_hosting, is_residential, \
     confidence, reason, source, asn, asn_org, country, checked_at, expires_at";

impl Store {
    // -- reputation cache -----------------------------------------------

    pub fn get_reputation(&self, address: &str) -> rusqlite::Result<Option<ReputationRecord>> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            &format!("SELECT {REP_COLS} FROM reputation WHERE address = ?1 AND expires_at > ?2"),
            params![address, now],
            row_to_reputation,
        )
        .optional()
    }

    pub fn upsert_reputation(&self, rec: &ReputationRecord) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO reputation
                (address, is_proxy, is_vpn, is_tor, is_hosting, is_residential,
                 confidence, reason, source, asn, asn_org, country, checked_at, expires_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(address) DO UPDATE SET
                is_proxy = excluded.is_proxy, is_vpn = excluded.is_vpn,
                is_tor = excluded.is_tor, is_hosting = excluded.is_hosting,
                is_residential = excluded.is_residential, confidence = excluded.confidence,
                reason = excluded.reason, source = excluded.source, asn = excluded.asn,
                asn_org = excluded.asn_org, country = excluded.country,
                checked_at = excluded.checked_at, expires_at = excluded.expires_at",
            params![
                rec.address,
                rec.is_proxy as i64,
                rec.is_vpn as i64,
                rec.is_tor as i64,
                rec.is_hosting as i64,
                rec.is_residential as i64,
                rec.confidence as i64,
                rec.reason,
                rec.source.as_str(),
                rec.asn,
                rec.asn_org,
                rec.country,
                rec.checked_at,
                rec.expires_at,
            ],
        )?;
        Ok(())
    }

    // -- ASN cache --------------------------------------------------------

    pub fn get_asn(&self, asn: u32) -> rusqlite::Result<Option<AsnRecord>> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            "SELECT asn, org_name, is_hosting, is_vpn, country, expires_at
             FROM asn_cache WHERE asn = ?1 AND expires_at > ?2",
            params![asn, now],
            |row| {
                Ok(AsnRecord {
                    asn: row.get(0)?,
                    org_name: row.get(1)?,
                    is_hosting: row.get::<_, i64>(2)? != 0,
                    is_vpn: row.get::<_, i64>(3)? != 0,
                    country: row.get(4)?,
                    expires_at: row.get(5)?,
                })
            },
        )
        .optional()
    }

    pub fn upsert_asn(&self, rec: &AsnRecord) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO asn_cache (asn, org_name, is_hosting, is_vpn, country, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(asn) DO UPDATE SET
                org_name = excluded.org_name, is_hosting = excluded.is_hosting,
                is_vpn = excluded.is_vpn, country = excluded.country,
                expires_at = excluded.expires_at",
            params![rec.asn, rec.org_name, rec.is_hosting as i64, rec.is_vpn as i64, rec.country, rec.expires_at],
        )?;
        Ok(())
    }

    // -- Tor exit list ------------------------------------------------------

    pub fn is_tor_exit(&self, address: &str) -> rusqlite::Result<bool> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tor_exits WHERE address = ?1 AND is_exit = 1",
            params![address],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// Bulk-upsert the whole list in one transaction, stamping
    /// `last_seen = now` (spec.md §4.6).
    pub fn sync_tor_exits(&self, addresses: &[String]) -> rusqlite::Result<()> {
        let mut conn = self.lock();
        let now = now_str();
        let tx = conn.transaction()?;
        for addr in addresses {
            tx.execute(
                "INSERT INTO tor_exits (address, first_seen, last_seen, is_exit)
                 VALUES (?1, ?2, ?2, 1)
                 ON CONFLICT(address) DO UPDATE SET last_seen = excluded.last_seen, is_exit = 1",
                params![addr, now],
            )?;
        }
        tx.commit()
    }

    pub fn tor_exit_count(&self) -> rusqlite::Result<i64> {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM tor_exits WHERE is_exit = 1", [], |row| row.get(0))
    }

    #[allow(dead_code)]
    pub fn get_tor_exit(&self, address: &str) -> rusqlite::Result<Option<TorExitEntry>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT address, first_seen, last_seen, is_exit FROM tor_exits WHERE address = ?1",
            params![address],
            |row| {
                Ok(TorExitEntry {
                    address: row.get(0)?,
                    first_seen: row.get(1)?,
                    last_seen: row.get(2)?,
                    is_exit: row.get::<_, i64>(3)? != 0,
                })
            },
        )
        .optional()
    }

    // -- manual blocks -----------------------------------------------------

    pub fn get_manual_block(&self, identifier: &str, kind: ManualBlockKind) -> rusqlite::Result<Option<ManualBlockEntry>> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            "SELECT id, identifier, kind, reason, blocked_by, blocked_at, expires_at
             FROM manual_blocks
             WHERE identifier = ?1 AND kind = ?2 AND (expires_at IS NULL OR expires_at > ?3)",
            params![identifier, kind.as_str(), now],
            row_to_manual_block,
        )
        .optional()
    }

    pub fn add_manual_block(
        &self,
        identifier: &str,
        kind: ManualBlockKind,
        reason: &str,
        blocked_by: &str,
        expires_at: Option<&str>,
    ) -> rusqlite::Result<ManualBlockEntry> {
        let conn = self.lock();
        let blocked_at = now_str();
        conn.execute(
            "INSERT INTO manual_blocks (identifier, kind, reason, blocked_by, blocked_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(identifier, kind) DO UPDATE SET
                reason = excluded.reason, blocked_by = excluded.blocked_by,
                blocked_at = excluded.blocked_at, expires_at = excluded.expires_at",
            params![identifier, kind.as_str(), reason, blocked_by, blocked_at, expires_at],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM manual_blocks WHERE identifier = ?1 AND kind = ?2",
            params![identifier, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(ManualBlockEntry {
            id,
            identifier: identifier.to_string(),
            kind,
            reason: reason.to_string(),
            blocked_by: blocked_by.to_string(),
            blocked_at,
            expires_at: expires_at.map(|s| s.to_string()),
        })
    }

    pub fn remove_manual_block(&self, identifier: &str, kind: ManualBlockKind) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM manual_blocks WHERE identifier = ?1 AND kind = ?2",
            params![identifier, kind.as_str()],
        )?;
        Ok(())
    }

    pub fn list_manual_blocks(&self) -> rusqlite::Result<Vec<ManualBlockEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, identifier, kind, reason, blocked_by, blocked_at, expires_at FROM manual_blocks",
        )?;
        let rows = stmt.query_map([], row_to_manual_block)?;
        rows.collect()
    }

    /// Active `kind = cidr` manual blocks, for CIDR-membership checks
    /// (spec.md §4.9 step 3).
    pub fn active_cidr_blocks(&self) -> rusqlite::Result<Vec<ManualBlockEntry>> {
        let conn = self.lock();
        let now = now_str();
        let mut stmt = conn.prepare(
            "SELECT id, identifier, kind, reason, blocked_by, blocked_at, expires_at
             FROM manual_blocks
             WHERE kind = 'cidr' AND (expires_at IS NULL OR expires_at > ?1)",
        )?;
        let rows = stmt.query_map(params![now], row_to_manual_block)?;
        rows.collect()
    }

    // -- provider cache ------------------------------------------------------

    pub fn get_provider_cached(&self, address: &str, provider: &str) -> rusqlite::Result<Option<ProviderCacheEntry>> {
        let conn = self.lock();
        let now = now_str();
        conn.query_row(
            "SELECT address, provider_name, raw_response, expires_at
             FROM provider_cache WHERE address = ?1 AND provider_name = ?2 AND expires_at > ?3",
            params![address, provider, now],
            |row| {
                Ok(ProviderCacheEntry {
                    address: row.get(0)?,
                    provider_name: row.get(1)?,
                    raw_response: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    pub fn set_provider_cached(&self, address: &str, provider: &str, raw_response: &str, expires_at: &str) -> rusqlite::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO provider_cache (address, provider_name, raw_response, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(address, provider_name) DO UPDATE SET
                raw_response = excluded.raw_response, expires_at = excluded.expires_at",
            params![address, provider, raw_response, expires_at],
        )?;
        Ok(())
    }

    // -- stats ----------------------------------------------------------------

    pub fn increment_stat(&self, name: &str, n: i64) -> rusqlite::Result<()> {
        let conn = self.lock();
        let day = chrono::Utc::now().format("%Y-%m-%d").to_string();
        conn.execute(
            "INSERT INTO stats (stat_name, day, count) VALUES (?1, ?2, ?3)
             ON CONFLICT(stat_name, day) DO UPDATE SET count = count + excluded.count",
            params![name, day, n],
        )?;
        Ok(())
    }

    pub fn aggregate_stats(&self) -> rusqlite::Result<Vec<(String, i64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT stat_name, SUM(count) FROM stats GROUP BY stat_name ORDER BY stat_name ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Expires reputation, ASN cache, provider cache, and manual blocks;
    /// trims stats older than 90 days (spec.md §4.6).
    pub fn cleanup_reputation(&self) -> rusqlite::Result<()> {
        let conn = self.lock();
        let now = now_str();
        conn.execute("DELETE FROM reputation WHERE expires_at <= ?1", params![now])?;
        conn.execute("DELETE FROM asn_cache WHERE expires_at <= ?1", params![now])?;
        conn.execute("DELETE FROM provider_cache WHERE expires_at <= ?1", params![now])?;
        conn.execute(
            "DELETE FROM manual_blocks WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        let cutoff_day = (chrono::Utc::now() - chrono::Duration::days(90))
            .format("%Y-%m-%d")
            .to_string();
        conn.execute("DELETE FROM stats WHERE day < ?1", params![cutoff_day])?;
        Ok(())
    }
}

fn row_to_manual_block(row: &rusqlite::Row) -> rusqlite::Result<ManualBlockEntry> {
    let kind_str: String = row.get(2)?;
    Ok(ManualBlockEntry {
        id: row.get(0)?,
        identifier: row.get(1)?,
        kind: kind_str.parse::<ManualBlockKind>().unwrap_or(ManualBlockKind::Address),
        reason: row.get(3)?,
        blocked_by: row.get(4)?,
        blocked_at: row.get(5)?,
        expires_at: row.get(6)?,
    })
}
