pub mod api_keys;
pub mod bans;
pub mod counters;
pub mod geo;
pub mod reputation;
pub mod request_log;

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;

/// The single relational store backing C1–C6. All access is serialized
/// through one `Mutex<Connection>`, the same mechanism
/// `storage/sqlite.rs::SqliteStore` in the teacher crate uses for every
/// one of its tables — this is what gives counter increments the
/// linearizability spec.md §4.1/§5 demands, with no extra process-wide
/// locks needed.
pub struct Store {
    conn: Mutex<Connection>,
}

/// SQLite TEXT timestamps use this format throughout; lexicographic
/// ordering on strings in this shape matches chronological ordering, so
/// `expires_at > ?` comparisons work directly in SQL.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_str() -> String {
    Utc::now().format(TS_FORMAT).to_string()
}

impl Store {
    pub fn new(path: &str) -> rusqlite::Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS api_keys (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                key_fingerprint TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL,
                limit_count     INTEGER NOT NULL,
                window_seconds  INTEGER NOT NULL,
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT DEFAULT (datetime('now')),
                expires_at      TEXT,
                last_used_at    TEXT,
                metadata        TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS counter_buckets (
                identifier    TEXT NOT NULL,
                window_start  INTEGER NOT NULL,
                count         INTEGER NOT NULL DEFAULT 0,
                last_touched  TEXT DEFAULT (datetime('now')),
                UNIQUE(identifier, window_start)
            );

            CREATE TABLE IF NOT EXISTS bans (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier  TEXT NOT NULL,
                reason      TEXT NOT NULL,
                banned_at   TEXT DEFAULT (datetime('now')),
                expires_at  TEXT,
                created_by  TEXT NOT NULL DEFAULT 'system'
            );
            CREATE INDEX IF NOT EXISTS idx_bans_identifier ON bans(identifier);

            CREATE TABLE IF NOT EXISTS request_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier  TEXT NOT NULL,
                path        TEXT,
                method      TEXT,
                allowed     INTEGER NOT NULL,
                reason_code TEXT NOT NULL,
                country     TEXT,
                user_agent  TEXT,
                timestamp   TEXT DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_request_log_identifier_ts
                ON request_log(identifier, timestamp);

            CREATE TABLE IF NOT EXISTS geo_block_settings (
                id      INTEGER PRIMARY KEY CHECK(id = 1),
                enabled INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO geo_block_settings (id, enabled) VALUES (1, 0);

            CREATE TABLE IF NOT EXISTS geo_blocked_countries (
                code TEXT PRIMARY KEY,
                name TEXT
            );

            CREATE TABLE IF NOT EXISTS reputation (
                address        TEXT PRIMARY KEY,
                is_proxy       INTEGER NOT NULL DEFAULT 0,
                is_vpn         INTEGER NOT NULL DEFAULT 0,
                is_tor         INTEGER NOT NULL DEFAULT 0,
                is_hosting     INTEGER NOT NULL DEFAULT 0,
                is_residential INTEGER NOT NULL DEFAULT 0,
                confidence     INTEGER NOT NULL,
                reason         TEXT NOT NULL,
                source         TEXT NOT NULL,
                asn            INTEGER,
                asn_org        TEXT,
                country        TEXT,
                checked_at     TEXT NOT NULL,
                expires_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS asn_cache (
                asn        INTEGER PRIMARY KEY,
                org_name   TEXT NOT NULL,
                is_hosting INTEGER NOT NULL DEFAULT 0,
                is_vpn     INTEGER NOT NULL DEFAULT 0,
                country    TEXT,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS manual_blocks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier  TEXT NOT NULL,
                kind        TEXT NOT NULL,
                reason      TEXT NOT NULL,
                blocked_by  TEXT NOT NULL,
                blocked_at  TEXT DEFAULT (datetime('now')),
                expires_at  TEXT,
                UNIQUE(identifier, kind)
            );

            CREATE TABLE IF NOT EXISTS tor_exits (
                address    TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL,
                last_seen  TEXT NOT NULL,
                is_exit    INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS provider_cache (
                address        TEXT NOT NULL,
                provider_name  TEXT NOT NULL,
                raw_response   TEXT NOT NULL,
                expires_at     TEXT NOT NULL,
                UNIQUE(address, provider_name)
            );

            CREATE TABLE IF NOT EXISTS stats (
                stat_name TEXT NOT NULL,
                day       TEXT NOT NULL,
                count     INTEGER NOT NULL DEFAULT 0,
                UNIQUE(stat_name, day)
            );
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite mutex poisoned")
    }
}
