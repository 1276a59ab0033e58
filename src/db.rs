use rusqlite::{Connection, Result};
use std::sync::{Mutex, MutexGuard};

use crate::models::CheckSpec;

/// Single-writer embedded store. Every write path in this crate (ingest,
/// decision engine, probe registration/heartbeat) goes through the same
/// connection, serialized by the mutex.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        let db = Db { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS checks (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                target TEXT NOT NULL,
                interval_seconds INTEGER NOT NULL DEFAULT 30,
                webhook TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS probes (
                probe_id TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                registered_at TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                check_id TEXT NOT NULL REFERENCES checks(id) ON DELETE CASCADE,
                probe_id TEXT NOT NULL REFERENCES probes(probe_id) ON DELETE CASCADE,
                type TEXT NOT NULL,
                target TEXT NOT NULL,
                up INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                error TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_check_probe ON results(check_id, probe_id, id DESC);
            CREATE INDEX IF NOT EXISTS idx_results_timestamp ON results(timestamp);

            CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                check_id TEXT NOT NULL REFERENCES checks(id) ON DELETE CASCADE,
                started_at TEXT NOT NULL DEFAULT (datetime('now')),
                resolved_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_incidents_check ON incidents(check_id, started_at DESC);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_open_per_check
                ON incidents(check_id) WHERE resolved_at IS NULL;
            ",
        )?;
        Ok(())
    }

    /// Insert any checks from the seed list that aren't already present.
    /// Idempotent: reseeding the same list twice leaves existing rows
    /// unchanged.
    pub fn seed_checks(&self, checks: &[CheckSpec]) -> Result<usize> {
        let conn = self.conn();
        let mut inserted = 0;
        for c in checks {
            let rows = conn.execute(
                "INSERT OR IGNORE INTO checks (id, type, target, interval_seconds, webhook) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![c.id, c.check_type.to_string(), c.target, c.interval_seconds, c.webhook],
            )?;
            inserted += rows;
        }
        Ok(inserted)
    }
}
