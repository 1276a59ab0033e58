//! Aggregator background loops: the stale-probe logger and the retention
//! evictor. Both are read/observe-only with respect to the decision
//! engine's invariants — neither ever touches incidents.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::params;
use tokio::time;

use crate::db::Db;

const STALE_PROBE_INTERVAL: Duration = Duration::from_secs(30);
const STALE_PROBE_THRESHOLD_MINUTES: i64 = 2;

const RETENTION_INTERVAL: Duration = Duration::from_secs(6 * 3600);

fn retention_days() -> u32 {
    std::env::var("RETENTION_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(30)
}

/// Every 30s, warn about any probe that hasn't been seen in over 2 minutes.
/// Pure observation — no state changes, no effect on incident lifecycle.
pub async fn run_stale_probe_logger(db: Arc<Db>, shutdown: rocket::Shutdown) {
    loop {
        tokio::select! {
            _ = time::sleep(STALE_PROBE_INTERVAL) => {},
            _ = shutdown.clone() => return,
        }

        let stale: Vec<String> = {
            let conn = db.conn();
            let mut stmt = match conn.prepare(
                "SELECT probe_id FROM probes WHERE last_seen_at < datetime('now', ?1)",
            ) {
                Ok(s) => s,
                Err(_) => continue,
            };
            stmt.query_map(params![format!("-{} minutes", STALE_PROBE_THRESHOLD_MINUTES)], |row| {
                row.get::<_, String>(0)
            })
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
        };

        for probe_id in stale {
            eprintln!("probe {probe_id}: stale, no heartbeat or result in over {STALE_PROBE_THRESHOLD_MINUTES}m");
        }
    }
}

/// Every 6h, delete result rows older than the retention cutoff. Safe by
/// construction: LatestPerProbe always points at the newest row per probe,
/// so anything past the cutoff is never the ballot's current entry.
pub async fn run_retention_evictor(db: Arc<Db>, shutdown: rocket::Shutdown) {
    loop {
        tokio::select! {
            _ = time::sleep(RETENTION_INTERVAL) => {},
            _ = shutdown.clone() => return,
        }

        let days = retention_days();
        let deleted = db
            .conn()
            .execute(
                "DELETE FROM results WHERE timestamp < datetime('now', ?1)",
                params![format!("-{} days", days)],
            )
            .unwrap_or(0);

        if deleted > 0 {
            println!("retention: evicted {deleted} result rows older than {days}d");
        }
    }
}
