//! The decision engine: quorum + consecutive-failure rule, incident
//! lifecycle, at-most-one-open-incident enforcement.
//!
//! Each invocation re-queries the ballot (latest result per probe) and,
//! for any probe currently reporting down, its last two results. It
//! produces at most one transition. Concurrent evaluations for the same
//! `check_id` are serialized by a per-check keyed lock; the incident
//! table's own unique index is the second line of defense if that lock
//! were ever bypassed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;

use crate::db::Db;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// No ballot, inconclusive round, or no state change.
    None,
    /// Majority-down + all-consecutive + no incident was open: one opened.
    Opened { probes_down: u32, probes_total: u32 },
    /// Majority flipped back to up while an incident was open: it resolved.
    Resolved { probes_up: u32, probes_total: u32 },
}

struct BallotRow {
    probe_id: String,
    up: bool,
}

/// Per-`check_id` keyed async lock, preventing two concurrent ingests for
/// the same check from racing to open two incidents.
pub struct DecisionEngine {
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    pub fn new() -> Self {
        DecisionEngine { locks: StdMutex::new(HashMap::new()) }
    }

    fn lock_for(&self, check_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(check_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Evaluate and apply the quorum rule for `check_id`, returning the
    /// transition (if any) that resulted.
    pub async fn evaluate(&self, db: &Db, check_id: &str) -> Transition {
        let lock = self.lock_for(check_id);
        let _guard = lock.lock().await;
        evaluate_locked(db, check_id)
    }
}

fn evaluate_locked(db: &Db, check_id: &str) -> Transition {
    let conn = db.conn();

    let ballot = latest_per_probe(&conn, check_id);
    if ballot.is_empty() {
        return Transition::None;
    }

    let total = ballot.len() as u32;
    let down = ballot.iter().filter(|r| !r.up).count() as u32;
    let majority_down = down > total / 2;

    let has_open = open_incident_id(&conn, check_id).is_some();

    if majority_down {
        let all_consecutive = ballot
            .iter()
            .filter(|r| !r.up)
            .all(|r| is_consecutive_down(&conn, check_id, &r.probe_id));

        if !all_consecutive {
            // At least one down probe just flipped this tick — inconclusive.
            return Transition::None;
        }

        if has_open {
            return Transition::None;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let inserted = conn.execute(
            "INSERT INTO incidents (id, check_id) VALUES (?1, ?2)",
            params![id, check_id],
        );
        match inserted {
            Ok(_) => Transition::Opened { probes_down: down, probes_total: total },
            // Unique-index violation on (check_id) WHERE resolved_at IS NULL:
            // another evaluation already opened one. Treat as already open.
            Err(_) => Transition::None,
        }
    } else if has_open {
        conn.execute(
            "UPDATE incidents SET resolved_at = datetime('now') WHERE check_id = ?1 AND resolved_at IS NULL",
            params![check_id],
        )
        .ok();
        Transition::Resolved { probes_up: total - down, probes_total: total }
    } else {
        Transition::None
    }
}

fn latest_per_probe(conn: &rusqlite::Connection, check_id: &str) -> Vec<BallotRow> {
    let mut stmt = match conn.prepare(
        "SELECT probe_id, up FROM results
         WHERE check_id = ?1 AND id IN (
             SELECT MAX(id) FROM results WHERE check_id = ?1 GROUP BY probe_id
         )",
    ) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    stmt.query_map(params![check_id], |row| {
        Ok(BallotRow { probe_id: row.get(0)?, up: row.get::<_, i64>(1)? != 0 })
    })
    .map(|rows| rows.filter_map(|r| r.ok()).collect())
    .unwrap_or_default()
}

/// True iff this probe's last two results for `check_id` both report down.
fn is_consecutive_down(conn: &rusqlite::Connection, check_id: &str, probe_id: &str) -> bool {
    let mut stmt = match conn.prepare(
        "SELECT up FROM results WHERE check_id = ?1 AND probe_id = ?2 ORDER BY id DESC LIMIT 2",
    ) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let history: Vec<bool> = match stmt.query_map(params![check_id, probe_id], |row| {
        Ok(row.get::<_, i64>(0)? != 0)
    }) {
        Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
        Err(_) => return false,
    };

    history.len() == 2 && history.iter().all(|up| !up)
}

fn open_incident_id(conn: &rusqlite::Connection, check_id: &str) -> Option<String> {
    conn.query_row(
        "SELECT id FROM incidents WHERE check_id = ?1 AND resolved_at IS NULL",
        params![check_id],
        |row| row.get(0),
    )
    .optional()
    .ok()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckSpec;
    use std::str::FromStr;

    fn setup() -> Db {
        let db = Db::open(":memory:").unwrap();
        db.seed_checks(&[CheckSpec {
            id: "c1".into(),
            check_type: crate::models::CheckType::from_str("http").unwrap(),
            target: "https://example.com".into(),
            interval_seconds: 30,
            webhook: None,
        }])
        .unwrap();
        db
    }

    fn register_probe(db: &Db, probe_id: &str) {
        db.conn()
            .execute(
                "INSERT INTO probes (probe_id, version) VALUES (?1, '1')",
                params![probe_id],
            )
            .unwrap();
    }

    fn post_result(db: &Db, check_id: &str, probe_id: &str, up: bool) {
        db.conn()
            .execute(
                "INSERT INTO results (check_id, probe_id, type, target, up, latency_ms, error, timestamp)
                 VALUES (?1, ?2, 'http', 'https://example.com', ?3, 10, '', datetime('now'))",
                params![check_id, probe_id, up as i64],
            )
            .unwrap();
    }

    #[test]
    fn single_probe_down_is_not_majority() {
        let db = setup();
        register_probe(&db, "a");
        post_result(&db, "c1", "a", false);
        assert_eq!(evaluate_locked(&db, "c1"), Transition::None);
    }

    #[test]
    fn two_of_four_down_is_a_tie_not_majority() {
        let db = setup();
        for p in ["a", "b", "c", "d"] {
            register_probe(&db, p);
        }
        post_result(&db, "c1", "a", true);
        post_result(&db, "c1", "b", true);
        post_result(&db, "c1", "c", false);
        post_result(&db, "c1", "c", false);
        post_result(&db, "c1", "d", false);
        post_result(&db, "c1", "d", false);
        assert_eq!(evaluate_locked(&db, "c1"), Transition::None);
    }

    #[test]
    fn majority_down_without_two_consecutive_is_inconclusive() {
        let db = setup();
        for p in ["a", "b", "c"] {
            register_probe(&db, p);
        }
        post_result(&db, "c1", "a", true);
        post_result(&db, "c1", "b", false);
        post_result(&db, "c1", "c", false);
        assert_eq!(evaluate_locked(&db, "c1"), Transition::None);
    }

    #[test]
    fn majority_down_with_two_consecutive_opens_once() {
        let db = setup();
        for p in ["a", "b", "c"] {
            register_probe(&db, p);
        }
        post_result(&db, "c1", "a", true);
        post_result(&db, "c1", "b", false);
        post_result(&db, "c1", "b", false);
        post_result(&db, "c1", "c", false);
        post_result(&db, "c1", "c", false);
        assert_eq!(
            evaluate_locked(&db, "c1"),
            Transition::Opened { probes_down: 2, probes_total: 3 }
        );
        // A further qualifying ballot is a no-op: the incident is already open.
        assert_eq!(evaluate_locked(&db, "c1"), Transition::None);
    }

    #[test]
    fn recovery_resolves_open_incident() {
        let db = setup();
        for p in ["a", "b", "c"] {
            register_probe(&db, p);
        }
        post_result(&db, "c1", "a", true);
        post_result(&db, "c1", "b", false);
        post_result(&db, "c1", "b", false);
        post_result(&db, "c1", "c", false);
        post_result(&db, "c1", "c", false);
        assert!(matches!(evaluate_locked(&db, "c1"), Transition::Opened { .. }));

        post_result(&db, "c1", "b", true);
        assert_eq!(
            evaluate_locked(&db, "c1"),
            Transition::Resolved { probes_up: 2, probes_total: 3 }
        );
    }

    #[test]
    fn first_ever_down_result_is_not_consecutive() {
        let db = setup();
        register_probe(&db, "a");
        post_result(&db, "c1", "a", false);
        assert!(!is_consecutive_down(&db.conn(), "c1", "a"));
    }
}
