use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::models::{StatusCheck, StatusOverview, StatusProbe};

type ApiError = (Status, Json<serde_json::Value>);

fn err(status: Status, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into(), "code": code_for(status) })))
}

fn code_for(status: Status) -> &'static str {
    match status.code {
        400 => "BAD_REQUEST",
        403 => "FORBIDDEN",
        500 => "INTERNAL_ERROR",
        _ => "ERROR",
    }
}

/// `GET /health` — liveness only, no auth. Used by process supervisors,
/// not by probes.
#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "wacht-aggregator",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /status` — the public read-model: each check's status, derived
/// from the most recent `results` row for it (not incident state — a
/// check can be mid-down-ballot without an incident open yet), plus
/// `incident_since` for any currently open incident and probe
/// connectivity. No secret required; this is the surface meant for a
/// status page or an on-call dashboard to poll.
#[get("/status")]
pub fn status_page(db: &State<Arc<Db>>) -> Result<Json<StatusOverview>, ApiError> {
    let conn = db.conn();

    let mut check_stmt = conn
        .prepare(
            "SELECT c.id, r.target, r.up, i.started_at
             FROM checks c
             JOIN results r ON r.id = (SELECT MAX(id) FROM results WHERE check_id = c.id)
             LEFT JOIN incidents i ON i.check_id = c.id AND i.resolved_at IS NULL
             ORDER BY c.id",
        )
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    let checks: Vec<StatusCheck> = check_stmt
        .query_map([], |row| {
            let up: i64 = row.get(2)?;
            let incident_since: Option<String> = row.get(3)?;
            Ok(StatusCheck {
                check_id: row.get(0)?,
                target: row.get(1)?,
                status: if up != 0 { "up".to_string() } else { "down".to_string() },
                incident_since: incident_since.as_deref().and_then(|s| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
                }),
            })
        })
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?
        .filter_map(|r| r.ok())
        .collect();

    let mut probe_stmt = conn
        .prepare(
            "SELECT probe_id, last_seen_at, last_seen_at > datetime('now', '-90 seconds')
             FROM probes ORDER BY probe_id",
        )
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    let probes: Vec<StatusProbe> = probe_stmt
        .query_map(params![], |row| {
            Ok(StatusProbe {
                probe_id: row.get(0)?,
                last_seen_at: row.get(1)?,
                online: row.get::<_, i64>(2)? != 0,
            })
        })
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(StatusOverview { checks, probes }))
}
