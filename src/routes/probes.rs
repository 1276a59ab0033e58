use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::auth::SharedSecret;
use crate::db::Db;
use crate::models::{CheckSpec, HeartbeatPing, RegisterProbe};

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

/// `POST /probes/register` — upsert the probe; refreshes `last_seen_at` if
/// it was already known.
#[post("/probes/register", format = "json", data = "<body>", rank = 1)]
pub fn register_probe(
    body: Json<RegisterProbe>,
    _secret: SharedSecret,
    db: &State<Arc<Db>>,
) -> Result<Status, ApiError> {
    let body = body.into_inner();
    if body.probe_id.trim().is_empty() {
        return Err(err(Status::BadRequest, "probe_id is required"));
    }

    db.conn()
        .execute(
            "INSERT INTO probes (probe_id, version, registered_at, last_seen_at)
             VALUES (?1, ?2, datetime('now'), datetime('now'))
             ON CONFLICT(probe_id) DO UPDATE SET version = excluded.version, last_seen_at = datetime('now')",
            params![body.probe_id, body.version],
        )
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    Ok(Status::NoContent)
}

/// `POST /probes/heartbeat` — refresh `last_seen_at` for a registered probe.
#[post("/probes/heartbeat", format = "json", data = "<body>")]
pub fn heartbeat(
    body: Json<HeartbeatPing>,
    _secret: SharedSecret,
    db: &State<Arc<Db>>,
) -> Result<Status, ApiError> {
    let updated = db
        .conn()
        .execute(
            "UPDATE probes SET last_seen_at = datetime('now') WHERE probe_id = ?1",
            params![body.probe_id],
        )
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    if updated == 0 {
        return Err(err(Status::Forbidden, "probe is not registered"));
    }
    Ok(Status::NoContent)
}

/// `GET /probes/checks` — the full check list, fetched by probes at
/// startup and on their periodic refresh.
#[get("/probes/checks")]
pub fn list_checks(_secret: SharedSecret, db: &State<Arc<Db>>) -> Result<Json<Vec<CheckSpec>>, ApiError> {
    let conn = db.conn();
    let mut stmt = conn
        .prepare("SELECT id, type, target, interval_seconds, webhook FROM checks ORDER BY id")
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    let checks = stmt
        .query_map([], |row| {
            let type_str: String = row.get(1)?;
            Ok(CheckSpec {
                id: row.get(0)?,
                check_type: type_str.parse().unwrap_or(crate::models::CheckType::Http),
                target: row.get(2)?,
                interval_seconds: row.get(3)?,
                webhook: row.get(4)?,
            })
        })
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(checks))
}
