use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::auth::SharedSecret;
use crate::db::Db;
use crate::engine::{DecisionEngine, Transition};
use crate::models::{CheckResult, WebhookPayload};
use crate::webhook;

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

/// `POST /results` — append one observation, then re-run the decision
/// engine for its check. Webhook dispatch happens outside the DB lock,
/// after the transition is already durable.
#[post("/results", format = "json", data = "<result>")]
pub async fn ingest_result(
    result: Json<CheckResult>,
    _secret: SharedSecret,
    db: &State<Arc<Db>>,
    engine: &State<Arc<DecisionEngine>>,
    http: &State<reqwest::Client>,
) -> Result<Status, ApiError> {
    let result = result.into_inner();

    let known_probe: bool = db
        .conn()
        .query_row(
            "SELECT 1 FROM probes WHERE probe_id = ?1",
            params![result.probe_id],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !known_probe {
        return Err(err(Status::Forbidden, "probe is not registered"));
    }

    db.conn()
        .execute(
            "INSERT INTO results (check_id, probe_id, type, target, up, latency_ms, error, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.check_id,
                result.probe_id,
                result.check_type.to_string(),
                result.target,
                result.up as i64,
                result.latency_ms as i64,
                result.error,
                result.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| err(Status::InternalServerError, format!("db error: {e}")))?;

    let transition = engine.evaluate(db, &result.check_id).await;

    if !matches!(transition, Transition::None) {
        let webhook_url: Option<String> = db
            .conn()
            .query_row(
                "SELECT webhook FROM checks WHERE id = ?1",
                params![result.check_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .ok()
            .flatten();

        if let Some(url) = webhook_url {
            let payload = match transition {
                Transition::Opened { probes_down, probes_total } => Some(WebhookPayload {
                    check_id: result.check_id.clone(),
                    target: result.target.clone(),
                    status: "down".to_string(),
                    probes_down,
                    probes_total,
                }),
                Transition::Resolved { probes_up, probes_total } => Some(WebhookPayload {
                    check_id: result.check_id.clone(),
                    target: result.target.clone(),
                    status: "up".to_string(),
                    probes_down: probes_total - probes_up,
                    probes_total,
                }),
                Transition::None => None,
            };

            if let Some(payload) = payload {
                webhook::dispatch(http, &url, &payload).await;
            }
        }
    }

    Ok(Status::NoContent)
}
