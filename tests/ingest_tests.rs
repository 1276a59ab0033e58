use std::sync::Arc;

use chrono::Utc;
use rocket::http::{Header, Status};
use rocket::local::blocking::Client;
use wacht::db::Db;
use wacht::engine::DecisionEngine;
use wacht::models::{CheckResult, CheckSpec, CheckType, RegisterProbe};

const SECRET: &str = "test-secret";

fn test_client() -> Client {
    let db_path = format!("/tmp/wacht_test_{}.db", uuid::Uuid::new_v4());
    let database = Arc::new(Db::open(&db_path).expect("db init failed"));
    database
        .seed_checks(&[CheckSpec {
            id: "c1".into(),
            check_type: CheckType::Http,
            target: "https://example.com".into(),
            interval_seconds: 30,
            webhook: None,
        }])
        .expect("seed failed");

    let engine = Arc::new(DecisionEngine::new());
    let http = reqwest::Client::new();

    let rocket = rocket::build()
        .manage(database)
        .manage(engine)
        .manage(http)
        .manage(SECRET.to_string())
        .mount(
            "/",
            rocket::routes![
                wacht::routes::health,
                wacht::routes::status_page,
                wacht::routes::register_probe,
                wacht::routes::heartbeat,
                wacht::routes::list_checks,
                wacht::routes::ingest_result,
            ],
        )
        .register(
            "/",
            rocket::catchers![
                wacht::catchers::bad_request,
                wacht::catchers::unauthorized,
                wacht::catchers::forbidden,
                wacht::catchers::not_found,
                wacht::catchers::unprocessable_entity,
                wacht::catchers::internal_error,
            ],
        );

    Client::tracked(rocket).expect("valid rocket instance")
}

fn register(client: &Client, probe_id: &str) {
    let resp = client
        .post("/probes/register")
        .header(Header::new("X-Wacht-Secret", SECRET))
        .json(&RegisterProbe { probe_id: probe_id.to_string(), version: "1.0".to_string() })
        .dispatch();
    assert_eq!(resp.status(), Status::NoContent);
}

fn post_result(client: &Client, probe_id: &str, up: bool) -> Status {
    let result = CheckResult {
        check_id: "c1".to_string(),
        probe_id: probe_id.to_string(),
        check_type: CheckType::Http,
        target: "https://example.com".to_string(),
        up,
        latency_ms: 42,
        error: if up { String::new() } else { "connection refused".to_string() },
        timestamp: Utc::now(),
    };
    client
        .post("/results")
        .header(Header::new("X-Wacht-Secret", SECRET))
        .json(&result)
        .dispatch()
        .status()
}

#[test]
fn health_requires_no_auth() {
    let client = test_client();
    let resp = client.get("/health").dispatch();
    assert_eq!(resp.status(), Status::Ok);
}

#[test]
fn missing_secret_is_rejected() {
    let client = test_client();
    let resp = client
        .post("/probes/register")
        .json(&RegisterProbe { probe_id: "a".to_string(), version: "1.0".to_string() })
        .dispatch();
    assert_eq!(resp.status(), Status::Unauthorized);
}

#[test]
fn unregistered_probe_cannot_post_results() {
    let client = test_client();
    let status = post_result(&client, "ghost", true);
    assert_eq!(status, Status::Forbidden);
}

#[test]
fn single_probe_flap_does_not_open_an_incident() {
    let client = test_client();
    register(&client, "a");
    assert_eq!(post_result(&client, "a", false), Status::NoContent);

    // The quorum rule does not open an incident for a single down probe
    // (not a majority), even though /status's `status` field independently
    // reflects the most recent raw result, per the most-recent-row reading.
    let overview: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert!(overview.checks[0].incident_since.is_none());
}

#[test]
fn clean_outage_opens_exactly_one_incident() {
    let client = test_client();
    for p in ["a", "b", "c"] {
        register(&client, p);
    }

    assert_eq!(post_result(&client, "a", true), Status::NoContent);
    assert_eq!(post_result(&client, "b", false), Status::NoContent);
    assert_eq!(post_result(&client, "b", false), Status::NoContent);
    assert_eq!(post_result(&client, "c", false), Status::NoContent);
    assert_eq!(post_result(&client, "c", false), Status::NoContent);

    let overview: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert_eq!(overview.checks[0].status, "down");
    assert!(overview.checks[0].incident_since.is_some());

    // A further down result is a no-op: the incident stays the same open one.
    assert_eq!(post_result(&client, "b", false), Status::NoContent);
    let overview_again: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert_eq!(overview_again.checks[0].incident_since, overview.checks[0].incident_since);
}

#[test]
fn recovery_resolves_the_open_incident() {
    let client = test_client();
    for p in ["a", "b", "c"] {
        register(&client, p);
    }

    post_result(&client, "a", true);
    post_result(&client, "b", false);
    post_result(&client, "b", false);
    post_result(&client, "c", false);
    post_result(&client, "c", false);

    let overview: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert_eq!(overview.checks[0].status, "down");

    post_result(&client, "b", true);
    post_result(&client, "c", true);

    let overview: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert_eq!(overview.checks[0].status, "up");
}

#[test]
fn registered_probe_appears_as_online_in_status() {
    let client = test_client();
    register(&client, "a");
    let overview: wacht::models::StatusOverview =
        client.get("/status").dispatch().into_json().expect("valid json");
    assert_eq!(overview.probes.len(), 1);
    assert!(overview.probes[0].online);
}

#[test]
fn heartbeat_for_unknown_probe_is_rejected() {
    let client = test_client();
    let resp = client
        .post("/probes/heartbeat")
        .header(Header::new("X-Wacht-Secret", SECRET))
        .json(&wacht::models::HeartbeatPing { probe_id: "ghost".to_string() })
        .dispatch();
    assert_eq!(resp.status(), Status::Forbidden);
}

#[test]
fn list_checks_returns_the_seeded_check() {
    let client = test_client();
    register(&client, "a");
    let resp = client
        .get("/probes/checks")
        .header(Header::new("X-Wacht-Secret", SECRET))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let checks: Vec<CheckSpec> = resp.into_json().expect("valid json");
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].id, "c1");
}
