#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::fairing::AdHoc;
use wacht::config::AggregatorConfig;
use wacht::db::Db;
use wacht::engine::DecisionEngine;
use wacht::{catchers, routes};

#[launch]
fn rocket() -> _ {
    let config = AggregatorConfig::load().expect("configuration error");

    let database = Arc::new(Db::open(&config.database_path).expect("failed to open database"));
    let seeded = database.seed_checks(&config.checks).expect("failed to seed checks");
    println!("aggregator: seeded {seeded} new check(s), {} total configured", config.checks.len());

    let engine = Arc::new(DecisionEngine::new());
    let http = reqwest::Client::new();

    rocket::build()
        .manage(database.clone())
        .manage(engine)
        .manage(http)
        .manage(config.secret)
        .mount(
            "/",
            routes![
                routes::health,
                routes::status_page,
                routes::register_probe,
                routes::heartbeat,
                routes::list_checks,
                routes::ingest_result,
            ],
        )
        .register(
            "/",
            rocket::catchers![
                catchers::bad_request,
                catchers::unauthorized,
                catchers::forbidden,
                catchers::not_found,
                catchers::unprocessable_entity,
                catchers::internal_error,
            ],
        )
        .attach(AdHoc::on_liftoff("background loops", move |rocket| {
            Box::pin(async move {
                let shutdown = rocket.shutdown();
                tokio::spawn(wacht::background::run_stale_probe_logger(database.clone(), shutdown.clone()));
                tokio::spawn(wacht::background::run_retention_evictor(database, shutdown));
            })
        }))
}
