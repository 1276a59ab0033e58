use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wacht::config::ProbeConfig;
use wacht::models::{CheckResult, CheckSpec, HeartbeatPing, RegisterProbe};

#[derive(Debug, Parser)]
#[command(name = "wacht-probe", version, about = "Reports check results to a wacht aggregator")]
struct Cli {
    /// Override WACHT_PROBE_ID for this run.
    #[arg(long)]
    probe_id: Option<String>,
}

fn init_logging() {
    let env_filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

struct Scheduled {
    spec: CheckSpec,
    next_due: Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut config = ProbeConfig::load().context("failed to load probe configuration")?;
    if let Some(id) = cli.probe_id {
        config.probe_id = id;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("failed to build http client")?;

    register(&client, &config).await.context("probe registration failed")?;
    info!(probe_id = %config.probe_id, server = %config.server, "registered with aggregator");

    let checks: Vec<CheckSpec> = fetch_checks(&client, &config).await.context("initial check-list fetch failed")?;
    info!(count = checks.len(), "fetched initial check list");

    let schedule = Arc::new(Mutex::new(
        checks.into_iter().map(|spec| Scheduled { spec, next_due: Instant::now() }).collect::<Vec<_>>(),
    ));

    tokio::join!(
        run_check_loop(client.clone(), config_clone(&config), schedule.clone()),
        run_heartbeat_loop(client.clone(), config_clone(&config)),
        run_refresh_loop(client, config, schedule),
    );

    Ok(())
}

/// `ProbeConfig` has no `Clone` derive in the teacher's config style (it
/// carries owned strings meant to be loaded once); a probe only ever needs
/// read access from its three loops, so we hand each one its own copy of
/// the handful of fields it actually touches.
fn config_clone(cfg: &ProbeConfig) -> ProbeConfig {
    ProbeConfig {
        secret: cfg.secret.clone(),
        server: cfg.server.clone(),
        probe_id: cfg.probe_id.clone(),
        version: cfg.version.clone(),
        heartbeat_interval: cfg.heartbeat_interval,
        checks_refresh_interval: cfg.checks_refresh_interval,
    }
}

async fn register(client: &reqwest::Client, config: &ProbeConfig) -> Result<()> {
    let resp = client
        .post(format!("{}/probes/register", config.server))
        .header("X-Wacht-Secret", &config.secret)
        .json(&RegisterProbe { probe_id: config.probe_id.clone(), version: config.version.clone() })
        .send()
        .await
        .context("register request failed")?;

    if !resp.status().is_success() {
        anyhow::bail!("aggregator rejected registration: {}", resp.status());
    }
    Ok(())
}

async fn fetch_checks(client: &reqwest::Client, config: &ProbeConfig) -> Result<Vec<CheckSpec>> {
    let resp = client
        .get(format!("{}/probes/checks", config.server))
        .header("X-Wacht-Secret", &config.secret)
        .send()
        .await
        .context("checks request failed")?;

    if !resp.status().is_success() {
        anyhow::bail!("aggregator rejected checks request: {}", resp.status());
    }
    resp.json::<Vec<CheckSpec>>().await.context("malformed check-list response")
}

async fn run_heartbeat_loop(client: reqwest::Client, config: ProbeConfig) {
    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    loop {
        ticker.tick().await;
        let sent = client
            .post(format!("{}/probes/heartbeat", config.server))
            .header("X-Wacht-Secret", &config.secret)
            .json(&HeartbeatPing { probe_id: config.probe_id.clone() })
            .send()
            .await;

        match sent {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), "heartbeat rejected"),
            Err(e) => warn!(error = %e, "heartbeat delivery failed"),
        }
    }
}

async fn run_refresh_loop(client: reqwest::Client, config: ProbeConfig, schedule: Arc<Mutex<Vec<Scheduled>>>) {
    let mut ticker = tokio::time::interval(config.checks_refresh_interval);
    ticker.tick().await; // first tick fires immediately; we already fetched once in main

    loop {
        ticker.tick().await;
        match fetch_checks(&client, &config).await {
            Ok(fresh) => {
                let mut guard = schedule.lock().await;
                let mut due: HashMap<String, Instant> =
                    guard.iter().map(|s| (s.spec.id.clone(), s.next_due)).collect();
                *guard = fresh
                    .into_iter()
                    .map(|spec| {
                        let next_due = due.remove(&spec.id).unwrap_or_else(Instant::now);
                        Scheduled { spec, next_due }
                    })
                    .collect();
                info!(count = guard.len(), "refreshed check list");
            }
            Err(e) => warn!(error = %e, "check-list refresh failed, keeping previous list"),
        }
    }
}

async fn run_check_loop(client: reqwest::Client, config: ProbeConfig, schedule: Arc<Mutex<Vec<Scheduled>>>) {
    loop {
        let due_now: Vec<CheckSpec> = {
            let mut guard = schedule.lock().await;
            let now = Instant::now();
            let mut due = Vec::new();
            for s in guard.iter_mut() {
                if s.next_due <= now {
                    due.push(s.spec.clone());
                    s.next_due = now + Duration::from_secs(s.spec.interval_seconds as u64);
                }
            }
            due
        };

        for spec in due_now {
            let client = client.clone();
            let config_server = config.server.clone();
            let config_secret = config.secret.clone();
            let probe_id = config.probe_id.clone();

            tokio::spawn(async move {
                let check_type = spec.check_type;
                let result = wacht::checkers::run_check(&client, &spec.id, &probe_id, check_type, &spec.target).await;
                if let Err(e) = post_result(&client, &config_server, &config_secret, &result).await {
                    error!(check_id = %spec.id, error = %e, "failed to report check result");
                }
            });
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

async fn post_result(client: &reqwest::Client, server: &str, secret: &str, result: &CheckResult) -> Result<()> {
    let resp = client
        .post(format!("{server}/results"))
        .header("X-Wacht-Secret", secret)
        .json(result)
        .send()
        .await
        .context("result post failed")?;

    if !resp.status().is_success() {
        anyhow::bail!("aggregator rejected result: {}", resp.status());
    }
    Ok(())
}
