//! Fail-fast configuration loading for both binaries. Required values
//! missing at startup are a fatal, non-zero-exit condition — never a
//! silently-assumed default.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::models::CheckSpec;

pub struct AggregatorConfig {
    pub secret: String,
    pub database_path: String,
    pub checks: Vec<CheckSpec>,
    pub retention_days: u32,
}

impl AggregatorConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let secret = std::env::var("WACHT_SECRET")
            .context("WACHT_SECRET is required (shared secret probes authenticate with)")?;
        if secret.trim().is_empty() {
            bail!("WACHT_SECRET must not be empty");
        }

        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "wacht.db".into());

        let retention_days = std::env::var("RETENTION_DAYS")
            .ok()
            .map(|v| v.parse::<u32>().context("RETENTION_DAYS must be a positive integer"))
            .transpose()?
            .unwrap_or(30);

        let checks_path = std::env::var("CHECKS_CONFIG_PATH").unwrap_or_else(|_| "checks.json".into());
        let checks = match std::fs::read_to_string(&checks_path) {
            Ok(raw) => serde_json::from_str::<Vec<CheckSpec>>(&raw)
                .with_context(|| format!("{checks_path} is not a valid check-list JSON array"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!("config: no seed file at {checks_path}, starting with zero checks");
                Vec::new()
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {checks_path}")),
        };

        for c in &checks {
            if !(1..=86400).contains(&c.interval_seconds) {
                bail!("check {}: interval_seconds must be in 1..=86400, got {}", c.id, c.interval_seconds);
            }
        }

        Ok(AggregatorConfig { secret, database_path, checks, retention_days })
    }
}

pub struct ProbeConfig {
    pub secret: String,
    pub server: String,
    pub probe_id: String,
    pub version: String,
    pub heartbeat_interval: Duration,
    pub checks_refresh_interval: Duration,
}

impl ProbeConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let secret = std::env::var("WACHT_SECRET").context("WACHT_SECRET is required")?;
        let server = std::env::var("WACHT_SERVER")
            .context("WACHT_SERVER is required (aggregator base URL)")?;
        let probe_id = std::env::var("WACHT_PROBE_ID").context("WACHT_PROBE_ID is required")?;

        let heartbeat_interval = std::env::var("WACHT_HEARTBEAT_INTERVAL_SECS")
            .ok()
            .map(|v| v.parse::<u64>().context("WACHT_HEARTBEAT_INTERVAL_SECS must be a positive integer"))
            .transpose()?
            .unwrap_or(30);

        let checks_refresh_interval = std::env::var("WACHT_CHECKS_REFRESH_SECS")
            .ok()
            .map(|v| v.parse::<u64>().context("WACHT_CHECKS_REFRESH_SECS must be a positive integer"))
            .transpose()?
            .unwrap_or(300);

        Ok(ProbeConfig {
            secret,
            server: server.trim_end_matches('/').to_string(),
            probe_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            heartbeat_interval: Duration::from_secs(heartbeat_interval),
            checks_refresh_interval: Duration::from_secs(checks_refresh_interval),
        })
    }
}
