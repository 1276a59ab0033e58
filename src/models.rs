use serde::{Deserialize, Serialize};

/// What to probe. Seeded from aggregator config, fetched by probes, never
/// mutated by the core once created.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub target: String,
    #[serde(rename = "interval", default = "default_interval")]
    pub interval_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
}

fn default_interval() -> u32 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Http,
    Tcp,
    Dns,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckType::Http => write!(f, "http"),
            CheckType::Tcp => write!(f, "tcp"),
            CheckType::Dns => write!(f, "dns"),
        }
    }
}

impl std::str::FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(CheckType::Http),
            "tcp" => Ok(CheckType::Tcp),
            "dns" => Ok(CheckType::Dns),
            other => Err(format!("unknown check type: {other}")),
        }
    }
}

/// A registered prober. Upserted on startup, refreshed by heartbeats and
/// accepted results, never deleted by the core.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Probe {
    pub probe_id: String,
    pub version: String,
    pub registered_at: String,
    pub last_seen_at: String,
}

/// A single observation, immutable once written.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckResult {
    pub check_id: String,
    pub probe_id: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub target: String,
    pub up: bool,
    pub latency_ms: u64,
    #[serde(default)]
    pub error: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A down-period for a single check. At most one row per `check_id` may
/// have `resolved_at = None` at any time.
#[derive(Debug, Serialize, Clone)]
pub struct Incident {
    pub id: String,
    pub check_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterProbe {
    pub probe_id: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatPing {
    pub probe_id: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct WebhookPayload {
    pub check_id: String,
    pub target: String,
    pub status: String,
    pub probes_down: u32,
    pub probes_total: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOverview {
    pub checks: Vec<StatusCheck>,
    pub probes: Vec<StatusProbe>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusCheck {
    pub check_id: String,
    pub target: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_since: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusProbe {
    pub probe_id: String,
    pub online: bool,
    pub last_seen_at: String,
}
