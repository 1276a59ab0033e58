//! Pure, stateless check execution. Each function takes a check id, the
//! probe's own id, and a target string, and produces a `CheckResult` whose
//! timestamp is stamped at call time. No function here ever returns an
//! `Err` — every failure mode (timeout, connection refusal, bad DNS) is
//! folded into `up = false` with a human-readable `error`.

use std::time::Duration;

use crate::models::{CheckResult, CheckType};

const CHECK_DEADLINE: Duration = Duration::from_secs(10);

pub async fn run_check(
    client: &reqwest::Client,
    check_id: &str,
    probe_id: &str,
    check_type: CheckType,
    target: &str,
) -> CheckResult {
    let start = std::time::Instant::now();
    let (up, error) = match check_type {
        CheckType::Http => http_check(client, target).await,
        CheckType::Tcp => tcp_check(target).await,
        CheckType::Dns => dns_check(target).await,
    };
    CheckResult {
        check_id: check_id.to_string(),
        probe_id: probe_id.to_string(),
        check_type,
        target: target.to_string(),
        up,
        latency_ms: start.elapsed().as_millis() as u64,
        error,
        timestamp: chrono::Utc::now(),
    }
}

async fn http_check(client: &reqwest::Client, target: &str) -> (bool, String) {
    match client.get(target).timeout(CHECK_DEADLINE).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if (200..400).contains(&status) {
                (true, String::new())
            } else {
                (false, format!("unexpected status code: {status}"))
            }
        }
        Err(e) => {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                format!("request failed: {e}")
            };
            (false, reason)
        }
    }
}

async fn tcp_check(target: &str) -> (bool, String) {
    use tokio::net::TcpStream;

    let addr = target.strip_prefix("tcp://").unwrap_or(target);
    match tokio::time::timeout(CHECK_DEADLINE, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => (true, String::new()),
        Ok(Err(e)) => {
            let reason = if e.kind() == std::io::ErrorKind::ConnectionRefused {
                "connection refused".to_string()
            } else {
                format!("tcp connect failed: {e}")
            };
            (false, reason)
        }
        Err(_) => (false, "tcp connect timed out".to_string()),
    }
}

async fn dns_check(target: &str) -> (bool, String) {
    use hickory_resolver::config::{ResolverConfig, ResolverOpts};
    use hickory_resolver::TokioAsyncResolver;

    let hostname = target.strip_prefix("dns://").unwrap_or(target);
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let lookup = tokio::time::timeout(CHECK_DEADLINE, resolver.lookup_ip(hostname)).await;
    match lookup {
        Ok(Ok(response)) => {
            if response.iter().next().is_some() {
                (true, String::new())
            } else {
                (false, "no addresses resolved".to_string())
            }
        }
        Ok(Err(e)) => (false, format!("dns lookup failed: {e}")),
        Err(_) => (false, "dns lookup timed out".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_check_rejects_closed_port() {
        // Port 1 is reserved and essentially never accepts connections on a
        // loopback interface — exercises the connection-refused path without
        // reaching out over the network.
        let (up, error) = tcp_check("127.0.0.1:1").await;
        assert!(!up);
        assert!(!error.is_empty());
    }

    #[tokio::test]
    async fn http_check_rejects_malformed_target() {
        let client = reqwest::Client::new();
        let (up, error) = http_check(&client, "not a url").await;
        assert!(!up);
        assert!(!error.is_empty());
    }

    #[tokio::test]
    async fn dns_check_finds_localhost() {
        let (up, _) = dns_check("localhost").await;
        assert!(up);
    }
}
