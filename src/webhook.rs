//! One-shot webhook dispatch. No retry, no durable outbox: delivery is
//! best-effort on the transition edge, by design.

use std::time::Duration;

use crate::models::WebhookPayload;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn dispatch(client: &reqwest::Client, url: &str, payload: &WebhookPayload) {
    let result = client
        .post(url)
        .json(payload)
        .timeout(DISPATCH_TIMEOUT)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            eprintln!(
                "webhook: non-2xx from {url} for check {}: {}",
                payload.check_id,
                resp.status()
            );
        }
        Err(e) => {
            eprintln!("webhook: delivery to {url} failed for check {}: {e}", payload.check_id);
        }
    }
}
