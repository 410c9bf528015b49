//! Anomaly notification side channel.
//!
//! Network-origin changes during rotation are a detection signal, not a
//! control: they never block the protocol. Alerts are queued to a detached
//! worker task whose lifetime is independent of any request, and delivery
//! failures are logged, never surfaced.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::types::SessionId;

/// Bounded alert queue; when full, alerts are dropped with a warning rather
/// than blocking the rotation path.
const QUEUE_CAPACITY: usize = 64;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg_attr(test, mockall::automock)]
pub trait AnomalyNotifier: Send + Sync {
    /// Fire-and-forget: must never block and never fail the caller.
    fn notify(&self, session_id: SessionId, previous_network: &str, current_network: &str);
}

#[derive(Debug, Serialize)]
struct NetworkChangeAlert {
    old_ip: String,
    new_ip: String,
    session_id: String,
}

/// Posts network-change alerts to an external webhook endpoint.
pub struct WebhookNotifier {
    tx: mpsc::Sender<NetworkChangeAlert>,
}

impl WebhookNotifier {
    /// Creates the notifier and spawns its delivery worker.
    pub fn spawn(webhook_url: String) -> Self {
        let (tx, mut rx) = mpsc::channel::<NetworkChangeAlert>(QUEUE_CAPACITY);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                deliver(&client, &webhook_url, &alert).await;
            }
        });

        Self { tx }
    }
}

impl AnomalyNotifier for WebhookNotifier {
    fn notify(&self, session_id: SessionId, previous_network: &str, current_network: &str) {
        let alert = NetworkChangeAlert {
            old_ip: previous_network.to_string(),
            new_ip: current_network.to_string(),
            session_id: session_id.to_string(),
        };

        if self.tx.try_send(alert).is_err() {
            tracing::warn!(%session_id, "Anomaly alert queue full or closed, dropping alert");
        }
    }
}

/// Deliver one alert with bounded retry; exhausting the retries only logs.
async fn deliver(client: &reqwest::Client, url: &str, alert: &NetworkChangeAlert) {
    for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
        match try_send(client, url, alert).await {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    url,
                    error = %e,
                    "Anomaly webhook delivery attempt failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }
        }
    }

    if let Err(e) = try_send(client, url, alert).await {
        tracing::error!(url, error = %e, "Anomaly webhook delivery failed after all retries");
    }
}

async fn try_send(
    client: &reqwest::Client,
    url: &str,
    alert: &NetworkChangeAlert,
) -> Result<(), anyhow::Error> {
    let response = client.post(url).json(alert).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("webhook returned HTTP {}", response.status().as_u16());
    }
    Ok(())
}

/// Notifier for deployments without a webhook endpoint configured.
pub struct NoopNotifier;

impl AnomalyNotifier for NoopNotifier {
    fn notify(&self, session_id: SessionId, previous_network: &str, current_network: &str) {
        tracing::debug!(
            %session_id,
            previous_network,
            current_network,
            "Network origin changed (no webhook configured)"
        );
    }
}
