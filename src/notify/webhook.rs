//! Webhook channel: one JSON POST per alert, no retry.

use std::time::Duration;

use super::ChannelError;
use crate::models::Alert;
use crate::provider::error::{status_line, truncate};
use crate::provider::{HttpTransport, TransportError};

const MAX_BODY_IN_MESSAGE: usize = 512;

/// POST the alert as JSON to `url`.
pub async fn send(
    transport: &dyn HttpTransport,
    url: &str,
    alert: &Alert,
    timeout: Duration,
) -> Result<(), ChannelError> {
    if url.trim().is_empty() {
        return Err(ChannelError::MissingWebhookUrl);
    }
    let payload = serde_json::to_vec(alert)?;

    let response = transport
        .post_json(url, payload, timeout)
        .await
        .map_err(|cause| ChannelError::WebhookTransport {
            hint: transport_hint(&cause),
            cause,
        })?;

    if response.is_success() {
        log::debug!("alert for watch {} posted to webhook", alert.watch_id);
        return Ok(());
    }

    Err(ChannelError::WebhookStatus {
        classification: classify_status(response.status),
        status: status_line(response.status),
        body: truncate(response.body.trim(), MAX_BODY_IN_MESSAGE).to_string(),
    })
}

/// Diagnostic label for a non-2xx webhook response.
pub fn classify_status(status: u16) -> &'static str {
    match status {
        401 | 403 => "webhook authorization failed",
        429 => "webhook endpoint rate limited",
        s if s >= 500 => "webhook endpoint server error",
        _ => "webhook request failed",
    }
}

fn transport_hint(err: &TransportError) -> &'static str {
    match err {
        TransportError::Timeout(_) => "webhook timeout (check endpoint latency or network)",
        TransportError::Connect(_) => {
            "webhook connection failed (verify webhook_url host and connectivity)"
        }
        TransportError::Body(_) => "webhook network error (check connectivity to endpoint)",
        TransportError::Request(_) => "webhook request transport error",
    }
}
