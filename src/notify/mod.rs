//! Alert delivery across notification channels.
//!
//! Channels are independent: a failing email never stops the webhook from
//! being attempted. Terminal output is best-effort and never fails.

pub mod email;
pub mod terminal;
pub mod webhook;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Alert, NotifyConfig, Watch};
use crate::provider::{HttpTransport, TransportError};

/// A notification medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Terminal,
    Email,
    Webhook,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Terminal => "terminal",
            Self::Email => "email",
            Self::Webhook => "webhook",
        })
    }
}

/// Failure of a single channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("email not configured: missing {}", .missing.join(", "))]
    EmailNotConfigured { missing: Vec<&'static str> },

    #[error("missing email recipient")]
    MissingRecipient,

    #[error("missing webhook url")]
    MissingWebhookUrl,

    /// Endpoint answered with a non-2xx status
    #[error("{classification}: {status}: {body}")]
    WebhookStatus {
        classification: &'static str,
        status: String,
        body: String,
    },

    /// No response from the endpoint
    #[error("{hint}: {cause}")]
    WebhookTransport {
        hint: &'static str,
        cause: TransportError,
    },

    #[error("smtp delivery failed: {0}")]
    Smtp(String),

    #[error("encode alert: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One failed delivery within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub watch_id: String,
    pub channel: Channel,
    pub message: String,
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "watch {} {} failed: {}",
            self.watch_id, self.channel, self.message
        )
    }
}

/// Every channel failure from one dispatch, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct NotifyError {
    failures: Vec<ChannelFailure>,
}

impl NotifyError {
    /// `Ok` when nothing failed.
    pub fn from_failures(failures: Vec<ChannelFailure>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self { failures })
        }
    }

    pub fn failures(&self) -> &[ChannelFailure] {
        &self.failures
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.failures.iter().map(|f| f.channel).collect()
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// The three delivery capabilities.
#[async_trait]
pub trait NotifyChannels: Send + Sync {
    /// Fire-and-forget human-readable output.
    fn send_terminal(&self, alert: &Alert);

    /// Send to `to`, or the configured default recipient when blank.
    async fn send_email(&self, to: &str, alert: &Alert) -> Result<(), ChannelError>;

    /// POST to `url`, or the configured default URL when blank.
    async fn send_webhook(&self, url: &str, alert: &Alert) -> Result<(), ChannelError>;
}

/// Deliver an alert on every channel the watch enables.
pub async fn dispatch_alert(
    channels: &dyn NotifyChannels,
    watch: &Watch,
    alert: &Alert,
) -> Result<(), NotifyError> {
    let mut failures = Vec::new();

    if watch.notify_terminal {
        channels.send_terminal(alert);
    }
    if watch.notify_email {
        if let Err(err) = channels.send_email(&watch.email_to, alert).await {
            log::warn!("watch {} email delivery failed: {}", watch.id, err);
            failures.push(ChannelFailure {
                watch_id: watch.id.clone(),
                channel: Channel::Email,
                message: err.to_string(),
            });
        }
    }
    if watch.notify_webhook {
        if let Err(err) = channels.send_webhook(&watch.webhook_url, alert).await {
            log::warn!("watch {} webhook delivery failed: {}", watch.id, err);
            failures.push(ChannelFailure {
                watch_id: watch.id.clone(),
                channel: Channel::Webhook,
                message: err.to_string(),
            });
        }
    }

    NotifyError::from_failures(failures)
}

/// Production channels: stderr, SMTP and HTTP webhooks.
pub struct Notifier {
    config: NotifyConfig,
    transport: Arc<dyn HttpTransport>,
}

impl Notifier {
    pub fn new(config: NotifyConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn resolve<'a>(explicit: &'a str, fallback: &'a str) -> &'a str {
        if explicit.trim().is_empty() {
            fallback.trim()
        } else {
            explicit.trim()
        }
    }
}

#[async_trait]
impl NotifyChannels for Notifier {
    fn send_terminal(&self, alert: &Alert) {
        terminal::write_alert(&mut std::io::stderr().lock(), alert);
    }

    async fn send_email(&self, to: &str, alert: &Alert) -> Result<(), ChannelError> {
        let to = Self::resolve(to, &self.config.default_email);
        email::send(&self.config.smtp, to, alert).await
    }

    async fn send_webhook(&self, url: &str, alert: &Alert) -> Result<(), ChannelError> {
        let url = Self::resolve(url, &self.config.webhook_url);
        let timeout = Duration::from_secs(self.config.webhook_timeout_secs.max(1));
        webhook::send(self.transport.as_ref(), url, alert, timeout).await
    }
}
