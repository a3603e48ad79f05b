// src/notify/email.rs

//! Email channel over SMTP.

use super::ChannelError;
use crate::models::{Alert, SmtpConfig};

/// Port that speaks TLS from the first byte; everything else uses STARTTLS.
#[cfg(feature = "email")]
const IMPLICIT_TLS_PORT: u16 = 465;

/// Check that SMTP settings are complete and a recipient is known.
pub fn check_ready(smtp: &SmtpConfig, to: &str) -> Result<(), ChannelError> {
    let missing = smtp.missing_fields();
    if !missing.is_empty() {
        return Err(ChannelError::EmailNotConfigured { missing });
    }
    if to.trim().is_empty() {
        return Err(ChannelError::MissingRecipient);
    }
    Ok(())
}

pub fn subject(alert: &Alert) -> String {
    format!("farewatch alert: {}", alert.watch_name)
}

pub fn body(alert: &Alert) -> String {
    format!(
        "Reason: {}\nLowest price: {} {}\nGoogle Flights: {}\nTriggered at: {}\n",
        alert.reason,
        alert.lowest_price,
        alert.currency,
        alert.url,
        alert.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Validate settings, then deliver.
pub async fn send(smtp: &SmtpConfig, to: &str, alert: &Alert) -> Result<(), ChannelError> {
    check_ready(smtp, to)?;
    deliver(smtp, to.trim(), alert).await
}

#[cfg(feature = "email")]
async fn deliver(smtp: &SmtpConfig, to: &str, alert: &Alert) -> Result<(), ChannelError> {
    use lettre::message::Mailbox;
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    let from: Mailbox = smtp
        .sender
        .parse()
        .map_err(|e| ChannelError::Smtp(format!("invalid sender {:?}: {e}", smtp.sender)))?;
    let recipient: Mailbox = to
        .parse()
        .map_err(|e| ChannelError::Smtp(format!("invalid recipient {to:?}: {e}")))?;

    let message = Message::builder()
        .from(from)
        .to(recipient)
        .subject(subject(alert))
        .header(ContentType::TEXT_PLAIN)
        .body(body(alert))
        .map_err(|e| ChannelError::Smtp(e.to_string()))?;

    let builder = if smtp.port == IMPLICIT_TLS_PORT {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
    }
    .map_err(|e| ChannelError::Smtp(e.to_string()))?;

    let mailer = builder
        .port(smtp.port)
        .credentials(Credentials::new(
            smtp.username.clone(),
            smtp.password.clone(),
        ))
        .build();

    mailer
        .send(message)
        .await
        .map_err(|e| ChannelError::Smtp(e.to_string()))?;

    log::info!("alert for watch {} emailed to {}", alert.watch_id, to);
    Ok(())
}

#[cfg(not(feature = "email"))]
async fn deliver(_smtp: &SmtpConfig, _to: &str, _alert: &Alert) -> Result<(), ChannelError> {
    Err(ChannelError::Smtp(
        "built without the `email` feature".to_string(),
    ))
}
