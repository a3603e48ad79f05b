//! Classification of search backend failures.
//!
//! Every failed request ends up as exactly one [`ErrorKind`]. Callers match
//! on the kind instead of probing the error chain.

use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use super::transport::TransportError;

/// Longest slice of an error body kept in messages.
const MAX_BODY_IN_MESSAGE: usize = 2048;

/// Closed taxonomy of backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials missing or rejected. Needs operator action.
    AuthRequired,
    /// Backend asked us to slow down.
    RateLimited,
    /// Network failure, timeout or 5xx.
    Transient,
    /// Any other rejected request.
    Permanent,
}

impl ErrorKind {
    /// Only rate limits and transient failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "provider authentication required",
            Self::RateLimited => "provider rate limited",
            Self::Transient => "transient provider failure",
            Self::Permanent => "provider request failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified search failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRequired, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Classify an HTTP status. Returns `None` for non-error statuses.
pub fn classify_status(status: u16, body: &str) -> Option<ProviderError> {
    if status < 400 {
        return None;
    }
    let kind = match status {
        401 | 403 => ErrorKind::AuthRequired,
        429 => ErrorKind::RateLimited,
        s if s >= 500 => ErrorKind::Transient,
        _ => ErrorKind::Permanent,
    };
    Some(ProviderError::new(
        kind,
        format!(
            "serpapi request failed: {}: {}",
            status_line(status),
            truncate(body.trim(), MAX_BODY_IN_MESSAGE)
        ),
    ))
}

/// Classify a failure that happened before any status was received.
pub fn classify_transport(err: &TransportError) -> ProviderError {
    match err {
        TransportError::Timeout(_)
        | TransportError::Connect(_)
        | TransportError::Body(_) => ProviderError::transient(err.to_string()),
        TransportError::Request(_) => ProviderError::permanent(err.to_string()),
    }
}

/// Render `404 Not Found` style status text.
pub(crate) fn status_line(status: u16) -> String {
    StatusCode::from_u16(status)
        .map(|code| code.to_string())
        .unwrap_or_else(|_| status.to_string())
}

pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
