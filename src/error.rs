// src/error.rs

//! Unified error handling for the fare watcher application.

use thiserror::Error;

use crate::notify::{ChannelError, NotifyError};
use crate::provider::{ErrorKind, ProviderError};

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Process exit codes reported by the CLI. Success is 0.
pub mod exit_code {
    pub const GENERIC_FAILURE: i32 = 1;
    pub const INVALID_USAGE: i32 = 2;
    pub const AUTH_REQUIRED: i32 = 3;
    pub const PROVIDER_FAILURE: i32 = 4;
    pub const NOTIFY_FAILURE: i32 = 6;
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Search backend failure, classified
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// One or more notification channels failed
    #[error("{0}")]
    Notify(#[from] NotifyError),

    /// A single notification channel failed outside of a watch pass
    #[error("{0}")]
    Channel(#[from] ChannelError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// Watch lookup failed
    #[error("watch not found: {0}")]
    WatchNotFound(String),

    /// Provider failures under the active exit policy
    #[error("{0}")]
    ProviderFailures(String),

    /// Deliveries that failed during a watch pass
    #[error("{0}")]
    NotifyFailures(String),

    /// Readiness checks that did not pass
    #[error("{0}")]
    ChecksFailed(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Map this error to the process exit code the CLI reports.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Provider(err) => match err.kind() {
                ErrorKind::AuthRequired => exit_code::AUTH_REQUIRED,
                ErrorKind::RateLimited | ErrorKind::Transient | ErrorKind::Permanent => {
                    exit_code::PROVIDER_FAILURE
                }
            },
            Self::ProviderFailures(_) => exit_code::PROVIDER_FAILURE,
            Self::Notify(_) | Self::Channel(_) | Self::NotifyFailures(_) => {
                exit_code::NOTIFY_FAILURE
            }
            Self::Usage(_) | Self::Validation(_) => exit_code::INVALID_USAGE,
            _ => exit_code::GENERIC_FAILURE,
        }
    }

    /// Operator hints printed after the error message.
    pub fn hints(&self) -> Vec<&'static str> {
        match self {
            Self::Provider(err) if err.kind() == ErrorKind::AuthRequired => vec![
                "farewatch config set provider google-url",
                "farewatch config set serp_api_key <your_key>",
            ],
            Self::Channel(ChannelError::MissingWebhookUrl) => {
                vec!["farewatch config set webhook_url https://example.com/hook"]
            }
            Self::Channel(ChannelError::EmailNotConfigured { .. })
            | Self::Channel(ChannelError::MissingRecipient) => vec![
                "farewatch config set smtp_host smtp.example.com",
                "farewatch config set smtp_user you@example.com",
                "farewatch config set smtp_pass <app_password>",
                "farewatch config set smtp_sender you@example.com",
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_auth_required() {
        let err = AppError::from(ProviderError::auth_required("key missing"));
        assert_eq!(err.exit_code(), exit_code::AUTH_REQUIRED);
        assert!(!err.hints().is_empty());
    }

    #[test]
    fn test_exit_code_for_other_provider_failures() {
        for err in [
            ProviderError::rate_limited("slow down"),
            ProviderError::transient("reset"),
            ProviderError::permanent("bad request"),
        ] {
            assert_eq!(AppError::from(err).exit_code(), exit_code::PROVIDER_FAILURE);
        }
    }

    #[test]
    fn test_exit_code_for_usage_and_generic() {
        assert_eq!(
            AppError::usage("--id is required").exit_code(),
            exit_code::INVALID_USAGE
        );
        assert_eq!(
            AppError::WatchNotFound("w_1".into()).exit_code(),
            exit_code::GENERIC_FAILURE
        );
        assert_eq!(
            AppError::ChecksFailed("doctor found 1 failing check(s)".into()).exit_code(),
            exit_code::GENERIC_FAILURE
        );
    }

    #[test]
    fn test_exit_code_for_notify_failures() {
        let err = AppError::NotifyFailures("watch w_1 email failed: missing email recipient".into());
        assert_eq!(err.exit_code(), exit_code::NOTIFY_FAILURE);
        assert_eq!(
            AppError::Channel(ChannelError::MissingWebhookUrl).hints(),
            vec!["farewatch config set webhook_url https://example.com/hook"]
        );
    }
}
