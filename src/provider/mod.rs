//! Flight search providers.
//!
//! - `SerpApiClient`: priced results from SerpApi, with retries
//! - `UrlOnlyProvider`: no network, returns only the public search link

pub mod deep_link;
pub mod error;
pub mod serpapi;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Config, SearchQuery, SearchResult};

pub use deep_link::{UrlOnlyProvider, build_deep_link};
pub use error::{ErrorKind, ProviderError, classify_status, classify_transport};
pub use serpapi::SerpApiClient;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// The search contract consumed by a watch pass.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Short provider tag used in logs.
    fn name(&self) -> &'static str;

    /// Run one search. Failures are always classified.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ProviderError>;
}

/// Which backend a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    SerpApi,
    GoogleUrl,
}

impl ProviderKind {
    /// Parse a configured provider name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "serpapi" => Some(Self::SerpApi),
            "google-url" | "google" => Some(Self::GoogleUrl),
            _ => None,
        }
    }

    /// Canonical configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SerpApi => "serpapi",
            Self::GoogleUrl => "google-url",
        }
    }
}

/// Build the provider selected by `config`.
pub fn build_provider(
    config: &Config,
    timeout_override: Option<Duration>,
    transport: Arc<dyn HttpTransport>,
) -> crate::error::Result<Box<dyn FlightProvider>> {
    let provider: Box<dyn FlightProvider> = match config.validate_provider()? {
        ProviderKind::GoogleUrl => Box::new(UrlOnlyProvider),
        ProviderKind::SerpApi => Box::new(SerpApiClient::from_config(
            &config.provider,
            timeout_override,
            transport,
        )),
    };
    log::debug!("using provider {}", provider.name());
    Ok(provider)
}
