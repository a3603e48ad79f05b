// src/provider/serpapi.rs

//! SerpApi Google Flights client with bounded retries.
//!
//! Each search makes up to `retries + 1` attempts. Rate limits and
//! transient failures are retried after `backoff * 2^min(attempt, 5)`;
//! auth and permanent failures are returned on the first occurrence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use url::form_urlencoded;

use super::deep_link::build_deep_link;
use super::error::{classify_status, classify_transport};
use super::transport::HttpTransport;
use super::{FlightProvider, ProviderError};
use crate::models::{Flight, ProviderConfig, SearchQuery, SearchResult};

const DEFAULT_BASE_URL: &str = "https://serpapi.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(400);

/// Backoff multiplier stops growing after this many doublings.
const MAX_BACKOFF_SHIFT: u32 = 5;

const PROVIDER_TAG: &str = "serpapi";

/// Resilient search client for the SerpApi Google Flights engine.
pub struct SerpApiClient {
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
    retries: Option<u32>,
    backoff: Option<Duration>,
    transport: Arc<dyn HttpTransport>,
}

impl SerpApiClient {
    /// Create a client with default timeout, retry budget and backoff.
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            retries: None,
            backoff: None,
            transport,
        }
    }

    /// Create a client from configuration.
    ///
    /// `timeout_override` (e.g. from `--timeout`) wins over the configured
    /// timeout.
    pub fn from_config(
        config: &ProviderConfig,
        timeout_override: Option<Duration>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let configured = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(config.api_key.clone(), transport)
            .with_base_url(&config.base_url)
            .with_retries(config.retries)
            .with_backoff(Duration::from_millis(config.backoff_ms))
            .with_timeout(timeout_override.or(configured).unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        if !trimmed.is_empty() {
            self.base_url = trimmed.to_string();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Per-attempt timeout; zero falls back to the default.
    pub fn resolved_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Extra attempts after the first one.
    pub fn resolved_retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    pub fn resolved_backoff(&self) -> Duration {
        self.backoff
            .filter(|b| !b.is_zero())
            .unwrap_or(DEFAULT_BACKOFF)
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.resolved_backoff() * (1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }

    /// Search endpoint with query and key as SerpApi parameters.
    fn endpoint(&self, query: &SearchQuery) -> String {
        let mut params: Vec<(&str, String)> = vec![
            ("engine", "google_flights".into()),
            ("api_key", self.api_key.clone()),
            ("departure_id", query.from.clone()),
            ("arrival_id", query.to.clone()),
            ("outbound_date", query.depart.clone()),
            ("adults", query.adults.max(1).to_string()),
            ("children", query.children.to_string()),
        ];
        if !query.return_date.is_empty() {
            params.push(("return_date", query.return_date.clone()));
        }
        if !query.cabin.is_empty() {
            params.push(("travel_class", query.cabin.clone()));
        }
        if query.nonstop {
            params.push(("stops", "0".into()));
        }
        if !query.currency.is_empty() {
            params.push(("currency", query.currency.clone()));
        }
        params.sort_by(|a, b| a.0.cmp(b.0));

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{}/search.json?{}", self.base_url, encoded)
    }

    async fn fetch_with_retry(&self, endpoint: &str) -> Result<SerpResponse, ProviderError> {
        let attempts = self.resolved_retries().saturating_add(1);
        for attempt in 0..attempts {
            let err = match self.fetch_once(endpoint).await {
                Ok(payload) => return Ok(payload),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt + 1 == attempts {
                return Err(err);
            }
            let delay = self.retry_delay(attempt);
            log::warn!(
                "search attempt {}/{} failed ({}), retrying in {:?}",
                attempt + 1,
                attempts,
                err.kind(),
                delay
            );
            tokio::time::sleep(delay).await;
        }
        Err(ProviderError::transient("exhausted retries"))
    }

    async fn fetch_once(&self, endpoint: &str) -> Result<SerpResponse, ProviderError> {
        let response = self
            .transport
            .get(endpoint, self.resolved_timeout())
            .await
            .map_err(|e| classify_transport(&e))?;

        if let Some(err) = classify_status(response.status, &response.body) {
            return Err(err);
        }

        serde_json::from_str(&response.body)
            .map_err(|e| ProviderError::permanent(format!("decode serpapi response: {e}")))
    }
}

#[async_trait]
impl FlightProvider for SerpApiClient {
    fn name(&self) -> &'static str {
        PROVIDER_TAG
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::auth_required(
                "serpapi key missing: set FAREWATCH_SERPAPI_KEY or serp_api_key in config",
            ));
        }

        let payload = self.fetch_with_retry(&self.endpoint(query)).await?;

        let mut flights: Vec<Flight> = payload
            .best_flights
            .into_iter()
            .chain(payload.other_flights)
            .map(|raw| raw.into_flight(query))
            .filter(|f| query.max_price == 0 || f.price <= query.max_price)
            .collect();
        flights.sort_by_key(|f| f.price);

        let url = payload
            .search_metadata
            .google_flights_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| build_deep_link(query));

        log::debug!(
            "serpapi returned {} flights for {}->{} on {}",
            flights.len(),
            query.from,
            query.to,
            query.depart
        );

        Ok(SearchResult {
            query: query.clone(),
            flights,
            checked_at: Utc::now(),
            url,
        })
    }
}

// --- Wire format ---

#[derive(Debug, Default, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    best_flights: Vec<SerpFlight>,
    #[serde(default)]
    other_flights: Vec<SerpFlight>,
    #[serde(default)]
    search_metadata: SearchMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMetadata {
    #[serde(default)]
    google_flights_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpFlight {
    #[serde(default)]
    price: u32,
    #[serde(default)]
    airline_logo: String,
    #[serde(default)]
    flights: Vec<SerpLeg>,
    #[serde(default)]
    layovers: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SerpLeg {
    #[serde(default)]
    airline: String,
    #[serde(default)]
    flight_number: String,
    #[serde(default)]
    departure_airport: SerpAirport,
    #[serde(default)]
    arrival_airport: SerpAirport,
    #[serde(default)]
    duration: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SerpAirport {
    #[serde(default)]
    time: String,
}

impl SerpFlight {
    fn into_flight(self, query: &SearchQuery) -> Flight {
        let first = self.flights.first();
        let last = self.flights.last();

        let mut airline = first.map(|l| l.airline.clone()).unwrap_or_default();
        if airline.is_empty() {
            airline = self.airline_logo;
        }

        Flight {
            provider: PROVIDER_TAG.to_string(),
            airline,
            flight_number: first.map(|l| l.flight_number.clone()).unwrap_or_default(),
            from: query.from.clone(),
            to: query.to.clone(),
            depart_time: first.map(|l| l.departure_airport.time.clone()).unwrap_or_default(),
            arrive_time: last.map(|l| l.arrival_airport.time.clone()).unwrap_or_default(),
            duration: first
                .filter(|l| l.duration > 0)
                .map(|l| format!("{}m", l.duration))
                .unwrap_or_default(),
            stops: u32::try_from(self.layovers.len()).unwrap_or(u32::MAX),
            price: self.price,
            currency: query.currency_or_default().to_string(),
            deep_link: None,
        }
    }
}
