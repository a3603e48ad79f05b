//! Search criteria and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trip criteria for one search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Departure airport or city code
    pub from: String,

    /// Arrival airport or city code
    pub to: String,

    /// Outbound date, `YYYY-MM-DD`
    pub depart: String,

    /// Return date, `YYYY-MM-DD`; empty for one-way trips
    #[serde(rename = "return", default, skip_serializing_if = "String::is_empty")]
    pub return_date: String,

    /// Cabin class (e.g. `economy`, `business`)
    #[serde(default)]
    pub cabin: String,

    #[serde(default = "defaults::adults")]
    pub adults: u32,

    #[serde(default)]
    pub children: u32,

    /// Nonstop itineraries only
    #[serde(default)]
    pub nonstop: bool,

    /// Upper price bound in whole currency units; 0 means unbounded
    #[serde(default)]
    pub max_price: u32,

    #[serde(default = "defaults::currency")]
    pub currency: String,

    #[serde(default = "defaults::sort_by")]
    pub sort_by: String,
}

impl SearchQuery {
    /// Create a one-way query with default party, currency and sort.
    pub fn new(from: impl Into<String>, to: impl Into<String>, depart: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            depart: depart.into(),
            ..Self::default()
        }
    }

    /// Currency to report prices in, falling back to `USD`.
    pub fn currency_or_default(&self) -> &str {
        if self.currency.is_empty() {
            defaults::CURRENCY
        } else {
            &self.currency
        }
    }

    /// Check that the required trip fields are present.
    pub fn validate(&self) -> Result<(), String> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() || self.depart.trim().is_empty()
        {
            return Err("--from, --to, and --depart are required".to_string());
        }
        Ok(())
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            depart: String::new(),
            return_date: String::new(),
            cabin: String::new(),
            adults: defaults::adults(),
            children: 0,
            nonstop: false,
            max_price: 0,
            currency: defaults::currency(),
            sort_by: defaults::sort_by(),
        }
    }
}

/// One priced itinerary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub provider: String,
    pub airline: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flight_number: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub depart_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arrive_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    pub stops: u32,
    /// Whole currency units
    pub price: u32,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
}

/// Outcome of a successful search.
///
/// `flights` is ordered by ascending price and `url` is never empty once a
/// provider has returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: SearchQuery,
    pub flights: Vec<Flight>,
    pub checked_at: DateTime<Utc>,
    #[serde(rename = "google_flights_url")]
    pub url: String,
}

impl SearchResult {
    /// The cheapest flight, if any.
    pub fn cheapest(&self) -> Option<&Flight> {
        self.flights.first()
    }

    /// Price of the cheapest flight, or 0 when no offer was returned.
    pub fn lowest_price(&self) -> u32 {
        self.cheapest().map_or(0, |f| f.price)
    }
}

pub(crate) mod defaults {
    pub const CURRENCY: &str = "USD";

    pub fn adults() -> u32 {
        1
    }
    pub fn currency() -> String {
        CURRENCY.into()
    }
    pub fn sort_by() -> String {
        "price".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("SFO", "ATH", "2026-06-10");
        assert_eq!(query.adults, 1);
        assert_eq!(query.children, 0);
        assert_eq!(query.currency, "USD");
        assert_eq!(query.sort_by, "price");
        assert_eq!(query.max_price, 0);
    }

    #[test]
    fn test_query_deserialize_fills_defaults() {
        let query: SearchQuery =
            serde_json::from_str(r#"{"from":"SFO","to":"ATH","depart":"2026-06-10"}"#).unwrap();
        assert_eq!(query, SearchQuery::new("SFO", "ATH", "2026-06-10"));
    }

    #[test]
    fn test_query_validate() {
        assert!(SearchQuery::new("SFO", "ATH", "2026-06-10").validate().is_ok());
        assert!(SearchQuery::new("SFO", "", "2026-06-10").validate().is_err());
    }

    #[test]
    fn test_lowest_price_without_flights() {
        let result = SearchResult {
            query: SearchQuery::new("SFO", "ATH", "2026-06-10"),
            flights: Vec::new(),
            checked_at: Utc::now(),
            url: "https://www.google.com/travel/flights".into(),
        };
        assert_eq!(result.lowest_price(), 0);
        assert!(result.cheapest().is_none());
    }
}
