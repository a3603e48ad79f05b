//! Canonical public search links.
//!
//! [`build_deep_link`] is pure: the same query always yields the same URL,
//! with parameters emitted in sorted key order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use url::form_urlencoded;

use super::{FlightProvider, ProviderError};
use crate::models::{SearchQuery, SearchResult};

const SEARCH_PAGE: &str = "https://www.google.com/travel/flights";

/// Cabin class the search page assumes when none is given.
const DEFAULT_CABIN: &str = "economy";

/// Build the public search-page link for a query.
///
/// Optional fields only appear when set: return date when present, stop
/// filter when nonstop is requested, cabin and party size when they differ
/// from the defaults.
pub fn build_deep_link(query: &SearchQuery) -> String {
    let mut params: BTreeMap<&str, String> = BTreeMap::new();
    params.insert("f", query.from.clone());
    params.insert("t", query.to.clone());
    params.insert("d", query.depart.clone());
    if !query.return_date.is_empty() {
        params.insert("r", query.return_date.clone());
    }
    if query.nonstop {
        params.insert("sc", "1".into());
    }
    if !query.cabin.is_empty() && !query.cabin.eq_ignore_ascii_case(DEFAULT_CABIN) {
        params.insert("c", query.cabin.clone());
    }
    if query.adults > 1 {
        params.insert("ad", query.adults.to_string());
    }
    if query.children > 0 {
        params.insert("ch", query.children.to_string());
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    format!("{SEARCH_PAGE}?{encoded}")
}

/// Zero-network provider: no prices, only the search-page link.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlOnlyProvider;

#[async_trait]
impl FlightProvider for UrlOnlyProvider {
    fn name(&self) -> &'static str {
        "google-url"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ProviderError> {
        Ok(SearchResult {
            query: query.clone(),
            flights: Vec::new(),
            checked_at: Utc::now(),
            url: build_deep_link(query),
        })
    }
}
