// src/pipeline/evaluate.rs

//! Trigger evaluation for a single watch.
//!
//! Precedence, first match wins:
//!
//! 1. target set, offer found, lowest at or below target
//! 2. previous price known, offer found, lowest below previous
//!
//! A result without flights is a "no offer" pass and never triggers.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{Alert, SearchResult, Watch};

/// Why a watch fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    TargetReached { target: u32 },
    PriceDropped { from: u32, to: u32 },
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached { target } => write!(f, "price reached target ≤ {target}"),
            Self::PriceDropped { from, to } => write!(f, "price dropped from {from} to {to}"),
        }
    }
}

/// Decide whether `lowest` fires for `watch`, without touching it.
pub fn trigger_reason(watch: &Watch, lowest: u32) -> Option<TriggerReason> {
    if lowest == 0 {
        return None;
    }
    if watch.target_price > 0 && lowest <= watch.target_price {
        return Some(TriggerReason::TargetReached {
            target: watch.target_price,
        });
    }
    if watch.last_lowest_price > 0 && lowest < watch.last_lowest_price {
        return Some(TriggerReason::PriceDropped {
            from: watch.last_lowest_price,
            to: lowest,
        });
    }
    None
}

/// Evaluate a fresh result against `watch` and record the observation.
///
/// `last_run_at` and `updated_at` are always set to `now`.
/// `last_lowest_price` only moves when an offer was found, so an empty pass
/// keeps the known floor.
pub fn evaluate_watch(watch: &mut Watch, result: &SearchResult, now: DateTime<Utc>) -> Option<Alert> {
    let lowest = result.lowest_price();
    let currency = result
        .flights
        .first()
        .map(|f| f.currency.clone())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| watch.query.currency_or_default().to_string());

    let reason = trigger_reason(watch, lowest);

    watch.last_run_at = Some(now);
    watch.updated_at = now;
    if lowest > 0 {
        watch.last_lowest_price = lowest;
    }

    reason.map(|reason| Alert {
        watch_id: watch.id.clone(),
        watch_name: watch.name.clone(),
        triggered_at: now,
        reason: reason.to_string(),
        lowest_price: lowest,
        currency,
        url: result.url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{Flight, SearchQuery};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn watch() -> Watch {
        Watch::new("w_1", "Athens", SearchQuery::new("SFO", "ATH", "2026-06-10"))
    }

    fn result_with(prices: &[u32]) -> SearchResult {
        let query = SearchQuery::new("SFO", "ATH", "2026-06-10");
        let flights = prices
            .iter()
            .map(|&price| Flight {
                price,
                currency: "USD".into(),
                airline: "Test Air".into(),
                ..Flight::default()
            })
            .collect();
        SearchResult {
            query,
            flights,
            checked_at: now(),
            url: "https://www.google.com/travel/flights?d=2026-06-10&f=SFO&t=ATH".into(),
        }
    }

    #[test]
    fn test_target_reached() {
        let mut w = watch();
        w.target_price = 700;

        let alert = evaluate_watch(&mut w, &result_with(&[650, 720]), now()).unwrap();

        assert!(alert.reason.contains("target"));
        assert_eq!(alert.reason, "price reached target ≤ 700");
        assert_eq!(alert.lowest_price, 650);
        assert_eq!(alert.currency, "USD");
        assert_eq!(w.last_lowest_price, 650);
        assert_eq!(w.last_run_at, Some(now()));
    }

    #[test]
    fn test_price_dropped() {
        let mut w = watch();
        w.last_lowest_price = 900;
        w.target_price = 500;

        let alert = evaluate_watch(&mut w, &result_with(&[800]), now()).unwrap();

        assert!(alert.reason.contains("dropped"));
        assert_eq!(alert.reason, "price dropped from 900 to 800");
        assert_eq!(w.last_lowest_price, 800);
    }

    #[test]
    fn test_target_wins_over_drop() {
        let mut w = watch();
        w.target_price = 700;
        w.last_lowest_price = 900;

        let alert = evaluate_watch(&mut w, &result_with(&[650]), now()).unwrap();
        assert!(alert.reason.contains("target"));
    }

    #[test]
    fn test_no_offer_keeps_floor() {
        let mut w = watch();
        w.target_price = 700;
        w.last_lowest_price = 900;

        assert!(evaluate_watch(&mut w, &result_with(&[]), now()).is_none());
        assert_eq!(w.last_lowest_price, 900);
        assert_eq!(w.last_run_at, Some(now()));
        assert_eq!(w.updated_at, now());
    }

    #[test]
    fn test_unchanged_or_higher_price_is_quiet() {
        let mut w = watch();
        w.last_lowest_price = 800;

        assert!(evaluate_watch(&mut w, &result_with(&[800]), now()).is_none());
        assert!(evaluate_watch(&mut w, &result_with(&[850]), now()).is_none());
        assert_eq!(w.last_lowest_price, 850);
    }

    #[test]
    fn test_currency_falls_back_to_query() {
        let mut w = watch();
        w.target_price = 700;
        let mut result = result_with(&[650]);
        result.flights[0].currency.clear();
        result.query.currency = "EUR".into();
        w.query.currency = "EUR".into();

        let alert = evaluate_watch(&mut w, &result, now()).unwrap();
        assert_eq!(alert.currency, "EUR");
    }

    // Target-reached is stateless across passes: it fires again while the
    // price stays at or under target. Kept deliberately; see DESIGN.md.
    #[test]
    fn test_target_reached_refires_every_pass() {
        let mut w = watch();
        w.target_price = 700;

        let first = evaluate_watch(&mut w, &result_with(&[650]), now());
        let second = evaluate_watch(&mut w, &result_with(&[650]), now());

        assert_eq!(
            first.map(|a| a.reason),
            Some("price reached target ≤ 700".to_string())
        );
        assert_eq!(
            second.map(|a| a.reason),
            Some("price reached target ≤ 700".to_string())
        );
    }
}
