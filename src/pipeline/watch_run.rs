// src/pipeline/watch_run.rs

//! One evaluation pass over the watch list.
//!
//! Watches are processed in list order, one at a time: search, evaluate,
//! notify. A failed search or a failed delivery is counted and the pass
//! moves on to the next watch.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evaluate::evaluate_watch;
use super::health::PassHealth;
use crate::models::{Alert, Watch};
use crate::notify::{NotifyChannels, dispatch_alert};
use crate::provider::FlightProvider;

/// Which watches a pass runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSelector {
    AllEnabled,
    Id(String),
}

impl WatchSelector {
    /// Disabled watches are never selected, even by id.
    pub fn selects(&self, watch: &Watch) -> bool {
        if !watch.enabled {
            return false;
        }
        match self {
            Self::AllEnabled => true,
            Self::Id(id) => watch.id == *id,
        }
    }
}

/// Counts and alerts from one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchRunReport {
    pub evaluated: usize,
    pub triggered: usize,
    pub provider_failures: usize,
    pub notify_failures: usize,
    pub alerts: Vec<Alert>,
}

impl WatchRunReport {
    pub fn health(&self) -> PassHealth {
        PassHealth::from_counts(self.evaluated, self.provider_failures)
    }

    /// `Watch run summary: evaluated=.. triggered=.. ...`
    pub fn summary_line(&self) -> String {
        format!(
            "Watch run summary: evaluated={} triggered={} provider_failures={} notify_failures={}",
            self.evaluated, self.triggered, self.provider_failures, self.notify_failures
        )
    }
}

/// Report plus the text of each failed dispatch.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    pub report: WatchRunReport,
    pub notify_errors: Vec<String>,
}

/// Runs a pass against a provider and a set of notification channels.
pub struct WatchPassRunner<'a> {
    provider: &'a dyn FlightProvider,
    channels: &'a dyn NotifyChannels,
    verbose: bool,
    diagnostics: Option<&'a mut (dyn Write + Send)>,
}

impl<'a> WatchPassRunner<'a> {
    pub fn new(provider: &'a dyn FlightProvider, channels: &'a dyn NotifyChannels) -> Self {
        Self {
            provider,
            channels,
            verbose: false,
            diagnostics: None,
        }
    }

    /// Write a line per failed search to the diagnostic sink.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn diagnostics(mut self, sink: &'a mut (dyn Write + Send)) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Run one pass, mutating the evaluated watches in place.
    ///
    /// Persisting the updated watches is left to the caller.
    pub async fn run(
        &mut self,
        watches: &mut [Watch],
        selector: &WatchSelector,
        now: DateTime<Utc>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();

        for watch in watches.iter_mut() {
            if !selector.selects(watch) {
                continue;
            }
            outcome.report.evaluated += 1;

            let result = match self.provider.search(&watch.query).await {
                Ok(result) => result,
                Err(err) => {
                    outcome.report.provider_failures += 1;
                    log::warn!("watch {} search failed: {}", watch.id, err);
                    self.diagnose(format_args!("watch {} failed: {}", watch.id, err));
                    continue;
                }
            };

            let Some(alert) = evaluate_watch(watch, &result, now) else {
                log::debug!(
                    "watch {} quiet at {}",
                    watch.id,
                    watch.last_lowest_price
                );
                continue;
            };

            outcome.report.triggered += 1;
            log::info!("watch {} triggered: {}", watch.id, alert.reason);

            if let Err(err) = dispatch_alert(self.channels, watch, &alert).await {
                outcome.report.notify_failures += 1;
                outcome.notify_errors.push(err.to_string());
            }
            outcome.report.alerts.push(alert);
        }

        log::info!(
            "watch pass done: evaluated={} triggered={} provider_failures={} notify_failures={}",
            outcome.report.evaluated,
            outcome.report.triggered,
            outcome.report.provider_failures,
            outcome.report.notify_failures
        );
        outcome
    }

    fn diagnose(&mut self, line: std::fmt::Arguments<'_>) {
        if !self.verbose {
            return;
        }
        if let Some(sink) = self.diagnostics.as_deref_mut() {
            let _ = writeln!(sink, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::models::{Flight, SearchQuery, SearchResult};
    use crate::notify::testing::RecordingChannels;
    use crate::pipeline::health::ExitPolicy;
    use crate::provider::{ProviderError, build_deep_link};

    /// Price per destination; unknown destinations fail transiently.
    struct PricedProvider {
        prices: HashMap<&'static str, u32>,
    }

    impl PricedProvider {
        fn new(prices: &[(&'static str, u32)]) -> Self {
            Self {
                prices: prices.iter().copied().collect(),
            }
        }
    }

    #[async_trait]
    impl FlightProvider for PricedProvider {
        fn name(&self) -> &'static str {
            "priced"
        }

        async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ProviderError> {
            let price = self
                .prices
                .get(query.to.as_str())
                .copied()
                .ok_or_else(|| ProviderError::transient("connection reset"))?;
            Ok(SearchResult {
                query: query.clone(),
                flights: vec![Flight {
                    price,
                    currency: "USD".into(),
                    ..Flight::default()
                }],
                checked_at: now(),
                url: build_deep_link(query),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn watch(id: &str, to: &str, target: u32) -> Watch {
        let mut w = Watch::new(id, id, SearchQuery::new("SFO", to, "2026-06-10"));
        w.target_price = target;
        w
    }

    #[tokio::test]
    async fn test_all_searches_fail() {
        let provider = PricedProvider::new(&[]);
        let channels = RecordingChannels::default();
        let mut watches = vec![watch("a", "ATH", 700), watch("b", "LIS", 700)];
        let mut diag = Vec::new();

        let outcome = WatchPassRunner::new(&provider, &channels)
            .verbose(true)
            .diagnostics(&mut diag)
            .run(&mut watches, &WatchSelector::AllEnabled, now())
            .await;

        assert_eq!(outcome.report.evaluated, 2);
        assert_eq!(outcome.report.provider_failures, 2);
        assert_eq!(outcome.report.triggered, 0);
        assert_eq!(outcome.report.health(), PassHealth::Outage { evaluated: 2 });
        assert!(ExitPolicy::Lenient.is_fatal(outcome.report.health()));
        assert!(watches.iter().all(|w| w.last_run_at.is_none()));

        let diag = String::from_utf8(diag).unwrap();
        assert!(diag.contains("watch a failed: transient provider failure: connection reset"));
        assert!(diag.contains("watch b failed"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_going() {
        let provider = PricedProvider::new(&[("LIS", 500), ("ATH", 650)]);
        let channels = RecordingChannels::default();
        let mut watches = vec![
            watch("a", "ATH", 700),
            watch("b", "NRT", 700),
            watch("c", "LIS", 400),
        ];

        let outcome = WatchPassRunner::new(&provider, &channels)
            .run(&mut watches, &WatchSelector::AllEnabled, now())
            .await;

        let report = &outcome.report;
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.provider_failures, 1);
        assert_eq!(report.triggered, 1);
        assert_eq!(report.alerts[0].watch_id, "a");
        assert!(matches!(report.health(), PassHealth::Degraded { .. }));
        assert!(!ExitPolicy::Lenient.is_fatal(report.health()));
        assert!(ExitPolicy::Strict.is_fatal(report.health()));
        assert_eq!(watches[2].last_lowest_price, 500);
        assert_eq!(watches[1].last_lowest_price, 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_counts_trigger() {
        let provider = PricedProvider::new(&[("ATH", 650)]);
        let channels = RecordingChannels {
            fail_webhook: true,
            ..Default::default()
        };
        let mut w = watch("a", "ATH", 700);
        w.notify_webhook = true;
        let mut watches = vec![w];

        let outcome = WatchPassRunner::new(&provider, &channels)
            .run(&mut watches, &WatchSelector::AllEnabled, now())
            .await;

        assert_eq!(outcome.report.triggered, 1);
        assert_eq!(outcome.report.notify_failures, 1);
        assert_eq!(outcome.report.alerts.len(), 1);
        assert_eq!(outcome.notify_errors, vec!["watch a webhook failed: missing webhook url"]);
    }

    #[tokio::test]
    async fn test_disabled_watches_are_skipped() {
        let provider = PricedProvider::new(&[("ATH", 650)]);
        let channels = RecordingChannels::default();
        let mut off = watch("a", "ATH", 700);
        off.enabled = false;
        let mut watches = vec![off];

        let outcome = WatchPassRunner::new(&provider, &channels)
            .run(&mut watches, &WatchSelector::Id("a".into()), now())
            .await;

        assert_eq!(outcome.report, WatchRunReport::default());
        assert_eq!(outcome.report.health(), PassHealth::Clean);
        assert!(watches[0].last_run_at.is_none());
    }

    #[tokio::test]
    async fn test_select_by_id() {
        let provider = PricedProvider::new(&[("ATH", 650), ("LIS", 300)]);
        let channels = RecordingChannels::default();
        let mut watches = vec![watch("a", "ATH", 700), watch("b", "LIS", 700)];

        let outcome = WatchPassRunner::new(&provider, &channels)
            .run(&mut watches, &WatchSelector::Id("b".into()), now())
            .await;

        assert_eq!(outcome.report.evaluated, 1);
        assert_eq!(outcome.report.alerts[0].watch_id, "b");
        assert!(watches[0].last_run_at.is_none());
        assert_eq!(watches[1].last_run_at, Some(now()));
    }

    #[test]
    fn test_summary_line_and_json() {
        let report = WatchRunReport {
            evaluated: 3,
            triggered: 1,
            provider_failures: 1,
            notify_failures: 0,
            alerts: Vec::new(),
        };
        assert_eq!(
            report.summary_line(),
            "Watch run summary: evaluated=3 triggered=1 provider_failures=1 notify_failures=0"
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["provider_failures"], 1);
        assert!(json["alerts"].as_array().unwrap().is_empty());
    }
}
