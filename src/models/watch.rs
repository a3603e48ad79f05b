//! Watch records and the alerts they raise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SearchQuery;

/// A saved price watch.
///
/// Only `last_lowest_price`, `last_run_at` and `updated_at` are changed by a
/// watch pass; everything else belongs to whoever manages the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub id: String,
    pub name: String,
    pub query: SearchQuery,
    #[serde(default)]
    pub enabled: bool,

    /// Alert when the lowest price is at or below this value; 0 disables it
    #[serde(default)]
    pub target_price: u32,

    #[serde(default)]
    pub notify_terminal: bool,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub notify_webhook: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub webhook_url: String,

    /// Lowest price seen on the previous pass; 0 when unknown
    #[serde(default)]
    pub last_lowest_price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Watch {
    /// Create an enabled watch with terminal notifications on.
    pub fn new(id: impl Into<String>, name: impl Into<String>, query: SearchQuery) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            query,
            enabled: true,
            target_price: 0,
            notify_terminal: true,
            notify_email: false,
            notify_webhook: false,
            email_to: String::new(),
            webhook_url: String::new(),
            last_lowest_price: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Default display name: `FROM-TO-DEPART`.
    pub fn default_name(query: &SearchQuery) -> String {
        format!("{}-{}-{}", query.from, query.to, query.depart)
    }

    /// Generate a fresh watch id from the current time.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros() * 1_000);
        format!("w_{nanos}")
    }
}

/// The persisted watch list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStore {
    #[serde(default)]
    pub watches: Vec<Watch>,
}

impl WatchStore {
    pub fn find(&self, id: &str) -> Option<&Watch> {
        self.watches.iter().find(|w| w.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Watch> {
        self.watches.iter_mut().find(|w| w.id == id)
    }

    /// Remove a watch by id, returning it if it existed.
    pub fn remove(&mut self, id: &str) -> Option<Watch> {
        let index = self.watches.iter().position(|w| w.id == id)?;
        Some(self.watches.remove(index))
    }
}

/// A raised price alert. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub watch_id: String,
    pub watch_name: String,
    pub triggered_at: DateTime<Utc>,
    pub reason: String,
    pub lowest_price: u32,
    pub currency: String,
    #[serde(rename = "google_flights_url")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_find_and_remove() {
        let mut store = WatchStore::default();
        store.watches.push(Watch::new("w_1", "a", SearchQuery::new("SFO", "ATH", "2026-06-10")));
        store.watches.push(Watch::new("w_2", "b", SearchQuery::new("LAX", "JFK", "2026-07-01")));

        assert_eq!(store.find("w_2").map(|w| w.name.as_str()), Some("b"));
        assert!(store.remove("w_1").is_some());
        assert!(store.remove("w_1").is_none());
        assert_eq!(store.watches.len(), 1);
    }

    #[test]
    fn test_watch_json_field_names() {
        let watch = Watch::new("w_1", "trip", SearchQuery::new("SFO", "ATH", "2026-06-10"));
        let json = serde_json::to_value(&watch).unwrap();
        assert_eq!(json["last_lowest_price"], 0);
        assert_eq!(json["notify_terminal"], true);
        assert!(json.get("last_run_at").is_none());
    }

    #[test]
    fn test_record_without_enabled_loads_disabled() {
        let json = r#"{"watches": [{
            "id": "w_1",
            "name": "trip",
            "query": {"from": "SFO", "to": "ATH", "depart": "2026-06-10"},
            "created_at": "2026-05-01T08:00:00Z",
            "updated_at": "2026-05-01T08:00:00Z"
        }]}"#;
        let store: WatchStore = serde_json::from_str(json).unwrap();
        assert_eq!(store.watches.len(), 1);
        assert!(!store.watches[0].enabled);
    }

    #[test]
    fn test_default_name() {
        let query = SearchQuery::new("SFO", "ATH", "2026-06-10");
        assert_eq!(Watch::default_name(&query), "SFO-ATH-2026-06-10");
    }
}
