// src/models/mod.rs

//! Domain models for the fare watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod query;
mod watch;

// Re-export all public types
pub use config::{AuthStatus, Config, NotifyConfig, ProviderConfig, SmtpConfig};
pub use query::{Flight, SearchQuery, SearchResult};
pub use watch::{Alert, Watch, WatchStore};
