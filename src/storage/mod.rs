//! Storage abstractions for the watch list.
//!
//! A watch pass never touches storage itself; the caller loads the list,
//! runs the pass over it and saves it once afterwards.
//!
//! ## Layout
//!
//! ```text
//! {state_dir}/
//! └── watches.json          # {"watches": [...]}
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WatchStore;

pub use local::LocalStorage;

/// File name of the watch list inside the state directory.
pub const WATCHES_FILE: &str = "watches.json";

/// Trait for watch list backends.
#[async_trait]
pub trait WatchStorage: Send + Sync {
    /// Load the watch list; a store that was never written is empty.
    async fn load(&self) -> Result<WatchStore>;

    /// Replace the stored watch list.
    async fn save(&self, store: &WatchStore) -> Result<()>;
}
