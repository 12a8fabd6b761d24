//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ImportConfigBuilder::progress_callback`] to receive
//! events as the batch orchestrator works through its URL list.
//!
//! # Example
//!
//! ```rust
//! use url2vault::{BatchProgressCallback, ImportConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_error(&self, index: usize, total: usize, url: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {url}: {error}", index + 1, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     failed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ImportConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchResult;
use std::sync::Arc;

/// Called by the batch orchestrator as it processes each URL.
///
/// Items are processed one at a time, so calls never overlap, but the trait
/// is `Send + Sync` so implementations can be shared with other tasks. All
/// methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before an item's pipeline runs.
    ///
    /// # Arguments
    /// * `index`: 0-indexed position in the input list
    /// * `total`: number of entries in the input list
    fn on_item_start(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called when an item was imported successfully.
    fn on_item_complete(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called when an item failed; `error` is the recorded message.
    fn on_item_error(&self, index: usize, total: usize, url: &str, error: &str) {
        let _ = (index, total, url, error);
    }

    /// Called once after the loop, including when stop-on-error ended it early.
    fn on_batch_complete(&self, result: &BatchResult) {
        let _ = result;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ImportConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
