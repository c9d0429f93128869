//! Progress reporting for page-by-page fetches.
//!
//! Fetchers report through [`ProgressCallback`] so they stay independent of
//! how progress is shown. The CLI plugs in an `indicatif` bar; tests use
//! [`NullProgress`].

use std::sync::Arc;

/// Receives progress from a running fetch.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work, once known.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Discards all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
