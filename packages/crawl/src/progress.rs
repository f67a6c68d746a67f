//! Progress reporting for a crawl.
//!
//! [`ProgressCallback`] decouples the crawl loop from any rendering
//! backend. The CLI plugs in an `indicatif` bar; tests and library users
//! get [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a crawl.
///
/// Implementations must be `Send + Sync` because every spawned task holds
/// a shared reference.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of tasks.
    fn set_total(&self, total: u64);

    /// Advance by `delta` finished tasks.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the crawl as finished with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
