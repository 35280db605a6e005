//! Progress reporting for multi-season runs.
//!
//! A batch run retrieves one season after another, each in its own session.
//! Callers report through [`ProgressCallback`] so the library stays
//! independent of how (or whether) progress is rendered.

use std::sync::Arc;

/// Receives progress updates from a batch run.
pub trait ProgressCallback: Send + Sync {
    /// Total number of units (seasons) in the batch.
    fn set_total(&self, total: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Describes the unit currently in progress.
    fn set_message(&self, msg: String);

    /// Marks the batch complete with a summary message.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
