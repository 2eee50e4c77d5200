//! Progress reporting for per-district loops.
//!
//! The engine reports through [`ProgressCallback`] so binaries can render
//! progress bars while tests and library callers pass [`NullProgress`].

/// Receives progress updates from long-running aggregation passes.
///
/// Implementations must be `Send + Sync` so a single reporter can be
/// shared across passes behind an `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Starts a per-district pass: sets the total and the message.
pub(crate) fn begin(progress: &dyn ProgressCallback, total: usize, msg: String) {
    progress.set_total(total as u64);
    progress.set_message(msg);
}
