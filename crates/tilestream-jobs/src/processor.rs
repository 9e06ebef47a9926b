//! The processing capability plugged into a job handler.

use std::fmt::Display;

use crate::job::CancelToken;

/// Turns one job's input into its output on a worker thread.
///
/// Implementations receive only the job's own input; they must not reach into
/// state owned by the submitting thread. Long-running processors should poll
/// `cancel` at safe checkpoints and return early once it is set. Whatever
/// they return after that point is discarded and the job is reported as
/// cancelled.
pub trait Processor: Send + Sync + 'static {
    /// Immutable per-job input snapshot.
    type Input: Send + 'static;
    /// Finished payload handed back to the owning thread.
    type Output: Send + 'static;
    /// Processing failure, reported as [`JobOutcome::Failed`](crate::JobOutcome::Failed).
    type Error: Display;

    /// Process one job.
    fn process(&self, input: Self::Input, cancel: &CancelToken)
        -> Result<Self::Output, Self::Error>;
}
