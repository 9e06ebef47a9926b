//! Error types for job submission and worker lifecycle.

use thiserror::Error;

/// Reasons a submission was not accepted.
///
/// None of these are failures of the job system itself: `AlreadyQueued` is a
/// dedup signal and `Backpressure` asks the caller to defer until a later frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The key already has a queued or running job.
    #[error("a job for this key is already queued or running")]
    AlreadyQueued,

    /// The queue holds at least `cap` waiting jobs.
    #[error("job queue is at its soft cap of {cap} waiting jobs")]
    Backpressure { cap: usize },

    /// The handler has been shut down.
    #[error("job handler has been shut down")]
    ShutDown,
}

/// Unrecoverable worker thread lifecycle failures.
#[derive(Error, Debug)]
pub enum JobError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread terminated by panicking outside a job.
    #[error("worker thread {name} panicked")]
    Join { name: String },
}
