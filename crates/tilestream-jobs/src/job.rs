//! Job descriptors, lifecycle states and outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle state of a job.
///
/// Only `Queued` and `Running` jobs are tracked; a key whose job reached a
/// terminal state is free for resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Waiting in the queue for a worker.
    Queued,
    /// Being processed by a worker.
    Running,
    /// Finished, successfully or not.
    Completed,
    /// Abandoned before its payload could be used.
    Cancelled,
}

impl JobState {
    /// Returns true for `Completed` and `Cancelled`.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// What a call to `cancel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// No queued or running job exists for the key.
    Unknown,
    /// The job was still queued and has been dropped. No result will be produced.
    Removed,
    /// The job is running; its result will arrive marked `Cancelled`.
    Requested,
}

/// Cooperative cancellation flag shared between the owner and one job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One unit of submitted work. Immutable once queued.
#[derive(Debug)]
pub struct JobDescriptor<K, I> {
    key: K,
    epoch: u64,
    input: I,
}

impl<K: Copy, I> JobDescriptor<K, I> {
    pub(crate) const fn new(key: K, epoch: u64, input: I) -> Self {
        Self { key, epoch, input }
    }

    /// Key this job was submitted under.
    pub fn key(&self) -> K {
        self.key
    }

    /// Submission sequence number, unique per accepted submission.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Consume the descriptor, yielding its input.
    pub fn into_input(self) -> I {
        self.input
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome<T> {
    /// The processor produced a payload.
    Completed(T),
    /// The job was superseded; any payload was dropped.
    Cancelled,
    /// The processor returned an error or panicked.
    Failed(String),
}

impl<T> JobOutcome<T> {
    /// Terminal state corresponding to this outcome.
    pub const fn state(&self) -> JobState {
        match self {
            Self::Completed(_) | Self::Failed(_) => JobState::Completed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    /// Returns true if the job was cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Take the payload, if any.
    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Completed(payload) => Some(payload),
            Self::Cancelled | Self::Failed(_) => None,
        }
    }
}

/// Result of one job, delivered once to the owning thread.
#[derive(Debug)]
pub struct JobResult<K, T> {
    /// Key the job was submitted under.
    pub key: K,
    /// Epoch of the submission this result answers.
    pub epoch: u64,
    /// How the job ended.
    pub outcome: JobOutcome<T>,
}

impl<K, T> JobResult<K, T> {
    /// Terminal state of the job.
    pub const fn state(&self) -> JobState {
        self.outcome.state()
    }
}
