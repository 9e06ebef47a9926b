//! FIFO job queue with per-key state tracking.
//!
//! The queue and the state table live behind one lock so that the owning
//! thread and the workers always agree on whether a key is outstanding.
//! Cancelled queued jobs are not removed from the deque; their table entry is
//! dropped and workers skip descriptors whose epoch no longer matches.

use std::collections::VecDeque;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::SubmitError;
use crate::job::{CancelToken, Cancellation, JobDescriptor, JobOutcome, JobResult, JobState};
use crate::results::ResultSender;
use crate::JobKey;

/// Skipped descriptors tolerated before the deque is compacted.
const COMPACT_THRESHOLD: usize = 64;

/// Cumulative job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Submissions accepted.
    pub submitted: u64,
    /// Submissions refused with `AlreadyQueued` or `Backpressure`.
    pub rejected: u64,
    /// Jobs that produced a payload.
    pub completed: u64,
    /// Jobs whose processor failed or panicked.
    pub failed: u64,
    /// Jobs cancelled while queued, while running, or at shutdown.
    pub cancelled: u64,
}

impl JobStats {
    fn record<T>(&mut self, outcome: &JobOutcome<T>) {
        match outcome {
            JobOutcome::Completed(_) => self.completed += 1,
            JobOutcome::Failed(_) => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Tracking entry for an outstanding key.
#[derive(Debug)]
struct Entry {
    epoch: u64,
    state: JobState,
    cancel: CancelToken,
}

struct Inner<K, I> {
    pending: VecDeque<JobDescriptor<K, I>>,
    table: HashMap<K, Entry>,
    queued: usize,
    running: usize,
    next_epoch: u64,
    closed: bool,
    stats: JobStats,
}

impl<K: JobKey, I> Inner<K, I> {
    fn is_live(table: &HashMap<K, Entry>, desc: &JobDescriptor<K, I>) -> bool {
        table
            .get(&desc.key())
            .is_some_and(|e| e.epoch == desc.epoch() && e.state == JobState::Queued)
    }

    fn compact_if_needed(&mut self) {
        let stale = self.pending.len() - self.queued;
        if stale > COMPACT_THRESHOLD && stale > self.queued {
            let Self { pending, table, .. } = self;
            pending.retain(|d| Self::is_live(table, d));
            trace!(removed = stale, "compacted job queue");
        }
    }
}

/// A job that a worker has claimed.
#[derive(Debug)]
pub struct ActiveJob<K, I> {
    /// The claimed descriptor.
    pub descriptor: JobDescriptor<K, I>,
    /// Flag the owner sets to request cancellation.
    pub cancel: CancelToken,
}

/// Thread-safe FIFO of job descriptors plus the per-key state table.
pub struct JobQueue<K, I> {
    inner: Mutex<Inner<K, I>>,
    available: Condvar,
    soft_cap: usize,
}

impl<K: JobKey, I> JobQueue<K, I> {
    /// Create an empty queue with the given soft cap on waiting jobs.
    pub fn new(soft_cap: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                table: HashMap::new(),
                queued: 0,
                running: 0,
                next_epoch: 0,
                closed: false,
                stats: JobStats::default(),
            }),
            available: Condvar::new(),
            soft_cap,
        }
    }

    /// Queue a job for `key`. Never blocks on worker availability.
    ///
    /// Returns the epoch assigned to the submission.
    pub fn push(&self, key: K, input: I) -> Result<u64, SubmitError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SubmitError::ShutDown);
        }
        if inner.table.contains_key(&key) {
            inner.stats.rejected += 1;
            return Err(SubmitError::AlreadyQueued);
        }
        if inner.queued >= self.soft_cap {
            inner.stats.rejected += 1;
            return Err(SubmitError::Backpressure { cap: self.soft_cap });
        }

        let epoch = inner.next_epoch;
        inner.next_epoch += 1;
        inner.table.insert(
            key,
            Entry {
                epoch,
                state: JobState::Queued,
                cancel: CancelToken::new(),
            },
        );
        inner.pending.push_back(JobDescriptor::new(key, epoch, input));
        inner.queued += 1;
        inner.stats.submitted += 1;
        drop(inner);

        self.available.notify_one();
        Ok(epoch)
    }

    /// Cancel the outstanding job for `key`, if any.
    pub fn cancel(&self, key: &K) -> Cancellation {
        let mut inner = self.inner.lock();
        let Some(state) = inner.table.get(key).map(|e| e.state) else {
            return Cancellation::Unknown;
        };

        match state {
            JobState::Queued => {
                inner.table.remove(key);
                inner.queued -= 1;
                inner.stats.cancelled += 1;
                inner.compact_if_needed();
                Cancellation::Removed
            }
            JobState::Running => {
                if let Some(entry) = inner.table.get(key) {
                    entry.cancel.cancel();
                }
                Cancellation::Requested
            }
            JobState::Completed | JobState::Cancelled => Cancellation::Unknown,
        }
    }

    /// Claim the oldest live job, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn pop(&self) -> Option<ActiveJob<K, I>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }

            while let Some(descriptor) = inner.pending.pop_front() {
                let Some(entry) = inner
                    .table
                    .get_mut(&descriptor.key())
                    .filter(|e| e.epoch == descriptor.epoch() && e.state == JobState::Queued)
                else {
                    continue;
                };
                entry.state = JobState::Running;
                let cancel = entry.cancel.clone();
                inner.queued -= 1;
                inner.running += 1;
                return Some(ActiveJob { descriptor, cancel });
            }

            self.available.wait(&mut inner);
        }
    }

    /// Publish a finished job's result and release its key.
    ///
    /// The result is sent while the lock is held, so the key can never be
    /// resubmitted while an older result for it is still unpublished. A job
    /// whose token was set before the lock was taken is published as
    /// `Cancelled`, matching what `cancel` reported.
    pub fn complete<T>(&self, mut result: JobResult<K, T>, results: &ResultSender<K, T>) {
        let mut inner = self.inner.lock();
        let cancelled = inner
            .table
            .get(&result.key)
            .filter(|e| e.epoch == result.epoch)
            .map(|e| e.cancel.is_cancelled());
        let mut superseded = None;
        if let Some(cancelled) = cancelled {
            inner.table.remove(&result.key);
            inner.running -= 1;
            if cancelled {
                superseded = Some(std::mem::replace(&mut result.outcome, JobOutcome::Cancelled));
            }
        }
        inner.stats.record(&result.outcome);
        results.send(result);
        drop(inner);

        // The payload's destructor runs outside the lock.
        drop(superseded);
    }

    /// Stop dispatching. Wakes every blocked worker.
    ///
    /// Returns the descriptors that were still waiting; they will never run.
    /// Running jobs are unaffected and must still be completed.
    pub fn close(&self) -> Vec<JobDescriptor<K, I>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Vec::new();
        }
        inner.closed = true;

        let Inner {
            pending,
            table,
            queued,
            stats,
            ..
        } = &mut *inner;
        let abandoned: Vec<_> = pending
            .drain(..)
            .filter(|d| Inner::is_live(table, d))
            .collect();
        for desc in &abandoned {
            table.remove(&desc.key());
        }
        *queued = 0;
        stats.cancelled += abandoned.len() as u64;
        drop(inner);

        self.available.notify_all();
        abandoned
    }

    /// Current state of the job for `key`, if one is outstanding.
    pub fn state(&self, key: &K) -> Option<JobState> {
        self.inner.lock().table.get(key).map(|e| e.state)
    }

    /// Number of jobs waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.inner.lock().queued
    }

    /// Number of jobs being processed.
    pub fn running_count(&self) -> usize {
        self.inner.lock().running
    }

    /// Number of outstanding (queued or running) jobs.
    pub fn outstanding_count(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> JobStats {
        self.inner.lock().stats
    }

    #[cfg(test)]
    fn physical_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
