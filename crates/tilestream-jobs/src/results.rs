//! Many-producer, single-consumer handoff of finished jobs.

use crossbeam::channel::{self, Receiver, Sender};

use crate::job::JobResult;

/// Create a connected result sender/channel pair.
pub fn result_channel<K, T>() -> (ResultSender<K, T>, ResultChannel<K, T>) {
    let (tx, rx) = channel::unbounded();
    (ResultSender { tx }, ResultChannel { rx })
}

/// Worker-side handle for publishing results. Sending never blocks.
pub struct ResultSender<K, T> {
    tx: Sender<JobResult<K, T>>,
}

impl<K, T> Clone for ResultSender<K, T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K, T> ResultSender<K, T> {
    /// Publish a result. Returns false if the owning side is gone.
    pub fn send(&self, result: JobResult<K, T>) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Owner-side end of the result channel.
pub struct ResultChannel<K, T> {
    rx: Receiver<JobResult<K, T>>,
}

impl<K, T> ResultChannel<K, T> {
    /// Take every result that is ready. Never blocks; may be empty.
    pub fn drain(&self) -> Vec<JobResult<K, T>> {
        self.rx.try_iter().collect()
    }

    /// Take one ready result, if any.
    pub fn try_recv(&self) -> Option<JobResult<K, T>> {
        self.rx.try_recv().ok()
    }

    /// Number of results waiting to be drained.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if no results are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
