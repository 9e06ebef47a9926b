//! Fixed-size pool of worker threads.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::config::JobConfig;
use crate::error::JobError;
use crate::job::{CancelToken, JobOutcome, JobResult};
use crate::processor::Processor;
use crate::queue::{ActiveJob, JobQueue};
use crate::results::ResultSender;
use crate::JobKey;

/// Handles to the worker threads serving one job queue.
///
/// The pool does not stop itself; close the queue, then [`join`](Self::join).
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.worker_count` workers draining `queue`.
    ///
    /// If any spawn fails, the queue is closed and the workers already
    /// started are joined before the error is returned.
    pub fn spawn<K, P>(
        config: &JobConfig,
        processor: &Arc<P>,
        queue: &Arc<JobQueue<K, P::Input>>,
        results: &ResultSender<K, P::Output>,
    ) -> Result<Self, JobError>
    where
        K: JobKey,
        P: Processor,
    {
        let mut pool = Self {
            workers: Vec::with_capacity(config.worker_count),
        };

        for index in 0..config.worker_count {
            let processor = Arc::clone(processor);
            let queue_ref = Arc::clone(queue);
            let results = results.clone();

            let mut builder =
                thread::Builder::new().name(format!("{}-{index}", config.thread_name));
            if let Some(size) = config.stack_size {
                builder = builder.stack_size(size);
            }
            let spawned = builder.spawn(move || worker_loop(&*processor, &queue_ref, &results));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    error!(index, "failed to spawn worker thread: {source}");
                    queue.close();
                    // Already failing; a join error here would only mask the spawn error.
                    let _ = pool.join();
                    return Err(JobError::Spawn { index, source });
                }
            }
        }

        debug!(workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    /// Number of live worker threads.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Check if the pool has no worker threads.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit.
    ///
    /// All threads are joined even if some panicked; the first panic is reported.
    pub fn join(&mut self) -> Result<(), JobError> {
        let mut first_error = None;
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "worker thread panicked");
                first_error.get_or_insert(JobError::Join { name });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    #[cfg(test)]
    pub(crate) fn adopt(&mut self, handle: JoinHandle<()>) {
        self.workers.push(handle);
    }
}

/// Worker thread body: claim, process, publish, repeat until the queue closes.
fn worker_loop<K, P>(
    processor: &P,
    queue: &JobQueue<K, P::Input>,
    results: &ResultSender<K, P::Output>,
) where
    K: JobKey,
    P: Processor,
{
    debug!("worker started");

    while let Some(ActiveJob { descriptor, cancel }) = queue.pop() {
        let key = descriptor.key();
        let epoch = descriptor.epoch();
        let outcome = run_job(processor, key, descriptor.into_input(), &cancel);
        queue.complete(JobResult { key, epoch, outcome }, results);
    }

    debug!("worker exiting");
}

/// Run the processor on one job, containing errors and panics.
///
/// Formatting the error and dropping a superseded payload run user code too,
/// so they stay inside the unwind guard.
fn run_job<K, P>(
    processor: &P,
    key: K,
    input: P::Input,
    cancel: &CancelToken,
) -> JobOutcome<P::Output>
where
    K: JobKey,
    P: Processor,
{
    if cancel.is_cancelled() {
        return JobOutcome::Cancelled;
    }

    let guarded = panic::catch_unwind(AssertUnwindSafe(|| {
        let result = processor.process(input, cancel);

        // A job cancelled while running is reported as cancelled whatever it returned.
        if cancel.is_cancelled() {
            drop(result);
            debug!(?key, "job cancelled while running");
            return JobOutcome::Cancelled;
        }

        match result {
            Ok(payload) => JobOutcome::Completed(payload),
            Err(err) => {
                let reason = err.to_string();
                warn!(?key, %reason, "job failed");
                JobOutcome::Failed(reason)
            }
        }
    }));

    guarded.unwrap_or_else(|payload| {
        let reason = format!("processor panicked: {}", panic_message(payload.as_ref()));
        error!(?key, %reason, "job panicked");
        JobOutcome::Failed(reason)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmitError;
    use crate::results::result_channel;
    use std::fmt;

    struct Loud;

    impl fmt::Display for Loud {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("display blew up")
        }
    }

    /// Fails with an error whose `Display` panics.
    struct LoudFailure;

    impl Processor for LoudFailure {
        type Input = u32;
        type Output = u32;
        type Error = Loud;

        fn process(&self, _input: u32, _cancel: &CancelToken) -> Result<u32, Loud> {
            Err(Loud)
        }
    }

    #[test]
    fn panicking_error_formatting_is_contained() {
        let outcome = run_job(&LoudFailure, 1u32, 0, &CancelToken::new());
        assert!(matches!(outcome, JobOutcome::Failed(r) if r.contains("display blew up")));
    }

    #[test]
    fn pre_cancelled_job_skips_processor() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = run_job(&LoudFailure, 1u32, 0, &cancel);
        assert!(matches!(outcome, JobOutcome::Cancelled));
    }

    #[test]
    fn join_reports_panicked_thread_after_joining_all() {
        let mut pool = WorkerPool { workers: Vec::new() };
        let healthy = thread::Builder::new()
            .name("healthy".into())
            .spawn(|| {})
            .unwrap();
        let broken = thread::Builder::new()
            .name("broken".into())
            .spawn(|| panic!("worker died"))
            .unwrap();
        pool.adopt(healthy);
        pool.adopt(broken);

        match pool.join() {
            Err(JobError::Join { name }) => assert_eq!(name, "broken"),
            other => panic!("expected join error, got {other:?}"),
        }
        assert!(pool.is_empty());
        assert!(pool.join().is_ok());
    }

    #[test]
    fn failed_spawn_closes_queue() {
        let config = JobConfig::default()
            .with_workers(2)
            .with_stack_size(usize::MAX / 2);
        let queue = Arc::new(JobQueue::<u32, u32>::new(4));
        let (tx, _rx) = result_channel();

        let spawned = WorkerPool::spawn(&config, &Arc::new(LoudFailure), &queue, &tx);
        assert!(matches!(spawned, Err(JobError::Spawn { index: 0, .. })));
        assert_eq!(queue.push(1, 1), Err(SubmitError::ShutDown));
    }
}
