//! Generic asynchronous job handler.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::JobConfig;
use crate::error::{JobError, SubmitError};
use crate::job::{Cancellation, JobOutcome, JobResult, JobState};
use crate::pool::WorkerPool;
use crate::processor::Processor;
use crate::queue::{JobQueue, JobStats};
use crate::results::{result_channel, ResultChannel};
use crate::JobKey;

/// Runs a [`Processor`] over keyed jobs on a fixed pool of worker threads.
///
/// All methods are meant to be called from the single owning thread. Jobs are
/// dispatched in submission order; results come back in completion order
/// through [`drain`](Self::drain), which never blocks.
///
/// Cancelling a queued job removes it silently. Cancelling a running job lets
/// it finish and delivers its result as [`JobOutcome::Cancelled`].
pub struct AsyncJobHandler<K: JobKey, P: Processor> {
    queue: Arc<JobQueue<K, P::Input>>,
    results: ResultChannel<K, P::Output>,
    pool: WorkerPool,
    config: JobConfig,
    shut_down: bool,
    /// Results collected by a shutdown that reported a join error.
    leftover: Vec<JobResult<K, P::Output>>,
}

impl<K: JobKey, P: Processor> AsyncJobHandler<K, P> {
    /// Create a handler and start its worker threads.
    pub fn new(processor: P, config: JobConfig) -> Result<Self, JobError> {
        let processor = Arc::new(processor);
        let queue = Arc::new(JobQueue::new(config.queue_soft_cap));
        let (sender, results) = result_channel();

        // Workers hold the only senders, so the channel disconnects once they exit.
        let pool = WorkerPool::spawn(&config, &processor, &queue, &sender)?;
        drop(sender);

        info!(
            workers = config.worker_count,
            soft_cap = config.queue_soft_cap,
            "job handler started"
        );

        Ok(Self {
            queue,
            results,
            pool,
            config,
            shut_down: false,
            leftover: Vec::new(),
        })
    }

    /// Queue a job for `key`.
    ///
    /// Fails with `AlreadyQueued` if `key` has a queued or running job and with
    /// `Backpressure` if the queue is at its soft cap; defer either until a
    /// later frame rather than retrying in a loop.
    pub fn submit(&self, key: K, input: P::Input) -> Result<(), SubmitError> {
        match self.queue.push(key, input) {
            Ok(epoch) => {
                debug!(?key, epoch, "job submitted");
                Ok(())
            }
            Err(err) => {
                debug!(?key, %err, "job not submitted");
                Err(err)
            }
        }
    }

    /// Cancel the outstanding job for `key`. No-op if there is none.
    pub fn cancel(&self, key: &K) -> Cancellation {
        let cancellation = self.queue.cancel(key);
        if cancellation != Cancellation::Unknown {
            debug!(?key, ?cancellation, "job cancelled");
        }
        cancellation
    }

    /// Take every finished result. Never blocks; may be empty.
    pub fn drain(&self) -> Vec<JobResult<K, P::Output>> {
        self.results.drain()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Jobs already running finish normally. Returns every result not yet
    /// drained, plus a `Cancelled` result for each job that was still queued.
    /// Afterwards `drain` stays empty and `submit` fails with `ShutDown`.
    /// Calling this again returns an empty list.
    ///
    /// If a worker thread panicked, the join error is returned and the
    /// collected results are held back for the next call.
    pub fn shutdown(&mut self) -> Result<Vec<JobResult<K, P::Output>>, JobError> {
        if self.shut_down {
            return Ok(std::mem::take(&mut self.leftover));
        }
        self.shut_down = true;

        let abandoned = self.queue.close();
        let joined = self.pool.join();

        let mut results = self.results.drain();
        results.extend(abandoned.into_iter().map(|desc| JobResult {
            key: desc.key(),
            epoch: desc.epoch(),
            outcome: JobOutcome::Cancelled,
        }));

        if let Err(err) = joined {
            warn!(leftover = results.len(), "job handler shut down after worker failure");
            self.leftover = results;
            return Err(err);
        }

        info!(leftover = results.len(), "job handler shut down");
        Ok(results)
    }

    /// State of the outstanding job for `key`: `Queued`, `Running`, or `None`.
    pub fn state(&self, key: &K) -> Option<JobState> {
        self.queue.state(key)
    }

    /// Check if `key` has a queued or running job.
    pub fn is_outstanding(&self, key: &K) -> bool {
        self.state(key).is_some()
    }

    /// Number of jobs waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.queue.queued_count()
    }

    /// Number of jobs being processed.
    pub fn running_count(&self) -> usize {
        self.queue.running_count()
    }

    /// Number of queued or running jobs.
    pub fn in_flight_count(&self) -> usize {
        self.queue.outstanding_count()
    }

    /// Cumulative job counters.
    pub fn stats(&self) -> JobStats {
        self.queue.stats()
    }

    /// Number of worker threads still attached.
    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    /// Check if [`shutdown`](Self::shutdown) has been called.
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Get the handler configuration.
    pub const fn config(&self) -> &JobConfig {
        &self.config
    }
}

impl<K: JobKey, P: Processor> Drop for AsyncJobHandler<K, P> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("job handler shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CancelToken;
    use crossbeam::channel::{self, Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Doubles its input. Inputs listed in `gated` wait for a release signal,
    /// odd inputs above 1000 fail, and input 666 panics.
    struct TestProcessor {
        calls: Arc<AtomicUsize>,
        gated: Vec<u32>,
        started_tx: Sender<u32>,
        release_rx: Receiver<()>,
    }

    struct Harness {
        calls: Arc<AtomicUsize>,
        started_rx: Receiver<u32>,
        release_tx: Sender<()>,
    }

    impl Harness {
        fn wait_started(&self, input: u32) {
            let started = self
                .started_rx
                .recv_timeout(TIMEOUT)
                .expect("job never started");
            assert_eq!(started, input);
        }

        fn release(&self) {
            self.release_tx.send(()).unwrap();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Processor for TestProcessor {
        type Input = u32;
        type Output = u32;
        type Error = String;

        fn process(&self, input: u32, _cancel: &CancelToken) -> Result<u32, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated.contains(&input) {
                self.started_tx.send(input).unwrap();
                self.release_rx.recv_timeout(TIMEOUT).unwrap();
            }
            if input == 666 {
                panic!("cursed input");
            }
            if input > 1000 && input % 2 == 1 {
                return Err(format!("odd input {input}"));
            }
            Ok(input * 2)
        }
    }

    fn handler(
        config: JobConfig,
        gated: &[u32],
    ) -> (AsyncJobHandler<char, TestProcessor>, Harness) {
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        let processor = TestProcessor {
            calls: Arc::clone(&calls),
            gated: gated.to_vec(),
            started_tx,
            release_rx,
        };
        let handler = AsyncJobHandler::new(processor, config).unwrap();
        (
            handler,
            Harness {
                calls,
                started_rx,
                release_tx,
            },
        )
    }

    /// Drain until at least `count` results arrive or the timeout passes.
    fn drain_until(
        handler: &AsyncJobHandler<char, TestProcessor>,
        count: usize,
    ) -> Vec<JobResult<char, u32>> {
        let deadline = Instant::now() + TIMEOUT;
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            results.extend(handler.drain());
            std::thread::sleep(Duration::from_millis(1));
        }
        results
    }

    fn wait_idle(handler: &AsyncJobHandler<char, TestProcessor>) {
        let deadline = Instant::now() + TIMEOUT;
        while handler.in_flight_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn two_workers_complete_two_tiles() {
        let (handler, _harness) = handler(JobConfig::default().with_workers(2), &[]);
        handler.submit('A', 1).unwrap();
        handler.submit('B', 2).unwrap();

        let mut results = drain_until(&handler, 2);
        results.sort_by_key(|r| r.key);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, 'A');
        assert_eq!(results[1].key, 'B');
        assert!(matches!(results[0].outcome, JobOutcome::Completed(2)));
        assert!(matches!(results[1].outcome, JobOutcome::Completed(4)));

        // Nothing is delivered twice.
        wait_idle(&handler);
        assert!(handler.drain().is_empty());
    }

    #[test]
    fn duplicate_submission_yields_one_result() {
        let (handler, harness) = handler(JobConfig::default().with_workers(1), &[5]);
        handler.submit('A', 5).unwrap();
        assert_eq!(handler.submit('A', 5), Err(SubmitError::AlreadyQueued));

        harness.wait_started(5);
        assert_eq!(handler.state(&'A'), Some(JobState::Running));
        assert_eq!(handler.submit('A', 5), Err(SubmitError::AlreadyQueued));
        harness.release();

        let results = drain_until(&handler, 1);
        assert_eq!(results.len(), 1);
        wait_idle(&handler);
        assert!(handler.drain().is_empty());
        assert_eq!(harness.calls(), 1);
    }

    #[test]
    fn cancel_queued_job_never_processes_it() {
        let (handler, harness) = handler(JobConfig::default().with_workers(1), &[1]);
        handler.submit('X', 1).unwrap();
        harness.wait_started(1);

        // The only worker is busy, so C is still queued.
        handler.submit('C', 3).unwrap();
        assert_eq!(handler.state(&'C'), Some(JobState::Queued));
        assert_eq!(handler.cancel(&'C'), Cancellation::Removed);
        assert!(!handler.is_outstanding(&'C'));
        harness.release();

        let results = drain_until(&handler, 1);
        wait_idle(&handler);
        let mut all: Vec<_> = results.into_iter().map(|r| r.key).collect();
        all.extend(handler.drain().into_iter().map(|r| r.key));
        assert_eq!(all, vec!['X']);
        assert_eq!(harness.calls(), 1);
        assert_eq!(handler.stats().cancelled, 1);
    }

    #[test]
    fn cancel_running_job_delivers_cancelled() {
        let (handler, harness) = handler(JobConfig::default().with_workers(1), &[4]);
        handler.submit('D', 4).unwrap();
        harness.wait_started(4);

        assert_eq!(handler.cancel(&'D'), Cancellation::Requested);
        harness.release();

        let results = drain_until(&handler, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, 'D');
        assert!(results[0].outcome.is_cancelled());
        assert_eq!(results[0].state(), JobState::Cancelled);
        assert_eq!(harness.calls(), 1);
    }

    #[test]
    fn cancel_unknown_key_is_noop() {
        let (handler, _harness) = handler(JobConfig::default().with_workers(0), &[]);
        assert_eq!(handler.cancel(&'Z'), Cancellation::Unknown);
    }

    #[test]
    fn soft_cap_signals_backpressure() {
        let (handler, _harness) =
            handler(JobConfig::default().with_workers(0).with_soft_cap(1), &[]);
        handler.submit('A', 1).unwrap();
        assert_eq!(
            handler.submit('B', 2),
            Err(SubmitError::Backpressure { cap: 1 })
        );
        assert_eq!(handler.queued_count(), 1);
        assert_eq!(handler.stats().rejected, 1);
    }

    #[test]
    fn failure_does_not_stop_worker() {
        let (handler, _harness) = handler(JobConfig::default().with_workers(1), &[]);
        handler.submit('F', 1001).unwrap();
        handler.submit('P', 666).unwrap();
        handler.submit('G', 10).unwrap();

        let mut results = drain_until(&handler, 3);
        results.sort_by_key(|r| r.key);
        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0].outcome, JobOutcome::Failed(r) if r.contains("odd input")));
        assert!(matches!(results[1].outcome, JobOutcome::Completed(20)));
        assert!(matches!(&results[2].outcome, JobOutcome::Failed(r) if r.contains("cursed")));
        assert_eq!(handler.worker_count(), 1);

        let stats = handler.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn key_is_reusable_after_completion() {
        let (handler, _harness) = handler(JobConfig::default().with_workers(1), &[]);
        handler.submit('R', 1).unwrap();
        assert_eq!(drain_until(&handler, 1).len(), 1);
        wait_idle(&handler);

        handler.submit('R', 2).unwrap();
        let results = drain_until(&handler, 1);
        assert!(matches!(results[0].outcome, JobOutcome::Completed(4)));
    }

    #[test]
    fn shutdown_waits_for_running_and_cancels_queued() {
        let (mut handler, harness) = handler(JobConfig::default().with_workers(1), &[1]);
        handler.submit('A', 1).unwrap();
        harness.wait_started(1);
        handler.submit('B', 2).unwrap();

        let releaser = {
            let release_tx = harness.release_tx.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                release_tx.send(()).unwrap();
            })
        };

        let mut results = handler.shutdown().unwrap();
        releaser.join().unwrap();
        results.sort_by_key(|r| r.key);

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].outcome, JobOutcome::Completed(2)));
        assert!(results[1].outcome.is_cancelled());
        assert_eq!(handler.worker_count(), 0);
        assert_eq!(harness.calls(), 1);

        assert!(handler.is_shut_down());
        assert!(handler.drain().is_empty());
        assert_eq!(handler.submit('C', 3), Err(SubmitError::ShutDown));
        assert!(handler.shutdown().unwrap().is_empty());
        assert!(handler.drain().is_empty());
    }

    #[test]
    fn shutdown_with_no_workers_returns_queued_as_cancelled() {
        let (mut handler, harness) = handler(JobConfig::default().with_workers(0), &[]);
        handler.submit('A', 1).unwrap();
        handler.submit('B', 2).unwrap();

        let results = handler.shutdown().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome.is_cancelled()));
        assert_eq!(harness.calls(), 0);
    }

    #[test]
    fn drop_joins_workers() {
        let (handler, harness) = handler(JobConfig::default().with_workers(2), &[]);
        for (i, key) in ('a'..='h').enumerate() {
            handler.submit(key, i as u32).unwrap();
        }
        drop(handler);
        assert!(harness.calls() <= 8);
    }

    #[test]
    fn worker_panic_at_shutdown_keeps_results() {
        let (mut handler, _harness) = handler(JobConfig::default().with_workers(0), &[]);
        handler.submit('A', 1).unwrap();
        let broken = std::thread::Builder::new()
            .name("tile-worker-9".into())
            .spawn(|| panic!("worker died"))
            .unwrap();
        handler.pool.adopt(broken);

        match handler.shutdown() {
            Err(JobError::Join { name }) => assert_eq!(name, "tile-worker-9"),
            other => panic!("expected join error, got {:?}", other.map(|r| r.len())),
        }
        assert!(handler.drain().is_empty());

        let results = handler.shutdown().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, 'A');
        assert!(results[0].outcome.is_cancelled());
        assert!(handler.shutdown().unwrap().is_empty());
    }

    /// Doubles its input, yielding first so jobs interleave with the owner.
    struct Doubler;

    impl Processor for Doubler {
        type Input = u32;
        type Output = u32;
        type Error = String;

        fn process(&self, input: u32, _cancel: &CancelToken) -> Result<u32, String> {
            for _ in 0..input % 4 {
                std::thread::yield_now();
            }
            Ok(input * 2)
        }
    }

    /// Outstanding result expectations per key, oldest first. `true` marks a
    /// submission whose cancel was reported as `Requested`.
    type Expected = hashbrown::HashMap<u32, std::collections::VecDeque<bool>>;

    fn check_results(
        results: Vec<JobResult<u32, u32>>,
        expected: &mut Expected,
        last_epoch: &mut hashbrown::HashMap<u32, u64>,
    ) {
        for result in results {
            let must_cancel = expected
                .get_mut(&result.key)
                .and_then(std::collections::VecDeque::pop_front)
                .unwrap_or_else(|| panic!("unexpected result for key {}", result.key));
            if must_cancel {
                assert!(result.outcome.is_cancelled(), "key {} not cancelled", result.key);
            }
            if let Some(prev) = last_epoch.insert(result.key, result.epoch) {
                assert!(result.epoch > prev, "key {} answered twice", result.key);
            }
        }
    }

    #[test]
    fn random_submit_cancel_sequences_keep_one_result_per_submission() {
        const KEYS: u32 = 6;
        let mut handler =
            AsyncJobHandler::<u32, Doubler>::new(Doubler, JobConfig::default().with_workers(3))
                .unwrap();
        let mut expected = Expected::new();
        let mut last_epoch = hashbrown::HashMap::new();

        // xorshift32, fixed seed
        let mut state = 0x9E37_79B9_u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for step in 0..4000 {
            let roll = next();
            let key = roll % KEYS;
            match (roll >> 8) % 10 {
                0..=4 => match handler.submit(key, step) {
                    Ok(()) => expected.entry(key).or_default().push_back(false),
                    Err(err) => assert_eq!(err, SubmitError::AlreadyQueued),
                },
                5..=7 => match handler.cancel(&key) {
                    Cancellation::Removed => {
                        assert!(expected.get_mut(&key).and_then(|q| q.pop_back()).is_some());
                    }
                    Cancellation::Requested => {
                        let last = expected.get_mut(&key).and_then(|q| q.back_mut());
                        *last.expect("requested cancel without submission") = true;
                    }
                    Cancellation::Unknown => {}
                },
                _ => check_results(handler.drain(), &mut expected, &mut last_epoch),
            }
            assert!(handler.in_flight_count() <= KEYS as usize);
        }

        let leftover = handler.shutdown().unwrap();
        check_results(leftover, &mut expected, &mut last_epoch);
        assert!(expected.values().all(std::collections::VecDeque::is_empty));
        assert!(handler.drain().is_empty());
    }
}
