//! Asynchronous job handling for tile streaming.
//!
//! The owning thread submits one job per key, a fixed pool of worker threads
//! runs a [`Processor`] on each job, and finished outcomes are handed back
//! through a non-blocking result channel that the owner drains once per
//! frame. Workers never see the owner's live scene state; they receive plain
//! input and return plain output.
//!
//! ```no_run
//! use tilestream_jobs::{AsyncJobHandler, CancelToken, JobConfig, Processor};
//!
//! struct Doubler;
//!
//! impl Processor for Doubler {
//!     type Input = u32;
//!     type Output = u32;
//!     type Error = std::convert::Infallible;
//!
//!     fn process(&self, input: u32, _cancel: &CancelToken) -> Result<u32, Self::Error> {
//!         Ok(input * 2)
//!     }
//! }
//!
//! let mut jobs = AsyncJobHandler::<u32, _>::new(Doubler, JobConfig::default().with_workers(2))?;
//! jobs.submit(7, 21).ok();
//! for result in jobs.drain() {
//!     println!("{:?} -> {:?}", result.key, result.outcome);
//! }
//! jobs.shutdown()?;
//! # Ok::<(), tilestream_jobs::JobError>(())
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod job;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod results;

use std::fmt::Debug;
use std::hash::Hash;

pub use config::JobConfig;
pub use error::{JobError, SubmitError};
pub use handler::AsyncJobHandler;
pub use job::{CancelToken, Cancellation, JobDescriptor, JobOutcome, JobResult, JobState};
pub use pool::WorkerPool;
pub use processor::Processor;
pub use queue::{JobQueue, JobStats};
pub use results::{result_channel, ResultChannel, ResultSender};

/// Identity of one unit of work (for terrain, a tile position).
pub trait JobKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> JobKey for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}
