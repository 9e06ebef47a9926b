//! Job handler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`AsyncJobHandler`](crate::AsyncJobHandler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Number of worker threads, fixed for the handler's lifetime.
    ///
    /// Zero is allowed; jobs then stay queued until shutdown.
    pub worker_count: usize,
    /// Waiting jobs at or above which `submit` reports backpressure.
    pub queue_soft_cap: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{index}`.
    pub thread_name: String,
    /// Worker stack size in bytes; the platform default when `None`.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

impl Default for JobConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get);
        Self {
            // Leave one core for the owning thread
            worker_count: cores.saturating_sub(1).max(1),
            queue_soft_cap: 256,
            thread_name: "tile-worker".to_string(),
            stack_size: None,
        }
    }
}

impl JobConfig {
    /// Set the number of worker threads.
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue soft cap.
    pub fn with_soft_cap(mut self, queue_soft_cap: usize) -> Self {
        self.queue_soft_cap = queue_soft_cap;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the worker stack size in bytes.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_at_least_one_worker() {
        let config = JobConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.queue_soft_cap, 256);
    }

    #[test]
    fn builders_override_defaults() {
        let config = JobConfig::default()
            .with_workers(0)
            .with_soft_cap(1)
            .with_thread_name("mesh")
            .with_stack_size(1 << 20);
        assert_eq!(config.stack_size, Some(1 << 20));
        assert_eq!(config.worker_count, 0);
        assert_eq!(config.queue_soft_cap, 1);
        assert_eq!(config.thread_name, "mesh");
    }
}
