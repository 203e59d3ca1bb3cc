//! Job system configuration.

use super::error::{JobError, JobResult};

/// Upper bound on the number of fibers the scheduler may own.
pub const MAX_FIBER_COUNT: usize = 128;

/// Smallest fiber stack the scheduler accepts.
pub const MIN_FIBER_STACK_SIZE: usize = 16 * 1024;

/// Fiber stack size used when none is configured.
pub const DEFAULT_FIBER_STACK_SIZE: usize = 256 * 1024;

/// Number of completion counters that can be live at the same time.
pub const JOB_SIGNAL_COUNT: usize = 512;

/// Number of worker threads used when none is configured.
///
/// Matches the available hardware parallelism, clamped so every worker can
/// own at least one fiber.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(MAX_FIBER_COUNT)
}

/// Startup parameters for a [`JobSystem`](super::JobSystem).
///
/// # Example
///
/// ```
/// use fibra_core::jobs::JobSystemConfig;
///
/// let config = JobSystemConfig::default()
///     .with_worker_count(2)
///     .with_fiber_count(16)
///     .with_fiber_stack_size(64 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSystemConfig {
    /// Number of OS worker threads.
    pub worker_count: usize,
    /// Total number of fibers, spread across the workers.
    pub fiber_count: usize,
    /// Stack size of every fiber in bytes.
    pub fiber_stack_size: usize,
    /// Number of completion counters that can be live at the same time.
    pub counter_capacity: usize,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            fiber_count: MAX_FIBER_COUNT,
            fiber_stack_size: DEFAULT_FIBER_STACK_SIZE,
            counter_capacity: JOB_SIGNAL_COUNT,
        }
    }
}

impl JobSystemConfig {
    /// Set the number of worker threads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the total number of fibers.
    pub fn with_fiber_count(mut self, fiber_count: usize) -> Self {
        self.fiber_count = fiber_count;
        self
    }

    /// Set the stack size of every fiber in bytes.
    pub fn with_fiber_stack_size(mut self, fiber_stack_size: usize) -> Self {
        self.fiber_stack_size = fiber_stack_size;
        self
    }

    /// Set the number of completion counters that can be live at once.
    pub fn with_counter_capacity(mut self, counter_capacity: usize) -> Self {
        self.counter_capacity = counter_capacity;
        self
    }

    /// Check that the configuration can be started.
    pub fn validate(&self) -> JobResult<()> {
        if self.worker_count == 0 {
            return Err(JobError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.fiber_count > MAX_FIBER_COUNT {
            return Err(JobError::InvalidConfig(format!(
                "fiber_count {} exceeds the maximum of {}",
                self.fiber_count, MAX_FIBER_COUNT
            )));
        }
        if self.fiber_count < self.worker_count {
            return Err(JobError::InvalidConfig(format!(
                "fiber_count {} is smaller than worker_count {}",
                self.fiber_count, self.worker_count
            )));
        }
        if self.fiber_stack_size < MIN_FIBER_STACK_SIZE {
            return Err(JobError::StackTooSmall {
                requested: self.fiber_stack_size,
                minimum: MIN_FIBER_STACK_SIZE,
            });
        }
        if self.counter_capacity == 0 || self.counter_capacity >= u32::MAX as usize {
            return Err(JobError::InvalidConfig(format!(
                "counter_capacity {} is out of range",
                self.counter_capacity
            )));
        }
        Ok(())
    }

    /// Number of fibers owned by the given worker.
    pub(crate) fn fibers_for_worker(&self, worker: usize) -> usize {
        let base = self.fiber_count / self.worker_count;
        let extra = usize::from(worker < self.fiber_count % self.worker_count);
        base + extra
    }
}
