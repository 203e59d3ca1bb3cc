//! Fiber-based job scheduler.
//!
//! Jobs are plain closures executed by a fixed set of worker threads. Every
//! job runs on a fiber: a small stackful execution context owned by one
//! worker. A job that waits on another batch suspends its fiber instead of
//! blocking the worker thread, which meanwhile resumes other fibers or starts
//! new jobs. This lets frame code nest waits freely (a render pass waiting on
//! culling jobs that themselves wait on sub-jobs) even on a single worker.
//!
//! - [`JobSystem`]: owns the workers and fibers; dropping it shuts them down
//! - [`Jobs`]: cloneable handle for submitting jobs and waiting on them
//! - [`JobInfo`]: one job description (name, priority, parameter, closure)
//! - [`JobHandle`]: completion counter of a submitted batch
//! - [`JobContext`] / [`JobGroupArgs`]: what a running job sees
//! - [`Priority`]: `High`, `Normal` or `Low` queue lane
//!
//! # Fiber states
//!
//! `Idle -> Running` when a worker hands it a job, `Running -> Waiting` on
//! [`Jobs::wait`], `Waiting -> Ready` when the counter reaches zero,
//! `Ready -> Running` when the owning worker resumes it, and back to `Idle`
//! when the job returns.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use fibra_core::jobs::{JobInfo, JobSystem, JobSystemConfig};
//!
//! let system = JobSystem::new(JobSystemConfig::default())?;
//! let done = Arc::new(AtomicU32::new(0));
//!
//! let batch = (0..64)
//!     .map(|i| {
//!         let done = Arc::clone(&done);
//!         JobInfo::new("work", move |_| {
//!             done.fetch_add(1, Ordering::Relaxed);
//!         })
//!         .with_param(i)
//!     })
//!     .collect();
//! let handle = system.jobs().run_jobs(batch);
//! system.jobs().wait(handle);
//! assert_eq!(done.load(Ordering::Relaxed), 64);
//! # Ok::<(), fibra_core::jobs::JobError>(())
//! ```

mod config;
mod context;
mod counter;
mod error;
mod fiber;
mod priority;
mod queue;
mod system;
mod worker;

pub use config::{
    DEFAULT_FIBER_STACK_SIZE, JOB_SIGNAL_COUNT, JobSystemConfig, MAX_FIBER_COUNT,
    MIN_FIBER_STACK_SIZE, default_worker_count,
};
pub use context::{JobContext, JobGroupArgs};
pub use counter::JobHandle;
pub use error::{JobError, JobResult};
pub use priority::Priority;
pub use system::{JobInfo, JobSystem, Jobs};
