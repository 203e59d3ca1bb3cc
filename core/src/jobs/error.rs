//! Job system error types.

use thiserror::Error;

/// Errors raised while starting the job system.
///
/// All of them describe a misconfigured or resource-starved process; callers
/// are expected to treat them as fatal.
#[derive(Debug, Error)]
pub enum JobError {
    /// The requested fiber stack is smaller than the supported minimum.
    #[error("fiber stack size {requested} is below the minimum of {minimum} bytes")]
    StackTooSmall { requested: usize, minimum: usize },

    /// A fiber stack could not be allocated.
    #[error("failed to allocate fiber stack: {0}")]
    FiberCreation(#[source] std::io::Error),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A worker thread stopped before reporting that it was ready.
    #[error("a worker thread exited during startup")]
    WorkerLost,

    /// The configuration is inconsistent.
    #[error("invalid job system configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for job system operations.
pub type JobResult<T> = Result<T, JobError>;
