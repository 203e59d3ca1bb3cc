//! Backend error types.

use super::GpuHandle;

/// Errors reported by a [`GpuDevice`](super::GpuDevice).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// A recorded command list could not be compiled.
    #[error("command list compile failed: {0}")]
    CompileFailed(String),
    /// Command lists could not be submitted.
    #[error("submission failed: {0}")]
    SubmitFailed(String),
    /// The handle does not name a live resource.
    #[error("invalid resource handle {0:?}")]
    InvalidHandle(GpuHandle),
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
}
