//! Render graph error types.

use crate::backend::GpuError;
use crate::graph::ResourceRef;

/// Why a render graph frame failed.
///
/// Every variant is recoverable: the graph has already been cleared when
/// [`RenderGraph::execute`](crate::RenderGraph::execute) returns it, and the
/// next frame starts fresh.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// No pass writes the requested final resource.
    #[error("final resource {0:?} is never written by a render pass")]
    InvalidFinalResource(ResourceRef),
    /// The device failed to create a physical resource.
    #[error("failed to create resource '{name}': {source}")]
    ResourceCreation {
        name: String,
        #[source]
        source: GpuError,
    },
    /// One or more passes failed to record or compile their command list.
    #[error("{failed} render pass(es) failed to produce a command list")]
    CommandListCompile { failed: u32 },
    /// The device rejected the frame's command lists.
    #[error("command list submission failed: {0}")]
    Submit(#[source] GpuError),
    /// A pass with the same name is already registered this frame.
    #[error("render pass '{0}' is already registered")]
    DuplicatePass(String),
}

/// Result alias for render graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
