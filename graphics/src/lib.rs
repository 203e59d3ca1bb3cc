//! # Fibra Graphics
//!
//! Frame render graph executed on the Fibra job system.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - Per-frame passes with versioned resource dependencies,
//!   dead-pass elimination and cross-frame resource aliasing
//! - [`GpuDevice`] - Trait for the GPU collaborator the graph drives
//! - [`DummyDevice`] - Recording device for tests and tooling (`dummy` feature)
//! - [`types`] - Resource descriptors and bind flags
//!
//! Every pass surviving culling records its commands in its own job, so a
//! frame's passes record in parallel and may themselves fan out sub-jobs.
//!
//! ## Example
//!
//! ```ignore
//! use fibra_graphics::{PassContext, RenderGraph, RenderTargetAttachment};
//!
//! let mut graph = RenderGraph::new();
//! let mut output = Default::default();
//! graph.add_callback_render_pass("main", |builder| {
//!     let color = builder.create_texture("color", desc);
//!     output = builder.add_rtv(color, RenderTargetAttachment::load());
//!     |ctx: &mut PassContext<'_>| ctx.command_list().draw(3, 1)
//! })?;
//! graph.execute(&device, jobs, output)?;
//! ```

pub mod backend;
pub mod error;
pub mod graph;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::{DummyDevice, DummyStats};
pub use backend::{Command, CommandList, GpuDevice, GpuError, GpuHandle};
pub use error::{GraphError, GraphResult};
pub use graph::{
    DepthStencilAttachment, FrameBytes, FrameData, FrameStats, LoadOp, PassContext, PassHandle,
    RenderGraph, RenderGraphConfig, RenderPass, RenderTargetAttachment, ResourceBuilder,
    ResourceRef, StoreOp,
};
pub use types::{
    BindFlags, BufferDescriptor, ClearValue, Extent3d, TextureDescriptor, TextureFormat,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    log::info!("Fibra Graphics v{} initialized", VERSION);
}
