//! GPU device abstraction.
//!
//! The render graph talks to the GPU only through the [`GpuDevice`] trait:
//! it creates and destroys physical resources, hands out [`CommandList`]s for
//! passes to record into, compiles them, and submits the compiled lists of a
//! frame in one batch.
//!
//! # Available Devices
//!
//! - `dummy` (default feature): [`DummyDevice`], records every call and can
//!   inject failures; used by tests, benchmarks and the demo
//!
//! # Threading
//!
//! Pass jobs run concurrently on the job system's workers, so
//! `create_command_list` and `compile_command_list` may be called from
//! several threads at once. Resource creation and submission happen on the
//! thread that drives the graph.

mod command;
#[cfg(feature = "dummy")]
mod dummy;
mod error;

pub use command::{ColorTarget, Command, CommandList, DepthTarget};
#[cfg(feature = "dummy")]
pub use dummy::{DummyDevice, DummyStats};
pub use error::GpuError;

use crate::types::{BufferDescriptor, TextureDescriptor};

/// Opaque handle to a physical GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(u64);

impl GpuHandle {
    /// Wrap a backend-specific identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend-specific identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The GPU collaborator used by the render graph.
pub trait GpuDevice: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Create a texture, optionally uploading initial texel data.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
        name: &str,
    ) -> Result<GpuHandle, GpuError>;

    /// Create a buffer, optionally uploading initial contents.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
        name: &str,
    ) -> Result<GpuHandle, GpuError>;

    /// Destroy a resource created by this device.
    fn destroy_resource(&self, handle: GpuHandle);

    /// Allocate an empty command list.
    fn create_command_list(&self) -> CommandList {
        CommandList::new()
    }

    /// Translate a recorded command list into backend work.
    fn compile_command_list(&self, list: &mut CommandList) -> Result<(), GpuError>;

    /// Submit compiled command lists in order.
    fn submit_command_lists(&self, lists: &[CommandList]) -> Result<(), GpuError>;

    /// Called once before the frame's graph is executed.
    fn begin_frame(&self) {}

    /// Called once after the frame's submission.
    fn end_frame(&self) {}

    /// Present the back buffer.
    fn present(&self) -> Result<(), GpuError> {
        Ok(())
    }
}

static_assertions::assert_obj_safe!(GpuDevice);
