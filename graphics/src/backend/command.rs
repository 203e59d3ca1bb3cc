//! Backend-neutral command recording.

use super::GpuHandle;
use crate::graph::{LoadOp, StoreOp};

/// Color attachment of a recorded render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    /// Physical texture written.
    pub texture: GpuHandle,
    /// What happens to existing contents.
    pub load_op: LoadOp,
    /// Whether results are kept.
    pub store_op: StoreOp,
}

/// Depth-stencil attachment of a recorded render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    /// Physical texture written.
    pub texture: GpuHandle,
    /// What happens to existing depth.
    pub depth_load_op: LoadOp,
    /// Whether depth is kept.
    pub depth_store_op: StoreOp,
    /// Depth is only tested, never written.
    pub read_only: bool,
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a named debug region.
    BeginEvent(String),
    /// Close the innermost debug region.
    EndEvent,
    /// Bind attachments and start rasterizing.
    BeginRenderPass {
        color: Vec<ColorTarget>,
        depth: Option<DepthTarget>,
    },
    /// Finish the current render pass.
    EndRenderPass,
    /// Non-indexed draw.
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    /// Compute dispatch.
    Dispatch { x: u32, y: u32, z: u32 },
    /// Buffer to buffer copy.
    CopyBuffer {
        src: GpuHandle,
        dst: GpuHandle,
        size: u64,
    },
    /// Whole texture copy.
    CopyTexture { src: GpuHandle, dst: GpuHandle },
    /// Write bytes into a buffer.
    UpdateBuffer {
        buffer: GpuHandle,
        offset: u64,
        data: Vec<u8>,
    },
}

impl Command {
    /// Debug markers do not make a list worth submitting.
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::BeginEvent(_) | Self::EndEvent)
    }
}

/// A command stream recorded by one render pass.
#[derive(Debug, Default)]
pub struct CommandList {
    label: String,
    commands: Vec<Command>,
    event_depth: u32,
    compiled: bool,
}

impl CommandList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the list (the render graph uses the pass name).
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// The list's name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Open a named debug region.
    pub fn begin_event(&mut self, name: &str) {
        self.event_depth += 1;
        self.push(Command::BeginEvent(name.to_owned()));
    }

    /// Close the innermost debug region.
    pub fn end_event(&mut self) {
        if self.event_depth == 0 {
            log::warn!("CommandList '{}': end_event without begin_event", self.label);
            return;
        }
        self.event_depth -= 1;
        self.push(Command::EndEvent);
    }

    /// Start a render pass on the given attachments.
    pub fn begin_render_pass(&mut self, color: Vec<ColorTarget>, depth: Option<DepthTarget>) {
        self.push(Command::BeginRenderPass { color, depth });
    }

    /// Finish the current render pass.
    pub fn end_render_pass(&mut self) {
        self.push(Command::EndRenderPass);
    }

    /// Record a non-indexed draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        });
    }

    /// Record an indexed draw.
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32, base_vertex: i32) {
        self.push(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index: 0,
            base_vertex,
            first_instance: 0,
        });
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(Command::Dispatch { x, y, z });
    }

    /// Record a buffer copy.
    pub fn copy_buffer(&mut self, src: GpuHandle, dst: GpuHandle, size: u64) {
        self.push(Command::CopyBuffer { src, dst, size });
    }

    /// Record a texture copy.
    pub fn copy_texture(&mut self, src: GpuHandle, dst: GpuHandle) {
        self.push(Command::CopyTexture { src, dst });
    }

    /// Record a buffer update.
    pub fn update_buffer(&mut self, buffer: GpuHandle, offset: u64, data: &[u8]) {
        self.push(Command::UpdateBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    /// Recorded commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// True if anything besides debug markers was recorded.
    pub fn has_commands(&self) -> bool {
        self.commands.iter().any(|command| !command.is_marker())
    }

    /// Number of non-marker commands.
    pub fn command_count(&self) -> usize {
        self.commands.iter().filter(|c| !c.is_marker()).count()
    }

    /// Whether a device compiled this list.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Called by devices once compilation succeeded.
    pub fn mark_compiled(&mut self) {
        self.compiled = true;
    }

    /// Drop all commands so the list can be reused.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.event_depth = 0;
        self.compiled = false;
    }

    fn push(&mut self, command: Command) {
        debug_assert!(!self.compiled, "recording into a compiled command list");
        self.commands.push(command);
    }
}
