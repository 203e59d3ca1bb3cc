//! Attachment descriptions for render-target and depth-stencil bindings.

use crate::types::ClearValue;

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// How a pass binds a texture as a color render target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderTargetAttachment {
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Mip level rendered to.
    pub mip_level: u32,
    /// Array layer rendered to.
    pub array_layer: u32,
}

impl RenderTargetAttachment {
    /// Keep the existing contents and store the result.
    pub fn load() -> Self {
        Self::default()
    }

    /// Clear to a color before rendering.
    pub fn clear(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            load_op: LoadOp::clear_color(r, g, b, a),
            ..Self::default()
        }
    }

    /// Previous contents are irrelevant.
    pub fn dont_care() -> Self {
        Self {
            load_op: LoadOp::DontCare,
            ..Self::default()
        }
    }

    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    pub fn with_array_layer(mut self, array_layer: u32) -> Self {
        self.array_layer = array_layer;
        self
    }
}

/// How a pass binds a depth-stencil texture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthStencilAttachment {
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    /// Depth is tested but not written.
    pub read_only: bool,
}

impl DepthStencilAttachment {
    /// Keep existing depth and store the result.
    pub fn load() -> Self {
        Self::default()
    }

    /// Clear depth before rendering.
    pub fn clear(depth: f32) -> Self {
        Self {
            depth_load_op: LoadOp::clear_depth(depth),
            ..Self::default()
        }
    }

    /// Test against existing depth without writing it.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            depth_store_op: StoreOp::DontCare,
            ..Self::default()
        }
    }

    pub fn with_stencil_ops(mut self, load_op: LoadOp, store_op: StoreOp) -> Self {
        self.stencil_load_op = load_op;
        self.stencil_store_op = store_op;
        self
    }
}
