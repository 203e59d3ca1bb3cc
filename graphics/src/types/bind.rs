//! Usage flags shared by textures and buffers.

use bitflags::bitflags;

bitflags! {
    /// How a resource is bound during the frame.
    ///
    /// Flags are OR-ed into a graph resource's descriptor as passes declare
    /// inputs, outputs and attachments, so the physical resource is created
    /// with every usage the frame needs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        /// Sampled or read in a shader.
        const SHADER_RESOURCE = 1 << 0;
        /// Color render target.
        const RENDER_TARGET = 1 << 1;
        /// Depth-stencil target.
        const DEPTH_STENCIL = 1 << 2;
        /// Read-write storage access.
        const UNORDERED_ACCESS = 1 << 3;
        /// Vertex buffer.
        const VERTEX_BUFFER = 1 << 4;
        /// Index buffer.
        const INDEX_BUFFER = 1 << 5;
        /// Constant (uniform) buffer.
        const CONSTANT_BUFFER = 1 << 6;
        /// Indirect draw or dispatch arguments.
        const INDIRECT_ARGS = 1 << 7;
        /// Source of a copy.
        const COPY_SRC = 1 << 8;
        /// Destination of a copy.
        const COPY_DST = 1 << 9;
    }
}

impl Default for BindFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl BindFlags {
    /// Flags that only make sense on textures.
    pub const TEXTURE_ONLY: Self = Self::RENDER_TARGET.union(Self::DEPTH_STENCIL);

    /// Flags that only make sense on buffers.
    pub const BUFFER_ONLY: Self = Self::VERTEX_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::CONSTANT_BUFFER)
        .union(Self::INDIRECT_ARGS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(BindFlags::default().is_empty());
    }

    #[test]
    fn test_accumulation() {
        let mut flags = BindFlags::SHADER_RESOURCE;
        flags |= BindFlags::RENDER_TARGET;
        assert!(flags.contains(BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE));
        assert!(flags.intersects(BindFlags::TEXTURE_ONLY));
        assert!(!flags.intersects(BindFlags::BUFFER_ONLY));
    }
}
