//! Logical resources and versioned references.

use crate::backend::GpuHandle;
use crate::types::{BindFlags, BufferDescriptor, TextureDescriptor};

/// A logical resource at a specific version.
///
/// Every write to a resource (output, render target or depth-stencil
/// binding) produces a new version; reads name the version they consume.
/// Two refs denote the same value iff index and version both match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    index: u32,
    version: u32,
}

impl ResourceRef {
    /// A reference that names no resource.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        version: 0,
    };

    pub(crate) const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// Index of the logical resource.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Version of the logical resource.
    pub const fn version(self) -> u32 {
        self.version
    }

    pub const fn is_valid(self) -> bool {
        self.index != u32::MAX
    }

    /// The same resource at another version.
    pub(crate) const fn with_version(self, version: u32) -> Self {
        Self::new(self.index, version)
    }
}

impl Default for ResourceRef {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Kind of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
}

/// Descriptor of a logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDesc {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Texture(_) => ResourceKind::Texture,
            Self::Buffer(_) => ResourceKind::Buffer,
        }
    }

    pub fn bind_flags(&self) -> BindFlags {
        match self {
            Self::Texture(desc) => desc.bind_flags,
            Self::Buffer(desc) => desc.bind_flags,
        }
    }

    pub(crate) fn add_bind_flags(&mut self, flags: BindFlags) {
        match self {
            Self::Texture(desc) => desc.bind_flags |= flags,
            Self::Buffer(desc) => desc.bind_flags |= flags,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureDescriptor> {
        match self {
            Self::Texture(desc) => Some(desc),
            Self::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferDescriptor> {
        match self {
            Self::Buffer(desc) => Some(desc),
            Self::Texture(_) => None,
        }
    }
}

/// A graph-level resource declared for one frame.
#[derive(Debug)]
pub(crate) struct LogicalResource {
    pub name: String,
    pub desc: ResourceDesc,
    /// Externally owned handle; never pooled or destroyed by the graph.
    pub imported: Option<GpuHandle>,
    /// Newest version any pass produced.
    pub latest_version: u32,
    /// Handle bound during refresh.
    pub physical: Option<GpuHandle>,
}

impl LogicalResource {
    pub fn new(name: String, desc: ResourceDesc, imported: Option<GpuHandle>) -> Self {
        Self {
            name,
            desc,
            physical: imported,
            imported,
            latest_version: 0,
        }
    }

    pub fn is_imported(&self) -> bool {
        self.imported.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    #[test]
    fn test_invalid_ref() {
        assert!(!ResourceRef::INVALID.is_valid());
        assert_eq!(ResourceRef::default(), ResourceRef::INVALID);
        assert!(ResourceRef::new(0, 0).is_valid());
    }

    #[test]
    fn test_versions_are_distinct_keys() {
        let v0 = ResourceRef::new(3, 0);
        let v1 = v0.with_version(1);
        assert_ne!(v0, v1);
        assert_eq!(v1.index(), 3);
        assert_eq!(v1.version(), 1);
    }

    #[test]
    fn test_desc_bind_flags() {
        let mut desc =
            ResourceDesc::Texture(TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        desc.add_bind_flags(BindFlags::RENDER_TARGET);
        desc.add_bind_flags(BindFlags::SHADER_RESOURCE);
        assert_eq!(
            desc.bind_flags(),
            BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE
        );
        assert_eq!(desc.kind(), ResourceKind::Texture);
        assert!(desc.as_buffer().is_none());
    }
}
