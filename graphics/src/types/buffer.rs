//! Buffer descriptors.

use super::BindFlags;

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Size in bytes.
    pub size: u64,
    /// Element stride in bytes (0 for raw buffers).
    pub stride: u32,
    /// Accumulated bind flags.
    pub bind_flags: BindFlags,
}

impl BufferDescriptor {
    /// Create a new raw buffer descriptor.
    pub fn new(size: u64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Create a structured buffer of `count` elements of `stride` bytes.
    pub fn structured(stride: u32, count: u32) -> Self {
        Self {
            size: u64::from(stride) * u64::from(count),
            stride,
            bind_flags: BindFlags::empty(),
        }
    }

    /// Set the initial bind flags.
    pub fn with_bind_flags(mut self, flags: BindFlags) -> Self {
        self.bind_flags = flags;
        self
    }

    /// Number of elements for structured buffers.
    pub fn element_count(&self) -> u64 {
        if self.stride == 0 {
            0
        } else {
            self.size / u64::from(self.stride)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured() {
        let desc = BufferDescriptor::structured(16, 256);
        assert_eq!(desc.size, 4096);
        assert_eq!(desc.element_count(), 256);
        assert_eq!(BufferDescriptor::new(64).element_count(), 0);
    }
}
