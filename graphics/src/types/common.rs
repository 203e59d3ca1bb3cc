//! Common types shared across the graphics system.

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub const fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new_2d(1, 1)
    }
}

/// Clear value for render target attachments.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// Keep whatever the attachment contains.
    #[default]
    None,
    /// Clear color (RGBA).
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth value.
    Depth(f32),
    /// Clear stencil value.
    Stencil(u32),
    /// Clear depth and stencil.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub const fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value.
    pub const fn depth(depth: f32) -> Self {
        Self::Depth(depth)
    }

    /// Create a depth-stencil clear value.
    pub const fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent() {
        let extent = Extent3d::new_2d(1920, 1080);
        assert_eq!(extent.depth, 1);
        assert_eq!(extent.texel_count(), 1920 * 1080);
        assert_eq!(Extent3d::new_3d(4, 4, 4).texel_count(), 64);
    }

    #[test]
    fn test_clear_values() {
        assert_eq!(ClearValue::default(), ClearValue::None);
        assert_eq!(
            ClearValue::color(0.0, 0.0, 0.0, 1.0),
            ClearValue::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0
            }
        );
        assert_eq!(ClearValue::depth(1.0), ClearValue::Depth(1.0));
    }
}
