//! Resource descriptors and bind flags.
//!
//! Descriptors describe *what* a graph resource is (extent, format, size);
//! bind flags describe *how* the frame uses it. The render graph accumulates
//! bind flags while passes declare their usage, and two descriptors are
//! interchangeable for aliasing only when they compare equal.

mod bind;
mod buffer;
mod common;
mod texture;

pub use bind::BindFlags;
pub use buffer::BufferDescriptor;
pub use common::{ClearValue, Extent3d};
pub use texture::{TextureDescriptor, TextureFormat};
