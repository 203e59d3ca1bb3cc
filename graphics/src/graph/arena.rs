//! Per-frame storage for pass data.
//!
//! Values pushed during setup live until the graph is cleared. Clearing
//! drops the values and rewinds the byte arena without releasing its
//! capacity, so steady-state frames allocate nothing.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Typed handle to a value stored in the frame arena.
pub struct FrameData<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for FrameData<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FrameData<T> {}

impl<T> fmt::Debug for FrameData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrameData").field(&self.index).finish()
    }
}

/// A range of zeroed bytes in the frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBytes {
    offset: usize,
    len: usize,
}

impl FrameBytes {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset.saturating_add(self.len)
    }
}

/// Alignment of byte allocations.
const BYTE_ALIGN: usize = 16;

#[derive(Default)]
pub(crate) struct FrameArena {
    values: Vec<Box<dyn Any + Send + Sync>>,
    bytes: Vec<u8>,
}

impl FrameArena {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            values: Vec::new(),
            bytes: Vec::with_capacity(bytes),
        }
    }

    pub fn push<T: Send + Sync + 'static>(&mut self, value: T) -> FrameData<T> {
        let index = self.values.len() as u32;
        self.values.push(Box::new(value));
        FrameData {
            index,
            _marker: PhantomData,
        }
    }

    pub fn get<T: 'static>(&self, data: &FrameData<T>) -> Option<&T> {
        self.values
            .get(data.index as usize)
            .and_then(|value| value.downcast_ref())
    }

    #[cfg(test)]
    pub fn get_mut<T: 'static>(&mut self, data: &FrameData<T>) -> Option<&mut T> {
        self.values
            .get_mut(data.index as usize)
            .and_then(|value| value.downcast_mut())
    }

    /// Reserve `size` zeroed bytes.
    pub fn alloc(&mut self, size: usize) -> FrameBytes {
        let offset = self.bytes.len().next_multiple_of(BYTE_ALIGN);
        let end = offset.saturating_add(size);
        if end > self.bytes.capacity() {
            log::debug!(
                "Frame arena grows from {} to {} bytes",
                self.bytes.capacity(),
                end
            );
        }
        self.bytes.resize(end, 0);
        FrameBytes { offset, len: size }
    }

    pub fn bytes(&self, bytes: FrameBytes) -> &[u8] {
        self.bytes.get(bytes.range()).unwrap_or(&[])
    }

    pub fn bytes_mut(&mut self, bytes: FrameBytes) -> &mut [u8] {
        self.bytes.get_mut(bytes.range()).unwrap_or(&mut [])
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Drop every value and rewind the byte arena, keeping its capacity.
    pub fn reset(&mut self) {
        self.values.clear();
        self.bytes.clear();
    }
}

impl fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameArena")
            .field("values", &self.values.len())
            .field("bytes_used", &self.bytes.len())
            .field("bytes_capacity", &self.bytes.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_values() {
        let mut arena = FrameArena::default();
        let count = arena.push(7u32);
        let name = arena.push(String::from("shadow"));
        assert_eq!(arena.get(&count), Some(&7));
        assert_eq!(arena.get(&name).map(String::as_str), Some("shadow"));

        *arena.get_mut(&count).unwrap() += 1;
        assert_eq!(arena.get(&count), Some(&8));
    }

    #[test]
    fn test_bytes_are_zeroed_and_aligned() {
        let mut arena = FrameArena::with_capacity(256);
        let a = arena.alloc(3);
        let b = arena.alloc(8);
        assert!(arena.bytes(a).iter().all(|&byte| byte == 0));
        assert_eq!(b.offset % BYTE_ALIGN, 0);

        arena.bytes_mut(b).copy_from_slice(&[1; 8]);
        assert_eq!(arena.bytes(b), &[1; 8]);
        assert_eq!(arena.bytes(a), &[0; 3]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_ranges_past_four_gib_keep_their_offset() {
        let offset = u32::MAX as usize + 32;
        let bytes = FrameBytes { offset, len: 64 };
        assert_eq!(bytes.range(), offset..offset + 64);
        assert_eq!(bytes.len(), 64);

        // Out-of-range spans read as empty instead of aliasing low bytes.
        let mut arena = FrameArena::with_capacity(64);
        let _ = arena.alloc(64);
        assert!(arena.bytes(bytes).is_empty());
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut arena = FrameArena::with_capacity(64);
        arena.push(1u8);
        let bytes = arena.alloc(48);
        arena.bytes_mut(bytes).fill(0xff);
        let capacity = arena.bytes.capacity();

        arena.reset();
        assert_eq!(arena.value_count(), 0);
        assert_eq!(arena.bytes_used(), 0);
        assert_eq!(arena.bytes.capacity(), capacity);

        let again = arena.alloc(48);
        assert!(arena.bytes(again).iter().all(|&byte| byte == 0));
    }
}
