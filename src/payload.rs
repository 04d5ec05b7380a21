//! Bounds-checked, non-owning view over message payload bytes.
//!
//! Handlers receive a [`PayloadView`] borrowed from the buffer that backs the
//! message being dispatched. The view is valid only for that borrow; a handler
//! that needs the bytes later must copy them out.

use core::ops::Index;

/// A non-owning indexed view over a fixed byte buffer.
///
/// `view[i]` returns the i-th payload byte. Payload elements are always single
/// bytes on the wire, so indexing never scales by an element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadView<'a> {
    bytes: &'a [u8],
}

impl<'a> PayloadView<'a> {
    /// Wrap a byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The byte at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    /// The underlying slice.
    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterate over the payload bytes.
    pub fn iter(&self) -> core::iter::Copied<core::slice::Iter<'a, u8>> {
        self.bytes.iter().copied()
    }

    /// Read a little-endian `u16` starting at `offset`.
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes = self.bytes.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian `u32` starting at `offset`.
    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.bytes.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl<'a> Index<usize> for PayloadView<'a> {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.bytes[index]
    }
}

impl<'a> IntoIterator for &PayloadView<'a> {
    type Item = u8;
    type IntoIter = core::iter::Copied<core::slice::Iter<'a, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
