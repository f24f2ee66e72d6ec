//! # Pixel Buffers
//!
//! Decoded tile pixels. Buffers are immutable once built and shared by `Arc`,
//! so handing one to the render list never copies pixel data.

use std::sync::Arc;

use glam::UVec2;

/// RGBA8 pixels, row-major, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: UVec2,
    pixels: Arc<[u8]>,
}

impl PixelBuffer {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wraps `pixels`. Returns `None` if the length does not match `size`.
    pub fn from_rgba8(size: UVec2, pixels: Vec<u8>) -> Option<Self> {
        let expected = size.x as usize * size.y as usize * Self::BYTES_PER_PIXEL;
        (pixels.len() == expected).then(|| Self {
            size,
            pixels: pixels.into(),
        })
    }

    /// A buffer filled with a single colour.
    pub fn filled(size: UVec2, rgba: [u8; 4]) -> Self {
        let count = size.x as usize * size.y as usize;
        Self {
            size,
            pixels: rgba.repeat(count).into(),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.x
    }

    pub fn height(&self) -> u32 {
        self.size.y
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory held by the pixel data.
    pub fn byte_count(&self) -> usize {
        self.pixels.len()
    }

    /// True if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
