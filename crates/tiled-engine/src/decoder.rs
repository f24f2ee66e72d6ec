//! # Region Decoding
//!
//! The engine never holds a full-resolution bitmap itself. It asks a
//! `RegionDecoder` for one source rectangle at a time, subsampled by an
//! integer factor.

use std::path::Path;

use glam::UVec2;
use image::RgbaImage;
use tiled_canvas::{PixelBuffer, PixelRect};

use crate::error::{Result, TileError};

/// Decodes regions of one source image.
///
/// Implementations are called from blocking worker threads, possibly several
/// at once.
pub trait RegionDecoder: Send + Sync + 'static {
    /// Source dimensions in pixels.
    fn size(&self) -> UVec2;

    /// Decodes `rect`, keeping every `sample_size`-th pixel on each axis.
    fn decode_region(&self, rect: PixelRect, sample_size: u32) -> Result<PixelBuffer>;
}

/// Output dimensions of `rect` decoded at `sample_size`.
pub fn subsampled_size(rect: PixelRect, sample_size: u32) -> UVec2 {
    let s = sample_size.max(1);
    UVec2::new(rect.width().div_ceil(s), rect.height().div_ceil(s))
}

/// A `RegionDecoder` over an image decoded by the `image` crate.
///
/// The `image` crate has no region decoding, so the whole source is decoded
/// once and kept as full-resolution RGBA8 (about 365 MB for 11785x7741).
/// Only the tiles handed to the renderer are subsampled. Sources that must
/// stay out of memory need a `RegionDecoder` backed by a format-level region
/// reader instead.
pub struct ImageRegionDecoder {
    image: RgbaImage,
}

impl ImageRegionDecoder {
    /// Opens and decodes the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| TileError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        Self::from_image(image.into_rgba8())
    }

    /// Decodes an encoded image held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| TileError::SourceUnavailable(e.to_string()))?;
        Self::from_image(image.into_rgba8())
    }

    /// Wraps already decoded pixels.
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TileError::SourceUnavailable("image has no pixels".into()));
        }
        Ok(Self { image })
    }
}

impl RegionDecoder for ImageRegionDecoder {
    fn size(&self) -> UVec2 {
        UVec2::new(self.image.width(), self.image.height())
    }

    fn decode_region(&self, rect: PixelRect, sample_size: u32) -> Result<PixelBuffer> {
        let fail = |reason: &str| TileError::DecodeFailed {
            rect,
            sample_size,
            reason: reason.to_string(),
        };
        if sample_size == 0 {
            return Err(fail("sample size must be at least 1"));
        }
        if rect.is_empty() || rect.max.cmpgt(self.size()).any() {
            return Err(fail("region outside source bounds"));
        }

        let out = subsampled_size(rect, sample_size);
        let region = RgbaImage::from_fn(out.x, out.y, |x, y| {
            *self
                .image
                .get_pixel(rect.min.x + x * sample_size, rect.min.y + y * sample_size)
        });

        PixelBuffer::from_rgba8(out, region.into_raw()).ok_or_else(|| fail("buffer size mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsampled_size_rounds_up() {
        let rect = PixelRect::new(UVec2::ZERO, UVec2::new(5, 4));
        assert_eq!(subsampled_size(rect, 2), UVec2::new(3, 2));
        assert_eq!(subsampled_size(rect, 1), UVec2::new(5, 4));
    }

    #[test]
    fn decodes_subsampled_region() {
        let image = RgbaImage::from_fn(8, 8, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let decoder = ImageRegionDecoder::from_image(image).unwrap();
        let rect = PixelRect::new(UVec2::new(2, 2), UVec2::new(8, 8));
        let buffer = decoder.decode_region(rect, 2).unwrap();

        assert_eq!(buffer.size(), UVec2::new(3, 3));
        // Second output pixel of the first row samples source (4, 2).
        assert_eq!(&buffer.pixels()[4..8], &[4, 2, 0, 255]);
    }

    #[test]
    fn rejects_out_of_bounds_region() {
        let decoder = ImageRegionDecoder::from_image(RgbaImage::new(4, 4)).unwrap();
        let rect = PixelRect::new(UVec2::ZERO, UVec2::new(5, 4));
        assert!(matches!(
            decoder.decode_region(rect, 1),
            Err(TileError::DecodeFailed { .. })
        ));
    }
}
