//! # Resolution Pyramid
//!
//! Splits a source image into resolution levels. Level `0` is full resolution
//! with the most tiles; `top_level` is a single tile covering the whole image.
//! Each level up halves the resolution and quarters the tile count.
//!
//! The build is pure: identical inputs always produce identical levels.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::math::PixelRect;

/// Highest level a pyramid may have. With a cap of 2 a pyramid never holds
/// more than `(4^3 - 1) / 3 = 21` tiles.
pub const MAX_TOP_LEVEL: u32 = 2;

/// Identity of a tile inside one pyramid: its level and row-major index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub index: u32,
}

impl TileKey {
    pub fn new(level: u32, index: u32) -> Self {
        Self { level, index }
    }
}

/// Static description of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSpec {
    pub key: TileKey,
    /// Region of the source image this tile decodes.
    pub rect: PixelRect,
    /// Subsampling factor, `2^level`.
    pub sample_size: u32,
}

/// Computes the top level for `source` pixels shown on a surface of `bound`.
///
/// Halves both dimensions until they fit inside `bound`, steps back once
/// (the loop overshoots by one) and clamps into `[0, cap]`.
pub fn compute_top_level(source: UVec2, bound: UVec2, cap: u32) -> u32 {
    let (mut w, mut h) = (source.x, source.y);
    let mut level: i64 = 0;
    while w > bound.x || h > bound.y {
        w /= 2;
        h /= 2;
        level += 1;
    }
    level -= 1;
    level.clamp(0, i64::from(cap)) as u32
}

/// All levels of tiles for one source image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pyramid {
    source_size: UVec2,
    top_level: u32,
    /// `levels[l]` holds the tiles of level `l` in row-major order.
    levels: Vec<Vec<TileSpec>>,
}

impl Pyramid {
    /// Builds the pyramid for `source_size` against a display `bound`.
    pub fn build(source_size: UVec2, bound: UVec2, cap: u32) -> Self {
        let top_level = compute_top_level(source_size, bound, cap);
        let levels = (0..=top_level)
            .map(|level| Self::build_level(source_size, top_level, level))
            .collect();
        Self {
            source_size,
            top_level,
            levels,
        }
    }

    fn build_level(source: UVec2, top_level: u32, level: u32) -> Vec<TileSpec> {
        let side = Self::side_count_for(top_level, level);
        let tile = source / side;
        let sample_size = 1 << level;

        (0..side * side)
            .map(|index| {
                let col = index % side;
                let row = index / side;
                let min = UVec2::new(tile.x * col, tile.y * row);
                // The last row / column absorbs the division remainder.
                let max = UVec2::new(
                    if col + 1 < side { tile.x * (col + 1) } else { source.x },
                    if row + 1 < side { tile.y * (row + 1) } else { source.y },
                );
                TileSpec {
                    key: TileKey::new(level, index),
                    rect: PixelRect::new(min, max),
                    sample_size,
                }
            })
            .collect()
    }

    fn side_count_for(top_level: u32, level: u32) -> u32 {
        1 << (top_level - level)
    }

    pub fn source_size(&self) -> UVec2 {
        self.source_size
    }

    pub fn top_level(&self) -> u32 {
        self.top_level
    }

    /// Tiles of `level`, empty when the level does not exist.
    pub fn level(&self, level: u32) -> &[TileSpec] {
        self.levels.get(level as usize).map_or(&[], Vec::as_slice)
    }

    pub fn levels(&self) -> impl Iterator<Item = &[TileSpec]> {
        self.levels.iter().map(Vec::as_slice)
    }

    pub fn tile(&self, key: TileKey) -> Option<&TileSpec> {
        self.levels
            .get(key.level as usize)
            .and_then(|tiles| tiles.get(key.index as usize))
    }

    /// The single lowest-resolution tile covering the whole image.
    pub fn top_tile(&self) -> &TileSpec {
        &self.levels[self.top_level as usize][0]
    }

    pub fn tile_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}
