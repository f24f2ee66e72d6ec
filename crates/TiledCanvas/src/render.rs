//! # Rendering Output
//!
//! The engine does not draw. Each frame it outputs a display list of
//! `DrawCommand`s in paint order; the host (macroquad, wgpu, egui, ...) is
//! responsible for turning them into pixels.

use glam::{Affine2, Vec2};

use crate::bitmap::PixelBuffer;
use crate::pyramid::TileKey;

/// A single drawing primitive.
#[derive(Clone, Debug)]
pub enum DrawCommand {
    /// Draw a decoded tile buffer.
    Tile {
        /// Which tile this is.
        key: TileKey,
        /// Maps buffer pixel coordinates into **View Space**.
        transform: Affine2,
        /// Decoded pixels.
        bitmap: PixelBuffer,
        /// `true` for the whole-image fallback tile.
        is_top: bool,
    },
}

impl DrawCommand {
    /// View-space corners of the drawn buffer, clockwise from its origin.
    pub fn corners(&self) -> [Vec2; 4] {
        match self {
            DrawCommand::Tile {
                transform, bitmap, ..
            } => {
                let size = bitmap.size().as_vec2();
                [
                    Vec2::ZERO,
                    Vec2::new(size.x, 0.0),
                    size,
                    Vec2::new(0.0, size.y),
                ]
                .map(|p| transform.transform_point2(p))
            }
        }
    }
}

/// A list of draw commands representing the current frame.
pub type RenderList = Vec<DrawCommand>;
