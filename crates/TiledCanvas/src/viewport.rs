//! # Viewport Mapping
//!
//! Projects the visible view rectangle back into **Source Space** so tiles
//! can be tested against it.
//!
//! Formula, per corner `c` of the view rect:
//! `Source = R(-rotation) * (c / scale) + R(-rotation) * (-translation / scale)`
//!
//! The result is the axis-aligned bounding box of the four mapped corners,
//! recomputed on every call since pan, zoom and rotation change per frame.

use glam::Vec2;

use crate::math::{Rect, rotate_about};
use crate::pyramid::{Pyramid, TileSpec};
use crate::transform::ImageTransform;

/// Source-space bounding box of a `viewport_size` view under `transform`.
pub fn source_viewport(viewport_size: Vec2, transform: &ImageTransform) -> Rect {
    let scale = transform.scale();
    let rotation = -transform.rotation_degrees();
    let far = viewport_size / scale;

    let offset = rotate_about(-transform.translation() / scale, Vec2::ZERO, rotation);
    let corners = [
        Vec2::ZERO,
        Vec2::new(far.x, 0.0),
        Vec2::new(0.0, far.y),
        far,
    ]
    .map(|corner| rotate_about(corner, Vec2::ZERO, rotation) + offset);

    Rect::bounding(&corners)
}

/// Tiles of `level` that overlap `viewport` (source space).
pub fn overlapping_tiles<'a>(
    pyramid: &'a Pyramid,
    level: u32,
    viewport: &'a Rect,
) -> impl Iterator<Item = &'a TileSpec> + 'a {
    pyramid
        .level(level)
        .iter()
        .filter(move |tile| tile.rect.to_rect().intersects(viewport))
}
