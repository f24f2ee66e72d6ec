//! # Geometry Helpers
//!
//! Axis-aligned rectangles in floating point (view / source space) and in
//! whole pixels (tile source regions), plus the rotation helper shared by the
//! viewport mapper and the render pass.

use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in floating point coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Smallest rectangle containing every point in `points`.
    ///
    /// Returns a zero-sized rectangle at the origin when `points` is empty.
    pub fn bounding(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(Vec2::ZERO, Vec2::ZERO);
        };
        let (min, max) = points
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Self { min, max }
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }
}

/// A rectangle in whole source-image pixels, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub min: UVec2,
    pub max: UVec2,
}

impl PixelRect {
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    pub fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn to_rect(&self) -> Rect {
        Rect {
            min: self.min.as_vec2(),
            max: self.max.as_vec2(),
        }
    }
}

/// Rotates `point` about `pivot` by `degrees` (positive = x axis towards y axis).
pub fn rotate_about(point: Vec2, pivot: Vec2, degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let d = point - pivot;
    Vec2::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos) + pivot
}

/// Wraps an angle difference into `(-180, 180]`.
pub fn wrap_degrees(delta: f32) -> f32 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}
