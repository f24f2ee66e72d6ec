//! # Image Transform
//!
//! The live affine transform mapping **Source Space** (image pixels) into
//! **View Space** (surface pixels). It only ever holds translation, uniform
//! scale and rotation.
//!
//! Every mutation *post-composes*: the new operation is applied after the
//! existing transform, in view space. Component values are derived from the
//! composed matrix rather than stored separately.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

/// Pan / zoom / rotation of the image inside the view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    matrix: Affine2,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            matrix: Affine2::IDENTITY,
        }
    }
}

impl ImageTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// The composed source-to-view matrix.
    pub fn matrix(&self) -> Affine2 {
        self.matrix
    }

    /// Back to identity. The only operation that does not post-compose.
    pub fn reset(&mut self) {
        self.matrix = Affine2::IDENTITY;
    }

    /// Translates by `delta` view pixels.
    pub fn translate_by(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO || !delta.is_finite() {
            return;
        }
        self.post(Affine2::from_translation(delta));
    }

    /// Scales by `factor` about `pivot` (view space).
    ///
    /// Non-positive or non-finite factors are ignored so the scale can never
    /// reach zero. No clamping happens here; zoom limits belong to the caller.
    pub fn scale_by(&mut self, factor: f32, pivot: Vec2) {
        if !(factor.is_finite() && factor > 0.0) || factor == 1.0 {
            return;
        }
        self.post(
            Affine2::from_translation(pivot)
                * Affine2::from_scale(Vec2::splat(factor))
                * Affine2::from_translation(-pivot),
        );
    }

    /// Rotates by `degrees` about `pivot` (view space).
    pub fn rotate_by(&mut self, degrees: f32, pivot: Vec2) {
        if degrees == 0.0 || !degrees.is_finite() {
            return;
        }
        self.post(
            Affine2::from_translation(pivot)
                * Affine2::from_angle(degrees.to_radians())
                * Affine2::from_translation(-pivot),
        );
    }

    /// View-space position of the source origin.
    pub fn translation(&self) -> Vec2 {
        self.matrix.translation
    }

    /// Uniform scale factor (length of the transformed x axis).
    pub fn scale(&self) -> f32 {
        self.matrix.matrix2.x_axis.length()
    }

    /// Rotation in degrees, in `(-180, 180]`.
    pub fn rotation_degrees(&self) -> f32 {
        let x_axis = self.matrix.matrix2.x_axis;
        x_axis.y.atan2(x_axis.x).to_degrees()
    }

    /// Moves the source origin to `target` in view space.
    pub fn set_translation(&mut self, target: Vec2) {
        self.translate_by(target - self.translation());
    }

    /// Sets the absolute scale, pivoting about the current translation point.
    pub fn set_scale(&mut self, target: f32) {
        if !(target.is_finite() && target > 0.0) {
            return;
        }
        let current = self.scale();
        self.scale_by(target / current, self.translation());
    }

    /// Sets the absolute rotation, pivoting about the current translation point.
    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotate_by(degrees - self.rotation_degrees(), self.translation());
    }

    /// Maps a source-space point into view space.
    pub fn source_to_view(&self, p: Vec2) -> Vec2 {
        self.matrix.transform_point2(p)
    }

    /// Maps a view-space point into source space.
    pub fn view_to_source(&self, p: Vec2) -> Vec2 {
        self.matrix.inverse().transform_point2(p)
    }

    fn post(&mut self, op: Affine2) {
        self.matrix = op * self.matrix;
    }
}
