//! # Gesture Controller
//!
//! Turns a stream of `PointerEvent`s into post-composed updates of an
//! `ImageTransform`. Behaviour is pluggable through `TouchBehavior`; hosts
//! that want different gestures substitute their own implementation.

use glam::Vec2;

use crate::config::{GestureFlags, ViewConfig};
use crate::input::{PointerAction, PointerEvent};
use crate::math::wrap_degrees;
use crate::transform::ImageTransform;

/// A gesture policy with a single entry point.
pub trait TouchBehavior: Send {
    /// Currently enabled gestures.
    fn capabilities(&self) -> GestureFlags;

    fn set_capabilities(&mut self, flags: GestureFlags);

    /// Pivot used for scale / rotate when panning is disabled.
    fn set_fixed_pivot(&mut self, _pivot: Vec2) {}

    /// Applies `event` to `transform`. Returns `true` if the transform changed.
    fn apply(&mut self, event: &PointerEvent, transform: &mut ImageTransform) -> bool;
}

/// Pan with the centroid, pinch to scale, twist to rotate.
#[derive(Clone, Debug)]
pub struct DefaultTouchBehavior {
    flags: GestureFlags,
    min_scale: f32,
    max_scale: f32,
    /// Image centre after the initial fit (View Space).
    fixed_pivot: Vec2,
    /// Centroid of the first two pointers at the last event.
    centroid: Vec2,
    /// Distance between the first two pointers at the last event.
    distance: f32,
    /// Angle in degrees of the line between the first two pointers.
    angle: f32,
}

impl Default for DefaultTouchBehavior {
    fn default() -> Self {
        Self::new(&ViewConfig::default())
    }
}

impl DefaultTouchBehavior {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            flags: config.gestures,
            min_scale: config.min_scale.min(config.max_scale),
            max_scale: config.max_scale.max(config.min_scale),
            fixed_pivot: Vec2::ZERO,
            centroid: Vec2::ZERO,
            distance: 0.0,
            angle: 0.0,
        }
    }

    fn resample(&mut self, event: &PointerEvent) {
        let points: Vec<Vec2> = event.remaining().take(2).collect();
        if let Some(c) = centroid(&points) {
            self.centroid = c;
        }
        if let [a, b] = points[..] {
            self.distance = a.distance(b);
            self.angle = angle_degrees(a, b);
        }
    }

    fn pivot(&self) -> Vec2 {
        if self.flags.contains(GestureFlags::PAN) {
            self.centroid
        } else {
            self.fixed_pivot
        }
    }

    fn on_move(&mut self, event: &PointerEvent, transform: &mut ImageTransform) -> bool {
        let mut changed = false;
        let points: Vec<Vec2> = event.pointers.iter().take(2).copied().collect();
        let Some(new_centroid) = centroid(&points) else {
            return false;
        };

        // Panning
        let delta = new_centroid - self.centroid;
        if self.flags.contains(GestureFlags::PAN) && delta != Vec2::ZERO {
            transform.translate_by(delta);
            changed = true;
        }
        self.centroid = new_centroid;

        let [a, b] = points[..] else {
            return changed;
        };

        // Scaling
        let new_distance = a.distance(b);
        if self.flags.contains(GestureFlags::SCALE) && self.distance > 0.0 {
            let ratio = new_distance / self.distance;
            let target = transform.scale() * ratio;
            if ratio.is_finite()
                && ratio > 0.0
                && ratio != 1.0
                && (self.min_scale..=self.max_scale).contains(&target)
            {
                transform.scale_by(ratio, self.pivot());
                changed = true;
            }
        }
        self.distance = new_distance;

        // Rotating
        let new_angle = angle_degrees(a, b);
        if self.flags.contains(GestureFlags::ROTATE) {
            let delta = wrap_degrees(new_angle - self.angle);
            if delta != 0.0 {
                transform.rotate_by(delta, self.pivot());
                changed = true;
            }
        }
        self.angle = new_angle;

        changed
    }
}

impl TouchBehavior for DefaultTouchBehavior {
    fn capabilities(&self) -> GestureFlags {
        self.flags
    }

    fn set_capabilities(&mut self, flags: GestureFlags) {
        self.flags = flags;
    }

    fn set_fixed_pivot(&mut self, pivot: Vec2) {
        self.fixed_pivot = pivot;
    }

    fn apply(&mut self, event: &PointerEvent, transform: &mut ImageTransform) -> bool {
        match event.action {
            PointerAction::Down | PointerAction::Add | PointerAction::Remove => {
                self.resample(event);
                false
            }
            PointerAction::Move => self.on_move(event, transform),
            PointerAction::Up | PointerAction::Cancel => {
                self.centroid = Vec2::ZERO;
                false
            }
        }
    }
}

/// Mean of up to two points.
fn centroid(points: &[Vec2]) -> Option<Vec2> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().copied().sum::<Vec2>() / points.len() as f32)
}

/// Angle of the line from `b` to `a` in degrees.
fn angle_degrees(a: Vec2, b: Vec2) -> f32 {
    let d = a - b;
    d.y.atan2(d.x).to_degrees()
}
