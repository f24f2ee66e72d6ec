//! # Configuration
//!
//! View behaviour: how an image is fitted on load, the zoom range gestures may
//! reach, and which gestures are enabled.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Independently toggleable gesture capabilities.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct GestureFlags: u8 {
        /// One or more fingers drag the image.
        const PAN = 1 << 0;
        /// Two fingers pinch to zoom.
        const SCALE = 1 << 1;
        /// Two fingers twist to rotate.
        const ROTATE = 1 << 2;
    }
}

impl Default for GestureFlags {
    fn default() -> Self {
        Self::all()
    }
}

// Serialized as raw bits, same as the other flag sets.
impl Serialize for GestureFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for GestureFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(GestureFlags::from_bits_truncate(bits))
    }
}

/// How a freshly loaded image is scaled into the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    /// Whole image visible; the tighter axis decides.
    #[default]
    FitInside,
    /// Image width matches the view width.
    FitHorizontal,
    /// Image height matches the view height.
    FitVertical,
}

impl ScaleType {
    /// Initial scale for an `image` sized source in a `viewport` sized view.
    ///
    /// Returns `None` when either size is empty.
    pub fn fit_scale(&self, image: Vec2, viewport: Vec2) -> Option<f32> {
        if image.x <= 0.0 || image.y <= 0.0 || viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        let scale = match self {
            ScaleType::FitInside => {
                let horizontal = viewport.x / image.x;
                if image.y * horizontal > viewport.y {
                    viewport.y / image.y
                } else {
                    horizontal
                }
            }
            ScaleType::FitHorizontal => viewport.x / image.x,
            ScaleType::FitVertical => viewport.y / image.y,
        };
        Some(scale)
    }
}

/// Configuration parameters for the view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Fit applied when an image is loaded. Default: `FitInside`.
    #[serde(default)]
    pub scale_type: ScaleType,
    /// Smallest scale pinch-zoom may reach. Default: 0.01.
    pub min_scale: f32,
    /// Largest scale pinch-zoom may reach. Default: 10.0.
    pub max_scale: f32,
    /// Enabled gestures. Default: all.
    #[serde(default)]
    pub gestures: GestureFlags,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            scale_type: ScaleType::FitInside,
            min_scale: 0.01,
            max_scale: 10.0,
            gestures: GestureFlags::all(),
        }
    }
}
