//! # TiledCanvas
//!
//! `tiled_canvas` is the headless, synchronous half of a tiled image viewer.
//! It owns the mathematics and input handling, while decoding and caching
//! live in `tiled_engine` and drawing is delegated to the host application.
//!
//! ## Core Architecture
//! - **Transform (`src/transform.rs`)**: Source Space -> View Space affine (pan, zoom, rotation).
//! - **Pyramid (`src/pyramid.rs`)**: Resolution levels and per-tile source rectangles.
//! - **Level (`src/level.rs`)**: Zoom -> active level and subsampling factor.
//! - **Viewport (`src/viewport.rs`)**: Visible view rect projected into Source Space.
//! - **Gesture (`src/gesture.rs`)**: Pointer events -> transform updates.
//! - **Render (`src/render.rs`)**: Outputs a list of `DrawCommand`s for the host to render.

pub mod bitmap;
pub mod config;
pub mod gesture;
pub mod input;
pub mod level;
pub mod math;
pub mod pyramid;
pub mod render;
pub mod transform;
pub mod viewport;

// Re-exports for convenience
pub use bitmap::PixelBuffer;
pub use config::{GestureFlags, ScaleType, ViewConfig};
pub use gesture::{DefaultTouchBehavior, TouchBehavior};
pub use input::{PointerAction, PointerEvent};
pub use math::{PixelRect, Rect};
pub use pyramid::{MAX_TOP_LEVEL, Pyramid, TileKey, TileSpec};
pub use render::{DrawCommand, RenderList};
pub use transform::ImageTransform;
