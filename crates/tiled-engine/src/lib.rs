//! # Tiled Engine
//!
//! Decoding and caching for `tiled_canvas`. Renders images of tens of
//! megapixels by decoding only the visible region, at the resolution the
//! current zoom needs.
//!
//! ## Mental Model
//! - **Frame thread**: `TileEngine::frame` commits finished decodes,
//!   reconciles tiles against the viewport and emits the draw list. It never
//!   blocks.
//! - **Decode tasks**: one tokio task per decoding tile, individually
//!   cancellable, debounced, reporting back through a channel.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod tile;

pub use config::EngineConfig;
pub use decoder::{ImageRegionDecoder, RegionDecoder};
pub use diagnostics::{DebugSink, FrameDiagnostics};
pub use engine::{TileEngine, ViewportSource};
pub use error::{Result, TileError};
pub use tile::TileState;
