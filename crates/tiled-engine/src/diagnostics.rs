//! # Diagnostics
//!
//! Per-frame counters for debugging overlays. Purely observational: nothing
//! in the engine reads them back.

use serde::{Deserialize, Serialize};

/// Snapshot taken after each render pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Coarsest pyramid level of the loaded image.
    pub top_level: u32,
    /// Level selected for the current zoom.
    pub active_level: u32,
    /// Subsampling factor of the top tile's bitmap.
    pub top_sample_size: u32,
    /// Subsampling factor the current zoom asks for.
    pub target_sample_size: u32,
    /// Active tiles, top tile included.
    pub active_tiles: usize,
    /// Bytes held by decoded bitmaps.
    pub decoded_bytes: usize,
}

impl FrameDiagnostics {
    pub fn decoded_megabytes(&self) -> f64 {
        self.decoded_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Receives diagnostics after every frame.
pub trait DebugSink: Send {
    fn on_frame(&mut self, diagnostics: &FrameDiagnostics);
}

impl<F> DebugSink for F
where
    F: FnMut(&FrameDiagnostics) + Send,
{
    fn on_frame(&mut self, diagnostics: &FrameDiagnostics) {
        self(diagnostics)
    }
}
