use thiserror::Error;
use tiled_canvas::{PixelRect, TileKey};

/// Errors produced while loading an image or decoding its tiles.
///
/// None of these are fatal to the engine: a failed load leaves the previous
/// image in place, a failed decode returns the tile to `Free`.
#[derive(Debug, Error)]
pub enum TileError {
    /// The source could not be opened or has no pixels.
    #[error("cannot open image source: {0}")]
    SourceUnavailable(String),

    /// The region decoder returned no buffer.
    #[error("region decode failed for {rect:?} at sample size {sample_size}: {reason}")]
    DecodeFailed {
        rect: PixelRect,
        sample_size: u32,
        reason: String,
    },

    /// A decode finished after being superseded. Never surfaced to users.
    #[error("decode for tile {0:?} was superseded")]
    StaleDecode(TileKey),
}

pub type Result<T> = std::result::Result<T, TileError>;
