//! # Tiles
//!
//! Per-tile decode state, stored in a flat arena indexed by `(level, index)`.
//! Cancelling or evicting a tile is an index lookup, never pointer chasing.
//!
//! State machine:
//! `Free -> Decoding -> Decoded`, and `Decoding | Decoded -> Free`.

use serde::{Deserialize, Serialize};
use tiled_canvas::{PixelBuffer, Pyramid, TileKey, TileSpec};
use tokio_util::sync::CancellationToken;

use crate::error::TileError;
use crate::scheduler::{Completion, DecodeRequest};

/// Decode state of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileState {
    Free,
    Decoding,
    Decoded,
}

/// A tile and whatever it currently holds.
#[derive(Debug)]
pub struct Tile {
    spec: TileSpec,
    state: TileState,
    bitmap: Option<PixelBuffer>,
    /// Subsampling factor of `bitmap` (or of the next decode if none yet).
    sample_size: u32,
    /// Factor the next decode should use. Only differs from `spec` for the top tile.
    desired_sample_size: u32,
    request: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    sample_size: u32,
    cancel: CancellationToken,
}

impl Tile {
    fn new(spec: TileSpec) -> Self {
        Self {
            spec,
            state: TileState::Free,
            bitmap: None,
            sample_size: spec.sample_size,
            desired_sample_size: spec.sample_size,
            request: None,
        }
    }

    pub fn key(&self) -> TileKey {
        self.spec.key
    }

    pub fn spec(&self) -> &TileSpec {
        &self.spec
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn bitmap(&self) -> Option<&PixelBuffer> {
        self.bitmap.as_ref()
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn desired_sample_size(&self) -> u32 {
        self.desired_sample_size
    }

    pub(crate) fn set_desired_sample_size(&mut self, sample_size: u32) {
        self.desired_sample_size = sample_size.max(1);
    }

    /// Sample size of the decode in flight, if any.
    pub fn requested_sample_size(&self) -> Option<u32> {
        self.request.as_ref().map(|r| r.sample_size)
    }

    pub fn byte_count(&self) -> usize {
        self.bitmap.as_ref().map_or(0, PixelBuffer::byte_count)
    }

    /// Marks the tile as decoding under `request`. An existing bitmap is kept
    /// until the new one is committed.
    pub(crate) fn begin_decode(&mut self, request: DecodeRequest) {
        self.cancel_request();
        self.request = Some(InFlight {
            ticket: request.ticket,
            sample_size: request.sample_size,
            cancel: request.cancel,
        });
        self.state = TileState::Decoding;
    }

    /// Cancels any decode in flight, releases the bitmap and returns to `Free`.
    pub(crate) fn free(&mut self) {
        self.cancel_request();
        self.bitmap = None;
        self.sample_size = self.spec.sample_size;
        self.state = TileState::Free;
    }

    /// Cancels any decode in flight and falls back to whatever the tile held
    /// before it: `Decoded` if a bitmap is still present, otherwise `Free`.
    pub(crate) fn abandon_decode(&mut self) {
        self.cancel_request();
        self.state = if self.bitmap.is_some() {
            TileState::Decoded
        } else {
            TileState::Free
        };
    }

    /// Checks whether `completion` answers the request currently in flight.
    ///
    /// `requires_desired` additionally demands that the decoded sample size is
    /// still the one wanted (top tile only).
    pub(crate) fn accepts(
        &self,
        completion: &Completion,
        requires_desired: bool,
    ) -> Result<(), TileError> {
        let current = self
            .request
            .as_ref()
            .filter(|_| self.state == TileState::Decoding)
            .is_some_and(|r| r.ticket == completion.ticket);
        let wanted = !requires_desired || completion.sample_size == self.desired_sample_size;
        if current && wanted {
            Ok(())
        } else {
            Err(TileError::StaleDecode(self.spec.key))
        }
    }

    /// Swaps in a decoded bitmap. Caller must have checked `accepts`.
    pub(crate) fn finish(&mut self, bitmap: PixelBuffer, sample_size: u32) {
        self.request = None;
        self.bitmap = Some(bitmap);
        self.sample_size = sample_size;
        self.state = TileState::Decoded;
    }

    fn cancel_request(&mut self) {
        if let Some(request) = self.request.take() {
            request.cancel.cancel();
        }
    }
}

/// Every tile of one pyramid.
#[derive(Debug)]
pub struct TileArena {
    levels: Vec<Vec<Tile>>,
    top_level: u32,
}

impl TileArena {
    pub fn new(pyramid: &Pyramid) -> Self {
        Self {
            levels: pyramid
                .levels()
                .map(|tiles| tiles.iter().copied().map(Tile::new).collect())
                .collect(),
            top_level: pyramid.top_level(),
        }
    }

    pub fn get(&self, key: TileKey) -> Option<&Tile> {
        self.levels
            .get(key.level as usize)
            .and_then(|tiles| tiles.get(key.index as usize))
    }

    pub fn get_mut(&mut self, key: TileKey) -> Option<&mut Tile> {
        self.levels
            .get_mut(key.level as usize)
            .and_then(|tiles| tiles.get_mut(key.index as usize))
    }

    pub fn state(&self, key: TileKey) -> TileState {
        self.get(key).map_or(TileState::Free, Tile::state)
    }

    pub fn top_key(&self) -> TileKey {
        TileKey::new(self.top_level, 0)
    }

    pub fn top(&self) -> &Tile {
        &self.levels[self.top_level as usize][0]
    }

    pub fn top_mut(&mut self) -> &mut Tile {
        &mut self.levels[self.top_level as usize][0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.levels.iter().flatten()
    }

    /// Frees every tile, cancelling all in-flight decodes.
    pub fn free_all(&mut self) {
        self.levels.iter_mut().flatten().for_each(Tile::free);
    }
}
