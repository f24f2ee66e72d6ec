//! # Tile Cache
//!
//! Owns the tiles of one loaded image and reconciles them against the viewport
//! once per frame. Reconciliation runs in a fixed order so ties never flicker:
//!
//! 1. Derive the viewport rectangle and the active level.
//! 2. Free active-level tiles that no longer overlap the viewport.
//! 3. Free tiles of other levels that are still decoding. Decoded tiles of
//!    other levels stay cached for a return to their level, and only step 2
//!    evicts them once that level is active again.
//! 4. Issue debounced decodes for visible active-level tiles that are free.
//! 5. Keep the top tile decoded at the sharpest factor the zoom needs.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use glam::{Affine2, Vec2};
use tiled_canvas::level::{active_level, target_sample_size};
use tiled_canvas::viewport::overlapping_tiles;
use tiled_canvas::{DrawCommand, ImageTransform, Pyramid, Rect, RenderList, TileKey};

use crate::decoder::RegionDecoder;
use crate::diagnostics::FrameDiagnostics;
use crate::scheduler::{Completion, DecodeJob, DecodeOutcome, DecodeScheduler, ViewportSnapshot};
use crate::tile::{Tile, TileArena, TileState};

/// Tiles, decode state and draw list for one image.
pub struct TileCache {
    decoder: Arc<dyn RegionDecoder>,
    pyramid: Pyramid,
    arena: TileArena,
    /// Tiles currently `Decoding` or `Decoded`, top tile excluded.
    active: BTreeSet<TileKey>,
    debounce: Duration,
}

impl TileCache {
    pub fn new(decoder: Arc<dyn RegionDecoder>, pyramid: Pyramid, debounce: Duration) -> Self {
        let arena = TileArena::new(&pyramid);
        Self {
            decoder,
            pyramid,
            arena,
            active: BTreeSet::new(),
            debounce,
        }
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub fn top_level(&self) -> u32 {
        self.pyramid.top_level()
    }

    pub fn tile(&self, key: TileKey) -> Option<&Tile> {
        self.arena.get(key)
    }

    pub fn top_tile(&self) -> &Tile {
        self.arena.top()
    }

    pub fn active(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.active.iter().copied()
    }

    /// Tiles with a decode in flight, top tile included.
    pub fn in_flight(&self) -> usize {
        self.arena
            .iter()
            .filter(|tile| tile.state() == TileState::Decoding)
            .count()
    }

    /// Starts the initial top tile decode, without debounce.
    pub fn prime(&mut self, scheduler: &mut DecodeScheduler) {
        let sample_size = self.arena.top().desired_sample_size();
        self.issue_top(scheduler, sample_size, Duration::ZERO);
    }

    /// Runs one reconciliation pass for `viewport` (Source Space) at `scale`.
    #[tracing::instrument(skip(self, scheduler), fields(level = tracing::field::Empty))]
    pub fn reconcile(&mut self, viewport: Rect, scale: f32, scheduler: &mut DecodeScheduler) {
        // 1. Viewport and level
        let top_level = self.pyramid.top_level();
        let level = active_level(scale, top_level);
        tracing::Span::current().record("level", level);
        scheduler.publish(ViewportSnapshot {
            rect: viewport,
            level,
        });

        // The top level is served by the top tile alone.
        let visible: BTreeSet<TileKey> = if level == top_level {
            BTreeSet::new()
        } else {
            overlapping_tiles(&self.pyramid, level, &viewport)
                .map(|spec| spec.key)
                .collect()
        };

        // 2 + 3. Out-of-view tiles at this level, in-flight tiles at others
        let stale: Vec<TileKey> = self
            .active
            .iter()
            .copied()
            .filter(|key| {
                if key.level == level {
                    !visible.contains(key)
                } else {
                    self.arena.state(*key) == TileState::Decoding
                }
            })
            .collect();
        for key in stale {
            self.free(key);
        }

        // 4. Issue decodes for visible free tiles
        for key in &visible {
            let Some(tile) = self.arena.get(*key) else {
                continue;
            };
            if tile.state() != TileState::Free {
                continue;
            }
            let spec = *tile.spec();
            let request = scheduler.issue(
                &self.decoder,
                DecodeJob {
                    key: spec.key,
                    rect: spec.rect,
                    sample_size: spec.sample_size,
                    delay: self.debounce,
                    recheck_overlap: true,
                },
            );
            if let Some(tile) = self.arena.get_mut(*key) {
                tile.begin_decode(request);
            }
            self.active.insert(*key);
        }

        // 5. Top tile
        self.reconcile_top(level, target_sample_size(scale), scheduler);
    }

    fn reconcile_top(&mut self, level: u32, target: u32, scheduler: &mut DecodeScheduler) {
        let top = self.arena.top_mut();
        if level == self.pyramid.top_level() {
            top.set_desired_sample_size(target);
        }
        let desired = top.desired_sample_size();

        match top.state() {
            TileState::Free => {
                let sample_size = top.sample_size().max(desired);
                top.set_desired_sample_size(sample_size);
                self.issue_top(scheduler, sample_size, Duration::ZERO);
            }
            TileState::Decoded if top.sample_size() > desired => {
                self.issue_top(scheduler, desired, self.debounce);
            }
            TileState::Decoding if top.requested_sample_size() != Some(desired) => {
                self.issue_top(scheduler, desired, self.debounce);
            }
            _ => {}
        }
    }

    fn issue_top(&mut self, scheduler: &mut DecodeScheduler, sample_size: u32, delay: Duration) {
        let spec = *self.arena.top().spec();
        let request = scheduler.issue(
            &self.decoder,
            DecodeJob {
                key: spec.key,
                rect: spec.rect,
                sample_size,
                delay,
                recheck_overlap: false,
            },
        );
        self.arena.top_mut().begin_decode(request);
    }

    fn free(&mut self, key: TileKey) {
        if let Some(tile) = self.arena.get_mut(key) {
            tracing::debug!(level = key.level, index = key.index, state = ?tile.state(), "Freeing tile");
            tile.free();
        }
        self.active.remove(&key);
    }

    /// Applies a finished decode. Returns `true` if a new bitmap became visible.
    pub fn commit(&mut self, completion: Completion) -> bool {
        let key = completion.key;
        let is_top = key == self.arena.top_key();
        let Some(tile) = self.arena.get_mut(key) else {
            return false;
        };

        if let Err(stale) = tile.accepts(&completion, is_top) {
            tracing::trace!(ticket = completion.ticket, "{stale}");
            return false;
        }

        match completion.outcome {
            DecodeOutcome::Decoded(bitmap) => {
                tracing::debug!(
                    level = key.level,
                    index = key.index,
                    sample_size = completion.sample_size,
                    bytes = bitmap.byte_count(),
                    "Tile decoded"
                );
                tile.finish(bitmap, completion.sample_size);
                true
            }
            DecodeOutcome::Failed(error) => {
                tracing::warn!(level = key.level, index = key.index, %error, "Tile decode failed");
                self.release_after_abort(key, is_top);
                false
            }
            DecodeOutcome::Aborted => {
                self.release_after_abort(key, is_top);
                false
            }
        }
    }

    fn release_after_abort(&mut self, key: TileKey, is_top: bool) {
        if is_top {
            self.arena.top_mut().abandon_decode();
        } else {
            self.free(key);
        }
    }

    /// Builds the draw list: top tile first, then decoded tiles coarse to fine.
    pub fn render(&self, transform: &ImageTransform) -> RenderList {
        let global = transform.matrix();
        let mut list = RenderList::new();

        let top = self.arena.top();
        if let Some(bitmap) = top.bitmap().filter(|b| b.width() > 0 && b.height() > 0) {
            let stretch = self.pyramid.source_size().as_vec2() / bitmap.size().as_vec2();
            list.push(DrawCommand::Tile {
                key: top.key(),
                transform: global * Affine2::from_scale(stretch),
                bitmap: bitmap.clone(),
                is_top: true,
            });
        }

        let mut decoded: Vec<&Tile> = self
            .active
            .iter()
            .filter_map(|key| self.arena.get(*key))
            .filter(|tile| tile.state() == TileState::Decoded)
            .collect();
        // BTreeSet order is ascending level; draw coarser levels first.
        decoded.sort_by(|a, b| b.key().level.cmp(&a.key().level));

        for tile in decoded {
            let Some(bitmap) = tile.bitmap() else {
                continue;
            };
            let origin = tile.spec().rect.min.as_vec2();
            let scale = Vec2::splat(tile.sample_size() as f32);
            list.push(DrawCommand::Tile {
                key: tile.key(),
                transform: global * Affine2::from_translation(origin) * Affine2::from_scale(scale),
                bitmap: bitmap.clone(),
                is_top: false,
            });
        }

        list
    }

    /// Observational counters for the current frame.
    pub fn diagnostics(&self, scale: f32) -> FrameDiagnostics {
        let top = self.arena.top();
        FrameDiagnostics {
            top_level: self.pyramid.top_level(),
            active_level: active_level(scale, self.pyramid.top_level()),
            top_sample_size: top.sample_size(),
            target_sample_size: target_sample_size(scale),
            active_tiles: 1 + self.active.len(),
            decoded_bytes: top.byte_count()
                + self
                    .active
                    .iter()
                    .filter_map(|key| self.arena.get(*key))
                    .map(Tile::byte_count)
                    .sum::<usize>(),
        }
    }

    /// Cancels every decode and releases every bitmap.
    pub fn teardown(&mut self) {
        self.arena.free_all();
        self.active.clear();
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.teardown();
    }
}
