//! # Tile Engine
//!
//! The main entry point. One `TileEngine` per viewer: it owns the transform,
//! the gesture policy, the decode scheduler and the tile cache of the loaded
//! image, and turns them into a `RenderList` every frame.

use std::path::Path;
use std::sync::Arc;

use glam::{UVec2, Vec2};
use tiled_canvas::level::active_level;
use tiled_canvas::viewport::source_viewport;
use tiled_canvas::{
    DefaultTouchBehavior, ImageTransform, PointerEvent, Pyramid, RenderList, TileKey,
    TouchBehavior,
};
use tokio::runtime::Handle;

use crate::cache::TileCache;
use crate::config::EngineConfig;
use crate::decoder::{ImageRegionDecoder, RegionDecoder};
use crate::diagnostics::{DebugSink, FrameDiagnostics};
use crate::error::{Result, TileError};
use crate::scheduler::{DecodeScheduler, ViewportSnapshot};
use crate::tile::TileState;

/// Supplies the surface size the engine draws into.
///
/// Hosts whose visible region is owned by another widget install one of these
/// instead of pushing sizes through `update_viewport_size`.
pub trait ViewportSource: Send {
    fn viewport_size(&self) -> Vec2;
}

impl<F> ViewportSource for F
where
    F: Fn() -> Vec2 + Send,
{
    fn viewport_size(&self) -> Vec2 {
        self()
    }
}

/// Tiled renderer for a single very large image.
pub struct TileEngine {
    config: EngineConfig,
    transform: ImageTransform,
    touch: Box<dyn TouchBehavior>,
    viewport_size: Vec2,
    viewport_source: Option<Box<dyn ViewportSource>>,
    scheduler: DecodeScheduler,
    image: Option<TileCache>,
    debug_sink: Option<Box<dyn DebugSink>>,
    diagnostics: Option<FrameDiagnostics>,
    repaint: bool,
}

impl TileEngine {
    /// Creates an engine that spawns decode tasks on `runtime`.
    pub fn new(config: EngineConfig, runtime: Handle) -> Self {
        let touch = Box::new(DefaultTouchBehavior::new(&config.view));
        Self {
            config,
            transform: ImageTransform::default(),
            touch,
            viewport_size: Vec2::ZERO,
            viewport_source: None,
            scheduler: DecodeScheduler::new(runtime),
            image: None,
            debug_sink: None,
            diagnostics: None,
            repaint: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Image lifecycle ----

    /// Opens `path` with the `image` crate and loads it.
    ///
    /// On failure the current image, if any, stays loaded.
    pub fn open_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let decoder = ImageRegionDecoder::open(path)?;
        self.set_image(Arc::new(decoder))
    }

    /// Loads the image behind `decoder`, replacing the current one.
    ///
    /// Resets the transform, rebuilds the pyramid, fits the image into the
    /// viewport and starts decoding the top tile.
    pub fn set_image(&mut self, decoder: Arc<dyn RegionDecoder>) -> Result<()> {
        let size = decoder.size();
        if size.x == 0 || size.y == 0 {
            return Err(TileError::SourceUnavailable(format!(
                "image has no pixels ({}x{})",
                size.x, size.y
            )));
        }

        self.teardown();
        self.transform.reset();

        let viewport = self.viewport_size();
        let bound = self
            .config
            .display_bound()
            .unwrap_or_else(|| viewport.ceil().as_uvec2());
        let pyramid = Pyramid::build(size, bound, self.config.top_level_cap());
        tracing::info!(
            width = size.x,
            height = size.y,
            bound = ?bound,
            top_level = pyramid.top_level(),
            tiles = pyramid.tile_count(),
            "Image loaded"
        );

        if let Some(scale) = self.config.view.scale_type.fit_scale(size.as_vec2(), viewport) {
            self.transform.scale_by(scale, Vec2::ZERO);
            self.touch.set_fixed_pivot(size.as_vec2() * scale / 2.0);
        }

        let mut cache = TileCache::new(decoder, pyramid, self.config.debounce());
        cache.prime(&mut self.scheduler);
        self.image = Some(cache);
        self.publish_viewport();
        self.repaint = true;
        Ok(())
    }

    /// Releases every tile and forgets the current image.
    pub fn remove_image(&mut self) {
        if self.image.is_some() {
            tracing::info!("Image removed");
        }
        self.teardown();
        self.diagnostics = None;
        self.repaint = true;
    }

    fn teardown(&mut self) {
        if let Some(mut cache) = self.image.take() {
            cache.teardown();
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Source dimensions, zero when nothing is loaded.
    pub fn source_size(&self) -> UVec2 {
        self.image
            .as_ref()
            .map_or(UVec2::ZERO, |cache| cache.pyramid().source_size())
    }

    pub fn top_level(&self) -> Option<u32> {
        self.image.as_ref().map(TileCache::top_level)
    }

    pub fn pyramid(&self) -> Option<&Pyramid> {
        self.image.as_ref().map(TileCache::pyramid)
    }

    // ---- Viewport ----

    /// Updates the viewport size (e.g., on window resize).
    pub fn update_viewport_size(&mut self, size: Vec2) {
        self.viewport_size = size;
        self.publish_viewport();
    }

    /// Reads the viewport size from `source` instead of `update_viewport_size`.
    pub fn set_viewport_source(&mut self, source: Option<Box<dyn ViewportSource>>) {
        self.viewport_source = source;
        self.publish_viewport();
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_source
            .as_ref()
            .map_or(self.viewport_size, |source| source.viewport_size())
    }

    // ---- Transform ----

    pub fn transform(&self) -> &ImageTransform {
        &self.transform
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.transform.translate_by(delta);
        self.transform_changed();
    }

    /// Zooms by `factor` about `pivot` if the result stays within the
    /// configured scale limits. Returns whether the zoom was applied.
    pub fn zoom_by(&mut self, factor: f32, pivot: Vec2) -> bool {
        let target = self.transform.scale() * factor;
        let view = &self.config.view;
        if !(factor.is_finite() && factor > 0.0)
            || factor == 1.0
            || !(view.min_scale..=view.max_scale).contains(&target)
        {
            return false;
        }
        self.transform.scale_by(factor, pivot);
        self.transform_changed();
        true
    }

    pub fn rotate_by(&mut self, degrees: f32, pivot: Vec2) {
        self.transform.rotate_by(degrees, pivot);
        self.transform_changed();
    }

    pub fn set_translation(&mut self, target: Vec2) {
        self.transform.set_translation(target);
        self.transform_changed();
    }

    pub fn set_scale(&mut self, target: f32) {
        self.transform.set_scale(target);
        self.transform_changed();
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.transform.set_rotation(degrees);
        self.transform_changed();
    }

    // ---- Gestures ----

    /// Replaces the gesture policy.
    pub fn set_touch_behavior(&mut self, behavior: Box<dyn TouchBehavior>) {
        self.touch = behavior;
    }

    pub fn touch_behavior_mut(&mut self) -> &mut dyn TouchBehavior {
        self.touch.as_mut()
    }

    /// Feeds one pointer event to the gesture policy.
    /// Returns `true` if the transform changed.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        let changed = self.touch.apply(event, &mut self.transform);
        if changed {
            self.transform_changed();
        }
        changed
    }

    fn transform_changed(&mut self) {
        self.publish_viewport();
        self.repaint = true;
    }

    fn publish_viewport(&self) {
        if let Some(cache) = &self.image {
            let rect = source_viewport(self.viewport_size(), &self.transform);
            let level = active_level(self.transform.scale(), cache.top_level());
            self.scheduler.publish(ViewportSnapshot { rect, level });
        }
    }

    // ---- Frame ----

    /// The core update loop. Call once per frame from the host's draw cycle.
    ///
    /// Commits finished decodes, reconciles tiles against the viewport and
    /// returns the draw list for this frame.
    pub fn frame(&mut self) -> RenderList {
        self.poll_completions();

        let viewport_size = self.viewport_size();
        let Some(cache) = self.image.as_mut() else {
            return RenderList::new();
        };

        let scale = self.transform.scale();
        let rect = source_viewport(viewport_size, &self.transform);
        cache.reconcile(rect, scale, &mut self.scheduler);

        let list = cache.render(&self.transform);
        let diagnostics = cache.diagnostics(scale);
        tracing::trace!(?diagnostics, "Frame rendered");
        if let Some(sink) = self.debug_sink.as_mut() {
            sink.on_frame(&diagnostics);
        }
        self.diagnostics = Some(diagnostics);
        list
    }

    /// Commits every decode that has finished. Returns how many became visible.
    pub fn poll_completions(&mut self) -> usize {
        let mut committed = 0;
        while let Some(completion) = self.scheduler.try_next() {
            if let Some(cache) = self.image.as_mut()
                && cache.commit(completion)
            {
                committed += 1;
            }
        }
        if committed > 0 {
            self.repaint = true;
        }
        committed
    }

    /// Waits until no tile is decoding, committing results as they arrive.
    pub async fn wait_for_decodes(&mut self) {
        while self.in_flight() > 0 {
            let Some(completion) = self.scheduler.next().await else {
                return;
            };
            if let Some(cache) = self.image.as_mut()
                && cache.commit(completion)
            {
                self.repaint = true;
            }
        }
    }

    /// Tiles with a decode in flight.
    pub fn in_flight(&self) -> usize {
        self.image.as_ref().map_or(0, TileCache::in_flight)
    }

    /// Returns and clears the "something changed" flag.
    pub fn take_repaint_request(&mut self) -> bool {
        std::mem::take(&mut self.repaint)
    }

    // ---- Introspection ----

    pub fn set_debug_sink(&mut self, sink: Option<Box<dyn DebugSink>>) {
        self.debug_sink = sink;
    }

    /// Diagnostics of the last frame.
    pub fn diagnostics(&self) -> Option<FrameDiagnostics> {
        self.diagnostics
    }

    /// The top tile followed by the active set, with their states.
    pub fn tile_states(&self) -> Vec<(TileKey, TileState)> {
        let Some(cache) = &self.image else {
            return Vec::new();
        };
        let top = cache.top_tile();
        std::iter::once((top.key(), top.state()))
            .chain(cache.active().filter_map(|key| cache.tile(key).map(|t| (key, t.state()))))
            .collect()
    }

    /// Sample size the top tile is currently decoded at.
    pub fn top_sample_size(&self) -> Option<u32> {
        self.image.as_ref().map(|cache| cache.top_tile().sample_size())
    }
}
