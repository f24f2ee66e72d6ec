//! # Engine Configuration
//!
//! Tuning for decode scheduling and pyramid sizing, plus the view behaviour
//! forwarded to `tiled_canvas`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use glam::UVec2;
use serde::{Deserialize, Serialize};
use tiled_canvas::{MAX_TOP_LEVEL, ViewConfig};

/// Configuration parameters for the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fit, zoom limits and gestures.
    #[serde(default)]
    pub view: ViewConfig,
    /// Delay before a tile decode actually starts. Default: 200ms.
    pub debounce_ms: u64,
    /// Highest pyramid level. Capped at `MAX_TOP_LEVEL`. Default: 2.
    pub max_top_level: u32,
    /// Surface size the pyramid is built against. `None` uses the viewport
    /// size at load time.
    #[serde(default)]
    pub display_bound: Option<[u32; 2]>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            debounce_ms: 200,
            max_top_level: MAX_TOP_LEVEL,
            display_bound: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `TILED_*` environment variables.
    ///
    /// Recognised: `TILED_DEBOUNCE_MS`, `TILED_MAX_TOP_LEVEL`,
    /// `TILED_DISPLAY_BOUND` (`WIDTHxHEIGHT`), `TILED_MIN_SCALE`,
    /// `TILED_MAX_SCALE`. Unparsable values are logged and skipped.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse("TILED_DEBOUNCE_MS") {
            config.debounce_ms = ms;
        }
        if let Some(level) = env_parse("TILED_MAX_TOP_LEVEL") {
            config.max_top_level = level;
        }
        if let Some(min) = env_parse("TILED_MIN_SCALE") {
            config.view.min_scale = min;
        }
        if let Some(max) = env_parse("TILED_MAX_SCALE") {
            config.view.max_scale = max;
        }
        if let Ok(raw) = env::var("TILED_DISPLAY_BOUND") {
            match parse_bound(&raw) {
                Some(bound) => config.display_bound = Some(bound),
                None => tracing::warn!(value = %raw, "Ignoring malformed TILED_DISPLAY_BOUND"),
            }
        }
        config
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn top_level_cap(&self) -> u32 {
        self.max_top_level.min(MAX_TOP_LEVEL)
    }

    pub fn display_bound(&self) -> Option<UVec2> {
        self.display_bound.map(UVec2::from_array)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

fn parse_bound(raw: &str) -> Option<[u32; 2]> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    Some([w.trim().parse().ok()?, h.trim().parse().ok()?])
}
