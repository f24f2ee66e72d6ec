#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use glam::{UVec2, Vec2};
use tiled_canvas::{PixelBuffer, PixelRect};
use tiled_engine::decoder::subsampled_size;
use tiled_engine::{EngineConfig, RegionDecoder, Result, TileEngine, TileError};

/// 4000x4000 source against a 500x500 bound: top level 2, level 0 tiles of 1000px.
pub const SOURCE: UVec2 = UVec2::new(4000, 4000);
pub const VIEWPORT: Vec2 = Vec2::new(500.0, 500.0);

/// In-memory decoder that counts calls and can be told to fail.
pub struct FakeDecoder {
    size: UVec2,
    calls: AtomicUsize,
    fail_all: AtomicBool,
    fail_regions: Mutex<Vec<PixelRect>>,
}

impl FakeDecoder {
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            fail_regions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_region(&self, rect: PixelRect) {
        self.fail_regions.lock().unwrap().push(rect);
    }
}

impl RegionDecoder for FakeDecoder {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn decode_region(&self, rect: PixelRect, sample_size: u32) -> Result<PixelBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || self.fail_regions.lock().unwrap().contains(&rect) {
            return Err(TileError::DecodeFailed {
                rect,
                sample_size,
                reason: "injected failure".into(),
            });
        }
        Ok(PixelBuffer::filled(subsampled_size(rect, sample_size), [128, 64, 32, 255]))
    }
}

/// Engine with no debounce, a fixed display bound and a 500x500 viewport.
pub fn test_engine() -> TileEngine {
    let config = EngineConfig {
        debounce_ms: 0,
        display_bound: Some([500, 500]),
        ..Default::default()
    };
    let mut engine = TileEngine::new(config, tokio::runtime::Handle::current());
    engine.update_viewport_size(VIEWPORT);
    engine
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
