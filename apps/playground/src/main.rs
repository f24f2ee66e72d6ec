use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use image::{Rgba, RgbaImage};
use macroquad::prelude as mq;
use tiled_canvas::{DrawCommand, PixelBuffer, PointerEvent, TileKey};
use tiled_engine::{EngineConfig, ImageRegionDecoder, TileEngine};

/// Size of the generated image when no file is given.
const SYNTHETIC_SIZE: (u32, u32) = (6000, 4000);

#[macroquad::main("Tiled Playground")]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!("Playground failed: {:?}", e);
    }
}

async fn run() -> anyhow::Result<()> {
    // 1. Decode workers live on their own runtime; macroquad owns this thread.
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let mut engine = TileEngine::new(EngineConfig::from_env(), runtime.handle().clone());
    engine.update_viewport_size(glam::Vec2::new(mq::screen_width(), mq::screen_height()));

    // 2. Image from argv, TILED_IMAGE, or a generated test card
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TILED_IMAGE").ok());
    match path {
        Some(path) => engine
            .open_image(&path)
            .with_context(|| format!("Failed to open {path}"))?,
        None => {
            tracing::info!("No image given, generating a test card");
            let decoder = ImageRegionDecoder::from_image(test_card(SYNTHETIC_SIZE))?;
            engine.set_image(Arc::new(decoder))?;
        }
    }

    let mut textures = TextureCache::default();
    let mut pointers = PointerTracker::default();
    let mut show_debug = true;

    loop {
        engine.update_viewport_size(glam::Vec2::new(mq::screen_width(), mq::screen_height()));

        // 3. Input
        for event in pointers.poll() {
            engine.handle_pointer(&event);
        }
        let (mx, my) = mq::mouse_position();
        let wheel = mq::mouse_wheel().1;
        if wheel != 0.0 {
            let factor = if wheel > 0.0 { 1.1 } else { 1.0 / 1.1 };
            engine.zoom_by(factor, glam::Vec2::new(mx, my));
        }
        if mq::is_key_pressed(mq::KeyCode::Q) {
            engine.rotate_by(-15.0, glam::Vec2::new(mx, my));
        }
        if mq::is_key_pressed(mq::KeyCode::E) {
            engine.rotate_by(15.0, glam::Vec2::new(mx, my));
        }
        if mq::is_key_pressed(mq::KeyCode::R) {
            engine.set_rotation(0.0);
        }
        if mq::is_key_pressed(mq::KeyCode::D) {
            show_debug = !show_debug;
        }

        // 4. Update
        let draw_list = engine.frame();
        textures.retain(&draw_list);

        // 5. Render
        mq::clear_background(mq::DARKGRAY);
        for cmd in &draw_list {
            textures.draw(cmd);
        }

        if show_debug && let Some(d) = engine.diagnostics() {
            let lines = [
                format!("top level {}  active level {}", d.top_level, d.active_level),
                format!("top sample {}  target sample {}", d.top_sample_size, d.target_sample_size),
                format!("tiles {}  {:.1} MB", d.active_tiles, d.decoded_megabytes()),
                format!(
                    "scale {:.3}  rotation {:.1}",
                    engine.transform().scale(),
                    engine.transform().rotation_degrees()
                ),
            ];
            for (i, line) in lines.iter().enumerate() {
                mq::draw_text(line, 10.0, 24.0 + 20.0 * i as f32, 20.0, mq::YELLOW);
            }
        }

        mq::next_frame().await
    }
}

/// GPU textures for the bitmaps currently on screen.
#[derive(Default)]
struct TextureCache {
    entries: HashMap<TileKey, (PixelBuffer, mq::Texture2D)>,
}

impl TextureCache {
    /// Drops textures whose tile left the list or whose bitmap was replaced.
    fn retain(&mut self, list: &[DrawCommand]) {
        let mut live: HashMap<TileKey, &PixelBuffer> = HashMap::new();
        for DrawCommand::Tile { key, bitmap, .. } in list {
            live.insert(*key, bitmap);
        }
        self.entries
            .retain(|key, (buffer, _)| live.get(key).is_some_and(|b| b.ptr_eq(buffer)));
    }

    fn draw(&mut self, cmd: &DrawCommand) {
        let DrawCommand::Tile {
            key,
            transform,
            bitmap,
            ..
        } = cmd;

        let Ok(width) = u16::try_from(bitmap.width()) else {
            tracing::warn!(?key, width = bitmap.width(), "Tile too wide for a texture");
            return;
        };
        let Ok(height) = u16::try_from(bitmap.height()) else {
            tracing::warn!(?key, height = bitmap.height(), "Tile too tall for a texture");
            return;
        };

        let (_, texture) = self.entries.entry(*key).or_insert_with(|| {
            let texture = mq::Texture2D::from_rgba8(width, height, bitmap.pixels());
            texture.set_filter(mq::FilterMode::Linear);
            (bitmap.clone(), texture)
        });

        // Affine is translation + uniform scale + rotation only.
        let origin = transform.translation;
        let x_axis = transform.matrix2.x_axis;
        let scale = x_axis.length();
        let size = bitmap.size().as_vec2() * scale;

        mq::draw_texture_ex(
            texture,
            origin.x,
            origin.y,
            mq::WHITE,
            mq::DrawTextureParams {
                dest_size: Some(mq::vec2(size.x, size.y)),
                rotation: x_axis.y.atan2(x_axis.x),
                pivot: Some(mq::vec2(origin.x, origin.y)),
                ..Default::default()
            },
        );
    }
}

/// Turns mouse drags and touches into ordered pointer events.
#[derive(Default)]
struct PointerTracker {
    /// Touch ids and positions in the order they went down.
    touches: Vec<(u64, glam::Vec2)>,
    mouse_down: bool,
}

impl PointerTracker {
    fn poll(&mut self) -> Vec<PointerEvent> {
        let touches = mq::touches();
        if !touches.is_empty() || !self.touches.is_empty() {
            return self.poll_touches(touches);
        }
        self.poll_mouse()
    }

    fn poll_mouse(&mut self) -> Vec<PointerEvent> {
        let (x, y) = mq::mouse_position();
        let p = glam::Vec2::new(x, y);
        let down = mq::is_mouse_button_down(mq::MouseButton::Left);
        let event = match (self.mouse_down, down) {
            (false, true) => Some(PointerEvent::down(p)),
            (true, true) => Some(PointerEvent::moved(vec![p])),
            (true, false) => Some(PointerEvent::up(p)),
            (false, false) => None,
        };
        self.mouse_down = down;
        event.into_iter().collect()
    }

    fn poll_touches(&mut self, touches: Vec<mq::Touch>) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        let mut moved = false;

        for touch in touches {
            let p = glam::Vec2::new(touch.position.x, touch.position.y);
            let slot = self.touches.iter().position(|(id, _)| *id == touch.id);
            match (touch.phase, slot) {
                (mq::TouchPhase::Started, None) => {
                    self.touches.push((touch.id, p));
                    events.push(if self.touches.len() == 1 {
                        PointerEvent::down(p)
                    } else {
                        PointerEvent::add(self.positions())
                    });
                }
                (mq::TouchPhase::Moved | mq::TouchPhase::Stationary, Some(i)) => {
                    moved |= self.touches[i].1 != p;
                    self.touches[i].1 = p;
                }
                (mq::TouchPhase::Ended | mq::TouchPhase::Cancelled, Some(i)) => {
                    self.touches[i].1 = p;
                    events.push(if self.touches.len() == 1 {
                        PointerEvent::up(p)
                    } else {
                        PointerEvent::remove(self.positions(), i)
                    });
                    self.touches.remove(i);
                }
                _ => {}
            }
        }

        if moved && !self.touches.is_empty() {
            events.push(PointerEvent::moved(self.positions()));
        }
        events
    }

    fn positions(&self) -> Vec<glam::Vec2> {
        self.touches.iter().map(|(_, p)| *p).collect()
    }
}

/// Checkerboard with a colour gradient, so zoom levels are easy to tell apart.
fn test_card((width, height): (u32, u32)) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let checker = ((x / 256) + (y / 256)) % 2 == 0;
        let fine = ((x / 8) + (y / 8)) % 2 == 0;
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        let b = if checker { 200 } else { 60 };
        let shade = if fine { 0 } else { 20 };
        Rgba([r.saturating_sub(shade), g.saturating_sub(shade), b, 255])
    })
}
