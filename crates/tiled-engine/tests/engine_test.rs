mod common;

use std::sync::{Arc, Mutex};

use common::{FakeDecoder, SOURCE, VIEWPORT, init_tracing, test_engine};
use glam::{UVec2, Vec2};
use tiled_canvas::{DrawCommand, PixelRect, PointerEvent, TileKey};
use tiled_engine::{EngineConfig, FrameDiagnostics, TileEngine, TileError, TileState};

fn keys(list: &[DrawCommand]) -> Vec<(TileKey, bool)> {
    list.iter()
        .map(|cmd| match cmd {
            DrawCommand::Tile { key, is_top, .. } => (*key, *is_top),
        })
        .collect()
}

fn assert_no_overlap_between_levels(engine: &TileEngine, expected_level: u32) {
    // Every non-top tile that is still decoding belongs to the active level.
    let top = TileKey::new(engine.top_level().unwrap(), 0);
    for (key, state) in engine.tile_states() {
        if key != top && state == TileState::Decoding {
            assert_eq!(key.level, expected_level, "Stale decode for {key:?}");
        }
    }
}

#[tokio::test]
async fn test_load_builds_pyramid_and_fits() {
    init_tracing();
    let config = EngineConfig {
        debounce_ms: 0,
        ..Default::default()
    };
    let mut engine = TileEngine::new(config, tokio::runtime::Handle::current());
    engine.set_viewport_source(Some(Box::new(|| Vec2::new(1080.0, 1920.0))));

    // 1. Load: pyramid against the viewport, image fitted by width.
    let decoder = Arc::new(FakeDecoder::new(UVec2::new(11785, 7741)));
    engine.set_image(decoder.clone()).unwrap();
    assert_eq!(engine.top_level(), Some(2));
    assert_eq!(engine.pyramid().unwrap().tile_count(), 21);
    assert!((engine.transform().scale() - 1080.0 / 11785.0).abs() < 1e-6);
    assert_eq!(engine.transform().translation(), Vec2::ZERO);
    assert!(engine.take_repaint_request());
    assert!(!engine.take_repaint_request());

    // 2. Only the top tile decodes, right away.
    assert_eq!(engine.tile_states(), vec![(TileKey::new(2, 0), TileState::Decoding)]);
    engine.wait_for_decodes().await;
    assert_eq!(decoder.calls(), 1);

    // 3. The first frame draws the whole image from the top tile.
    let list = engine.frame();
    assert_eq!(keys(&list), vec![(TileKey::new(2, 0), true)]);
    assert_eq!(engine.top_sample_size(), Some(4));
    let corners = list[0].corners();
    assert!((corners[2] - Vec2::new(1080.0, 7741.0 * 1080.0 / 11785.0)).length() < 0.5);
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test]
async fn test_zoom_in_decodes_visible_tiles() {
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;

    // 1. 1:1 at the origin: only level-0 tile 0 is visible.
    engine.set_scale(1.0);
    engine.frame();
    assert_eq!(
        engine.tile_states(),
        vec![
            (TileKey::new(2, 0), TileState::Decoded),
            (TileKey::new(0, 0), TileState::Decoding),
        ]
    );

    // 2. Once decoded it is drawn on top of the fallback, unscaled.
    engine.wait_for_decodes().await;
    let list = engine.frame();
    assert_eq!(
        keys(&list),
        vec![(TileKey::new(2, 0), true), (TileKey::new(0, 0), false)]
    );
    let corners = list[1].corners();
    assert_eq!(corners[0], Vec2::ZERO);
    assert_eq!(corners[2], Vec2::splat(1000.0));
    assert_eq!(decoder.calls(), 2);
}

#[tokio::test]
async fn test_level_change_keeps_decoded_tiles_of_other_levels() {
    let mut engine = test_engine();
    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.wait_for_decodes().await;
    engine.set_scale(1.0);
    engine.frame();
    engine.wait_for_decodes().await;
    engine.frame();

    // 1. Zoom out to level 1: the decoded level-0 tile keeps backing the view.
    engine.set_scale(0.5);
    let list = engine.frame();
    assert_eq!(
        engine.tile_states(),
        vec![
            (TileKey::new(2, 0), TileState::Decoded),
            (TileKey::new(0, 0), TileState::Decoded),
            (TileKey::new(1, 0), TileState::Decoding),
        ]
    );
    assert_eq!(
        keys(&list),
        vec![(TileKey::new(2, 0), true), (TileKey::new(0, 0), false)]
    );
    assert_no_overlap_between_levels(&engine, 1);

    // 2. Level 1 is decoded too; the level-0 tile stays cached.
    engine.wait_for_decodes().await;
    engine.frame();
    assert_eq!(
        engine.tile_states(),
        vec![
            (TileKey::new(2, 0), TileState::Decoded),
            (TileKey::new(0, 0), TileState::Decoded),
            (TileKey::new(1, 0), TileState::Decoded),
        ]
    );

    // 3. Back on level 0 but elsewhere: now it is out of view at its own level.
    engine.set_scale(1.0);
    engine.set_translation(Vec2::splat(-3000.0));
    engine.frame();
    let states = engine.tile_states();
    assert!(!states.iter().any(|(key, _)| *key == TileKey::new(0, 0)));
    assert!(states.contains(&(TileKey::new(1, 0), TileState::Decoded)));
    assert!(states.contains(&(TileKey::new(0, 15), TileState::Decoding)));
}

#[tokio::test]
async fn test_level_round_trip_reuses_cached_tiles() {
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;

    // 1. Level 0 tile decoded.
    engine.set_scale(1.0);
    engine.frame();
    engine.wait_for_decodes().await;
    engine.frame();
    assert_eq!(decoder.calls(), 2);

    // 2. Zoom out to the top level: the tile stays in the active set and is drawn.
    engine.set_scale(0.25);
    let list = engine.frame();
    assert_eq!(
        engine.tile_states(),
        vec![
            (TileKey::new(2, 0), TileState::Decoded),
            (TileKey::new(0, 0), TileState::Decoded),
        ]
    );
    assert_eq!(
        keys(&list),
        vec![(TileKey::new(2, 0), true), (TileKey::new(0, 0), false)]
    );

    // 3. Zoom back in: nothing to decode.
    engine.set_scale(1.0);
    engine.frame();
    assert_eq!(engine.in_flight(), 0);
    engine.wait_for_decodes().await;
    assert_eq!(decoder.calls(), 2);
    assert!(engine.tile_states().contains(&(TileKey::new(0, 0), TileState::Decoded)));
}

#[tokio::test]
async fn test_stale_level_decodes_are_dropped() {
    let mut engine = test_engine();
    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.wait_for_decodes().await;

    // Request level 0, then leave for level 1 before it finishes.
    engine.set_scale(1.0);
    engine.frame();
    engine.set_scale(0.5);
    engine.frame();
    assert_no_overlap_between_levels(&engine, 1);

    engine.wait_for_decodes().await;
    engine.frame();
    let states = engine.tile_states();
    assert!(!states.iter().any(|(key, _)| key.level == 0));
    assert!(states.contains(&(TileKey::new(1, 0), TileState::Decoded)));
}

#[tokio::test]
async fn test_render_order_coarse_to_fine() {
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;

    // 1. Level 1 fully decoded.
    engine.set_scale(0.5);
    engine.frame();
    engine.wait_for_decodes().await;
    engine.frame();

    // 2. 1:1 straddling level-0 tiles 0 and 1; tile 1 keeps failing.
    decoder.fail_region(PixelRect::new(UVec2::new(1000, 0), UVec2::new(2000, 1000)));
    engine.set_scale(1.0);
    engine.set_translation(Vec2::new(-750.0, 0.0));
    engine.frame();
    engine.wait_for_decodes().await;

    // 3. Level 1 still backs the failed tile; draw order is top, level 1, level 0.
    let list = engine.frame();
    assert_eq!(
        keys(&list),
        vec![
            (TileKey::new(2, 0), true),
            (TileKey::new(1, 0), false),
            (TileKey::new(0, 0), false),
        ]
    );
    // The failed tile was retried on this reconcile.
    assert!(engine.tile_states().contains(&(TileKey::new(0, 1), TileState::Decoding)));
}

#[tokio::test]
async fn test_failed_decode_returns_tile_to_free() {
    init_tracing();
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;

    decoder.set_failing(true);
    engine.set_scale(1.0);
    engine.frame();
    engine.wait_for_decodes().await;
    assert_eq!(engine.tile_states(), vec![(TileKey::new(2, 0), TileState::Decoded)]);
    assert_eq!(engine.in_flight(), 0);

    // Retried only on the next reconcile.
    decoder.set_failing(false);
    engine.frame();
    engine.wait_for_decodes().await;
    engine.frame();
    assert!(engine.tile_states().contains(&(TileKey::new(0, 0), TileState::Decoded)));
    assert_eq!(decoder.calls(), 3);
}

#[tokio::test]
async fn test_top_tile_sharpens_when_zooming_in() {
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));

    // 1. Initial top decode fails; the top tile has nothing to show.
    decoder.set_failing(true);
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;
    assert_eq!(engine.tile_states(), vec![(TileKey::new(2, 0), TileState::Free)]);
    assert_eq!(engine.in_flight(), 0);
    decoder.set_failing(false);

    // 2. Far zoomed out: the retry uses the coarser factor.
    engine.set_scale(1.0 / 32.0);
    engine.frame();
    engine.wait_for_decodes().await;
    assert_eq!(engine.top_sample_size(), Some(32));

    // 3. Zooming back in asks for a sharper top tile.
    engine.set_scale(0.125);
    engine.frame();
    assert_eq!(engine.tile_states(), vec![(TileKey::new(2, 0), TileState::Decoding)]);
    // The coarse bitmap stays on screen meanwhile.
    assert_eq!(engine.frame().len(), 1);
    engine.wait_for_decodes().await;
    engine.frame();
    assert_eq!(engine.top_sample_size(), Some(8));

    // 4. A superseded request never lands.
    engine.set_scale(0.25);
    engine.frame();
    engine.set_scale(0.0625);
    engine.frame();
    engine.wait_for_decodes().await;
    engine.frame();
    assert_eq!(engine.top_sample_size(), Some(16));
}

#[tokio::test]
async fn test_unavailable_source_keeps_current_image() {
    let mut engine = test_engine();
    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.wait_for_decodes().await;
    engine.set_scale(0.5);

    let result = engine.set_image(Arc::new(FakeDecoder::new(UVec2::new(0, 100))));
    assert!(matches!(result, Err(TileError::SourceUnavailable(_))));
    let result = engine.open_image("/definitely/not/here.png");
    assert!(matches!(result, Err(TileError::SourceUnavailable(_))));

    assert_eq!(engine.source_size(), SOURCE);
    assert_eq!(engine.transform().scale(), 0.5);
    assert_eq!(engine.top_sample_size(), Some(4));
}

#[tokio::test]
async fn test_remove_image_releases_everything() {
    let mut engine = test_engine();
    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.set_scale(1.0);
    engine.frame();

    engine.remove_image();
    assert!(!engine.has_image());
    assert_eq!(engine.source_size(), UVec2::ZERO);
    assert!(engine.tile_states().is_empty());
    assert!(engine.frame().is_empty());
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(engine.diagnostics(), None);

    // Late completions from the old image are ignored.
    assert_eq!(engine.poll_completions(), 0);
}

#[tokio::test]
async fn test_pinch_without_distance_change_is_a_noop() {
    let mut engine = test_engine();
    let decoder = Arc::new(FakeDecoder::new(SOURCE));
    engine.set_image(decoder.clone()).unwrap();
    engine.wait_for_decodes().await;
    engine.frame();
    engine.take_repaint_request();
    let before = *engine.transform();

    let pair = vec![Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0)];
    assert!(!engine.handle_pointer(&PointerEvent::down(pair[0])));
    assert!(!engine.handle_pointer(&PointerEvent::add(pair.clone())));
    assert!(!engine.handle_pointer(&PointerEvent::moved(pair)));

    assert_eq!(*engine.transform(), before);
    assert!(!engine.take_repaint_request());
    engine.frame();
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_zoom_respects_limits() {
    let mut engine = test_engine();
    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.take_repaint_request();
    let scale = engine.transform().scale();

    assert!(!engine.zoom_by(1.0, Vec2::ZERO));
    assert!(!engine.zoom_by(1000.0, Vec2::ZERO));
    assert!(!engine.zoom_by(0.01, Vec2::ZERO));
    assert_eq!(engine.transform().scale(), scale);

    assert!(engine.zoom_by(2.0, VIEWPORT / 2.0));
    assert!((engine.transform().scale() - scale * 2.0).abs() < 1e-6);
    assert!(engine.take_repaint_request());
}

#[tokio::test]
async fn test_diagnostics_reach_debug_sink() {
    let mut engine = test_engine();
    let seen: Arc<Mutex<Vec<FrameDiagnostics>>> = Arc::default();
    let sink = Arc::clone(&seen);
    engine.set_debug_sink(Some(Box::new(move |d: &FrameDiagnostics| {
        sink.lock().unwrap().push(*d);
    })));

    engine.set_image(Arc::new(FakeDecoder::new(SOURCE))).unwrap();
    engine.wait_for_decodes().await;
    engine.frame();

    let expected = FrameDiagnostics {
        top_level: 2,
        active_level: 2,
        top_sample_size: 4,
        target_sample_size: 8,
        active_tiles: 1,
        decoded_bytes: 1000 * 1000 * 4,
    };
    assert_eq!(engine.diagnostics(), Some(expected));
    assert_eq!(seen.lock().unwrap().as_slice(), &[expected]);
    assert!((expected.decoded_megabytes() - 3.814).abs() < 1e-3);
}
