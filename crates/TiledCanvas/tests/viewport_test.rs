use glam::{UVec2, Vec2};
use tiled_canvas::level::{active_level, target_sample_size};
use tiled_canvas::viewport::{overlapping_tiles, source_viewport};
use tiled_canvas::{ImageTransform, MAX_TOP_LEVEL, Pyramid, Rect, TileKey};

fn assert_rect_eq(a: Rect, b: Rect) {
    assert!(
        (a.min - b.min).length() < 1e-2 && (a.max - b.max).length() < 1e-2,
        "{a:?} != {b:?}"
    );
}

#[test]
fn test_identity_maps_view_rect() {
    let rect = source_viewport(Vec2::new(800.0, 600.0), &ImageTransform::new());
    assert_rect_eq(rect, Rect::new(Vec2::ZERO, Vec2::new(800.0, 600.0)));
}

#[test]
fn test_zoomed_out_and_panned() {
    let mut t = ImageTransform::new();
    t.scale_by(0.5, Vec2::ZERO);
    t.translate_by(Vec2::new(100.0, 50.0));

    // Source point at view (0,0) is (-100,-50)/0.5.
    let rect = source_viewport(Vec2::new(800.0, 600.0), &t);
    assert_rect_eq(
        rect,
        Rect {
            min: Vec2::new(-200.0, -100.0),
            max: Vec2::new(1400.0, 1100.0),
        },
    );
}

#[test]
fn test_rotation_uses_bounding_box() {
    let mut t = ImageTransform::new();
    t.rotate_by(90.0, Vec2::ZERO);
    t.translate_by(Vec2::new(600.0, 0.0));

    // A quarter turn swaps the axes: the 800x600 view sees a 600x800 source area.
    let rect = source_viewport(Vec2::new(800.0, 600.0), &t);
    assert_rect_eq(
        rect,
        Rect {
            min: Vec2::new(0.0, -200.0),
            max: Vec2::new(600.0, 600.0),
        },
    );

    // Every corner of the view must fall inside the mapped rect.
    for corner in [Vec2::ZERO, Vec2::new(800.0, 0.0), Vec2::new(0.0, 600.0), Vec2::new(800.0, 600.0)] {
        let p = t.view_to_source(corner);
        assert!(rect.min.x - 1e-2 <= p.x && p.x <= rect.max.x + 1e-2);
        assert!(rect.min.y - 1e-2 <= p.y && p.y <= rect.max.y + 1e-2);
    }
}

#[test]
fn test_active_level_for_powers_of_half() {
    for k in 0..6 {
        let scale = 0.5f32.powi(k);
        assert_eq!(active_level(scale, 2), (k as u32).min(2), "scale {scale}");
    }
    // Zoomed in past 1:1 stays on full resolution.
    assert_eq!(active_level(4.0, 2), 0);
    assert_eq!(active_level(0.7, 2), 0);
    assert_eq!(active_level(0.3, 2), 1);
}

#[test]
fn test_target_sample_size_ignores_top_level() {
    assert_eq!(target_sample_size(2.0), 1);
    assert_eq!(target_sample_size(1.0), 1);
    assert_eq!(target_sample_size(0.5), 2);
    assert_eq!(target_sample_size(0.1), 8);
    assert_eq!(target_sample_size(0.0625), 16);
}

#[test]
fn test_overlapping_tiles() {
    let pyramid = Pyramid::build(UVec2::new(8000, 8000), UVec2::new(1000, 1000), MAX_TOP_LEVEL);
    // Level 0 tiles are 2000x2000.
    let viewport = Rect {
        min: Vec2::new(1500.0, 100.0),
        max: Vec2::new(2500.0, 900.0),
    };
    let keys: Vec<TileKey> = overlapping_tiles(&pyramid, 0, &viewport)
        .map(|t| t.key)
        .collect();
    assert_eq!(keys, vec![TileKey::new(0, 0), TileKey::new(0, 1)]);

    // Touching the edge does not count.
    let edge = Rect {
        min: Vec2::new(0.0, 0.0),
        max: Vec2::new(2000.0, 2000.0),
    };
    assert_eq!(overlapping_tiles(&pyramid, 0, &edge).count(), 1);
}
