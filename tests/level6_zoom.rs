//! Level 6: Zoom & Sizing Tests
//!
//! Tests scaled hit testing, zoom-independent stored geometry, connection
//! geometry under zoom and content sizing.

mod common;

use common::harness::{cp, ip, CanvasHarness};
use common::CanvasEvent;
use proptest::prelude::*;
use slint_collection_canvas::{CanvasError, CanvasItem, LineRenderer, Point, Scalable, Size};

#[test]
fn test_zoom_keeps_stored_centers() {
    let mut harness = CanvasHarness::new();
    assert_eq!(harness.canvas.zoom_to_scale(2.0), 2.0);

    assert_eq!(harness.center(ip(0, 0)), Point::new(100.0, 100.0));
    assert_eq!(harness.scaled_center(ip(0, 0)), Point::new(200.0, 200.0));
    let connection = harness.canvas.connection_at(cp(ip(0, 0), ip(0, 1))).unwrap();
    assert_eq!(connection.visible_start(), Point::new(200.0, 200.0));
    assert_eq!(connection.visible_end(), Point::new(600.0, 200.0));
    assert_eq!(connection.center(), Point::new(200.0, 100.0));
}

#[test]
fn test_hit_testing_uses_scaled_space() {
    let mut harness = CanvasHarness::new();
    harness.canvas.zoom_to_scale(2.0);

    // Unscaled position of (0,0) is empty at this zoom
    assert_eq!(
        harness.canvas.touch_began(Point::new(100.0, 100.0)),
        Err(CanvasError::InvalidGestureTarget)
    );
    assert!(harness.tap(Point::new(200.0, 200.0)).is_ok());
    assert_eq!(harness.tracker.last(), Some(CanvasEvent::Selected(ip(0, 0))));
}

#[test]
fn test_drag_at_zoom_stores_unscaled_position() {
    let mut harness = CanvasHarness::new();
    harness.canvas.zoom_to_scale(2.0);
    harness.drag(Point::new(600.0, 600.0), Point::new(620.0, 640.0)).unwrap();

    assert_eq!(harness.center(ip(0, 2)), Point::new(310.0, 320.0));
    harness.canvas.zoom_to_scale(1.0);
    assert_eq!(harness.scaled_center(ip(0, 2)), Point::new(310.0, 320.0));
}

#[test]
fn test_create_handle_anchor_follows_zoom() {
    let mut harness = CanvasHarness::new();
    harness.canvas.zoom_to_scale(0.5);
    assert_eq!(harness.anchor(ip(0, 1)), Point::new(170.0, 50.0));

    harness
        .connect_by_touch(ip(0, 1), Point::new(150.0, 150.0))
        .unwrap();
    assert_eq!(
        harness.tracker.events(),
        vec![CanvasEvent::ConnectionAdded(cp(ip(0, 1), ip(0, 2)))]
    );
}

#[test]
fn test_zoom_during_connection_move_keeps_line_on_handle() {
    let mut harness = CanvasHarness::new();
    let midpoint = harness.midpoint(cp(ip(0, 0), ip(0, 1)));
    harness.canvas.touch_began(midpoint).unwrap();
    harness.canvas.touch_moved(Point::new(400.0, 400.0)).unwrap();

    harness.canvas.zoom_to_scale(2.0);
    let connection = harness.canvas.connection_at(cp(ip(0, 0), ip(0, 1))).unwrap();
    assert_eq!(connection.visible_start(), Point::new(200.0, 200.0));
    assert_eq!(connection.visible_end(), Point::new(800.0, 800.0));
}

#[test]
fn test_removal_line_is_rescaled_while_frozen() {
    let mut harness = CanvasHarness::new();
    harness
        .canvas
        .remove_connection(cp(ip(0, 0), ip(0, 1)))
        .unwrap();
    harness.canvas.zoom_to_scale(2.0);

    let mut lines = LineRenderer::new();
    lines.update(&harness.canvas);
    assert_eq!(lines.len(), 1);
    assert!(lines.lines()[0].commands.starts_with("M 200 200 L 600 200"));
}

#[test]
fn test_invalid_zoom_is_ignored() {
    let mut harness = CanvasHarness::new();
    harness.canvas.zoom_to_scale(1.5);
    assert_eq!(harness.canvas.zoom_to_scale(0.0), 1.5);
    assert_eq!(harness.canvas.zoom_to_scale(f32::INFINITY), 1.5);
    assert_eq!(harness.canvas.zoom_scale(), 1.5);
}

#[test]
fn test_size_canvas_to_fit() {
    let mut harness = CanvasHarness::new();
    assert_eq!(harness.canvas.size_canvas_to_fit(), Size::new(2048.0, 2048.0));

    harness.drag(Point::new(300.0, 300.0), Point::new(2500.0, 1800.0)).unwrap();
    // Node reaches (2540, 1825) unscaled, plus 100 padding
    assert_eq!(harness.canvas.size_canvas_to_fit(), Size::new(2640.0, 2048.0));

    harness.canvas.zoom_to_scale(0.5);
    assert_eq!(harness.canvas.size_canvas_to_fit(), Size::new(2048.0, 2048.0));
    harness.canvas.zoom_to_scale(2.0);
    assert_eq!(harness.canvas.size_canvas_to_fit(), Size::new(5280.0, 3850.0));
}

#[test]
fn test_empty_canvas_uses_minimum_size() {
    let mut harness = CanvasHarness::new();
    harness.canvas.clear_canvas();
    assert_eq!(harness.canvas.size_canvas_to_fit(), Size::new(2048.0, 2048.0));
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn prop_rescaling_matches_direct_scaling(
        x in -5000.0f32..5000.0,
        y in -5000.0f32..5000.0,
        s1 in 0.25f32..4.0,
        s2 in 0.25f32..4.0,
    ) {
        let point = Point::new(x, y);
        let via_s1 = point.scaled(s1).unscaled(s1).scaled(s2);
        let direct = point.scaled(s2);
        prop_assert!((via_s1.x - direct.x).abs() <= 1e-3 * direct.x.abs().max(1.0));
        prop_assert!((via_s1.y - direct.y).abs() <= 1e-3 * direct.y.abs().max(1.0));
    }

    #[test]
    fn prop_zoom_never_moves_stored_geometry(scales in prop::collection::vec(0.1f32..8.0, 1..8)) {
        let mut harness = CanvasHarness::new();
        for scale in scales {
            harness.canvas.zoom_to_scale(scale);
        }
        prop_assert_eq!(harness.center(ip(0, 0)), Point::new(100.0, 100.0));
        prop_assert_eq!(harness.center(ip(0, 2)), Point::new(300.0, 300.0));
        let scale = harness.canvas.zoom_scale();
        let connection = harness.canvas.connection_at(cp(ip(0, 0), ip(0, 1))).unwrap();
        prop_assert_eq!(connection.visible_end(), Point::new(300.0, 100.0).scaled(scale));
    }
}
