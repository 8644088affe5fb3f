//! Integration tests: coordinate mapping across the supported zoom range.

use dv_core::{Point, PointF, Rect, Transform};
use pretty_assertions::assert_eq;

const ZOOM_LEVELS: [u32; 10] = [1, 10, 33, 50, 75, 100, 150, 250, 1000, 4000];
const SCROLLS: [Point; 4] = [
    Point::new(0, 0),
    Point::new(-250, 130),
    Point::new(1234, -77),
    Point::new(5000, 5000),
];

fn transform(level: u32, scroll: Point, anchor: Point) -> Transform {
    let mut t = Transform::new();
    t.set_zoom_level(level);
    t.set_scroll_unclamped(scroll);
    t.set_anchor(anchor);
    t
}

fn sample_points() -> impl Iterator<Item = Point> {
    (-3..=3).flat_map(|i| (-3..=3).map(move |j| Point::new(i * 997 + 13, j * 613 - 7)))
}

fn within_one(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1
}

// ─── Round trip ──────────────────────────────────────────────────────────

/// Integer round trips start in the coarser space: diagram units at
/// zoom >= 100%, viewport pixels below that.
#[test]
fn integer_round_trip_within_one_unit() {
    for level in ZOOM_LEVELS {
        for scroll in SCROLLS {
            let t = transform(level, scroll, Point::new(17, 9));
            for p in sample_points() {
                let back = if level >= 100 {
                    t.to_diagram(t.to_viewport(p))
                } else {
                    t.to_viewport(t.to_diagram(p))
                };
                assert!(
                    within_one(back, p),
                    "zoom {level}% scroll {scroll:?}: {p:?} came back as {back:?}"
                );
            }
        }
    }
}

#[test]
fn float_round_trip_is_exact_up_to_epsilon() {
    for level in ZOOM_LEVELS {
        for scroll in SCROLLS {
            let t = transform(level, scroll, Point::new(-4, 250));
            for p in sample_points() {
                let pf = PointF::new(f64::from(p.x) + 0.25, f64::from(p.y) - 0.5);
                let back = t.to_diagram_f(t.to_viewport_f(pf));
                assert!((back.x - pf.x).abs() < 1e-6 && (back.y - pf.y).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn rect_round_trip_at_full_zoom_and_above() {
    for level in [100, 200, 400] {
        let t = transform(level, Point::new(40, 40), Point::new(3, 3));
        let r = Rect::new(10, -20, 300, 45);
        let back = t.rect_to_diagram(t.rect_to_viewport(r));
        assert_eq!(back, r);
    }
}

// ─── Scenario D ──────────────────────────────────────────────────────────

#[test]
fn half_zoom_with_anchor_offset() {
    let t = transform(50, Point::ORIGIN, Point::new(10, 10));
    assert_eq!(t.to_viewport(Point::new(100, 100)), Point::new(60, 60));
}

// ─── Anchor ──────────────────────────────────────────────────────────────

#[test]
fn zooming_out_recenters_the_diagram() {
    let mut t = Transform::new();
    t.set_draw_bounds(Rect::new(0, 0, 800, 600)).unwrap();
    let area = Rect::new(0, 0, 1000, 1000);

    t.recompute_anchor(area).unwrap();
    assert_eq!(t.anchor(), Point::new(0, 0));

    t.set_zoom_level(50);
    t.recompute_anchor(area).unwrap();
    assert_eq!(t.anchor(), Point::new(150, 50));
    assert_eq!(t.scroll(), Point::new(0, 0));
}
