//! Diagram ↔ viewport ↔ screen coordinate mapping.
//!
//! ```text
//! viewport = anchor + (diagram - scroll) * zoom
//! diagram  = (viewport - anchor) / zoom + scroll
//! screen   = viewport + screen_origin
//! ```
//!
//! Diagram coordinates are logical units, viewport coordinates are pixels
//! relative to the widget's top-left corner. Integer conversions round
//! half away from zero on each axis independently.

use crate::error::CoreError;
use crate::geometry::{Point, PointF, Rect, Size, round_to_i32};

/// Smallest zoom factor; keeps the inverse mapping finite at zoom 0%.
pub const MIN_ZOOM_FACTOR: f64 = 0.001;
/// Largest zoom level accepted by the public API, in percent.
pub const MAX_ZOOM_LEVEL: u32 = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    zoom_level: u32,
    zoom_factor: f64,
    /// Diagram coordinate shown at the anchor.
    scroll: Point,
    /// Viewport pixel where `scroll` is drawn.
    anchor: Point,
    /// Client area minus visible scrollbars, in viewport pixels.
    draw_bounds: Rect,
    /// Widget origin on screen.
    screen_origin: Point,
    /// Diagram area reachable by scrolling.
    scroll_area: Rect,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    pub fn new() -> Self {
        Self {
            zoom_level: 100,
            zoom_factor: 1.0,
            scroll: Point::ORIGIN,
            anchor: Point::ORIGIN,
            draw_bounds: Rect::EMPTY,
            screen_origin: Point::ORIGIN,
            scroll_area: Rect::EMPTY,
        }
    }

    // ─── State ───────────────────────────────────────────────────────────

    pub fn zoom_level(&self) -> u32 {
        self.zoom_level
    }

    pub fn zoom_factor(&self) -> f64 {
        self.zoom_factor
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn draw_bounds(&self) -> Rect {
        self.draw_bounds
    }

    pub fn screen_origin(&self) -> Point {
        self.screen_origin
    }

    pub fn scroll_area(&self) -> Rect {
        self.scroll_area
    }

    /// Set the zoom level in percent. Returns true if it changed.
    ///
    /// Callers recompute the anchor afterwards; the scroll position is
    /// left untouched.
    pub fn set_zoom_level(&mut self, level: u32) -> bool {
        if level == self.zoom_level {
            return false;
        }
        self.zoom_level = level;
        self.zoom_factor = (f64::from(level) / 100.0).max(MIN_ZOOM_FACTOR);
        true
    }

    pub fn set_anchor(&mut self, anchor: Point) {
        self.anchor = anchor;
    }

    pub fn set_screen_origin(&mut self, origin: Point) {
        self.screen_origin = origin;
    }

    pub fn set_draw_bounds(&mut self, bounds: Rect) -> Result<(), CoreError> {
        self.draw_bounds = bounds.validate()?;
        Ok(())
    }

    /// Place the diagram inside the draw area.
    ///
    /// On each axis, when the zoomed scroll area is narrower than the draw
    /// area the diagram is centered and scrolling is pinned; otherwise the
    /// anchor sits at the draw area's edge and scrolling ranges over the
    /// scroll area. The current scroll position is re-clamped.
    pub fn recompute_anchor(&mut self, scroll_area: Rect) -> Result<(), CoreError> {
        self.scroll_area = scroll_area.validate()?;
        let zoomed_w = f64::from(scroll_area.width) * self.zoom_factor;
        let zoomed_h = f64::from(scroll_area.height) * self.zoom_factor;
        let db = self.draw_bounds;

        let ax = if zoomed_w < f64::from(db.width) {
            db.x + round_to_i32((f64::from(db.width) - zoomed_w) / 2.0)
        } else {
            db.x
        };
        let ay = if zoomed_h < f64::from(db.height) {
            db.y + round_to_i32((f64::from(db.height) - zoomed_h) / 2.0)
        } else {
            db.y
        };
        self.anchor = Point::new(ax, ay);
        self.scroll = self.clamp_scroll(self.scroll);
        log::trace!(
            "anchor {:?} for scroll area {:?} at {}%",
            self.anchor,
            scroll_area,
            self.zoom_level
        );
        Ok(())
    }

    /// Draw area extent in diagram units.
    fn viewport_extent(&self) -> (i32, i32) {
        (
            round_to_i32(f64::from(self.draw_bounds.width) / self.zoom_factor),
            round_to_i32(f64::from(self.draw_bounds.height) / self.zoom_factor),
        )
    }

    /// Minimum and maximum scroll position per axis, as
    /// `[minimum, maximum - viewport_extent]`.
    pub fn scroll_limits(&self) -> (Point, Point) {
        let (ew, eh) = self.viewport_extent();
        let area = self.scroll_area;
        let min = area.origin();
        let max = Point::new(
            (area.right() - ew).max(area.x),
            (area.bottom() - eh).max(area.y),
        );
        (min, max)
    }

    fn clamp_scroll(&self, p: Point) -> Point {
        let (min, max) = self.scroll_limits();
        Point::new(p.x.clamp(min.x, max.x), p.y.clamp(min.y, max.y))
    }

    /// Scroll so that `target` (diagram units) is at the anchor, clamped
    /// per axis. Returns false when the clamped position equals the
    /// current one.
    pub fn scroll_to(&mut self, target: Point) -> bool {
        let clamped = self.clamp_scroll(target);
        if clamped == self.scroll {
            return false;
        }
        self.scroll = clamped;
        true
    }

    /// Set scroll without clamping. Used when no scroll area is known yet.
    pub fn set_scroll_unclamped(&mut self, scroll: Point) {
        self.scroll = scroll;
    }

    // ─── Integer conversions ─────────────────────────────────────────────

    pub fn to_viewport(&self, p: Point) -> Point {
        self.to_viewport_f(p.to_f()).round()
    }

    pub fn to_diagram(&self, p: Point) -> Point {
        self.to_diagram_f(p.to_f()).round()
    }

    /// Map both corners; the result covers the mapped area.
    pub fn rect_to_viewport(&self, r: Rect) -> Rect {
        let tl = self.to_viewport(r.origin());
        let br = self.to_viewport(Point::new(r.right(), r.bottom()));
        Rect::from_ltrb(tl.x, tl.y, br.x, br.y)
    }

    pub fn rect_to_diagram(&self, r: Rect) -> Rect {
        let tl = self.to_diagram(r.origin());
        let br = self.to_diagram(Point::new(r.right(), r.bottom()));
        Rect::from_ltrb(tl.x, tl.y, br.x, br.y)
    }

    pub fn size_to_viewport(&self, s: Size) -> Size {
        Size::new(
            self.distance_to_viewport(s.width),
            self.distance_to_viewport(s.height),
        )
    }

    pub fn size_to_diagram(&self, s: Size) -> Size {
        Size::new(
            self.distance_to_diagram(s.width),
            self.distance_to_diagram(s.height),
        )
    }

    pub fn distance_to_viewport(&self, d: i32) -> i32 {
        round_to_i32(f64::from(d) * self.zoom_factor)
    }

    pub fn distance_to_diagram(&self, d: i32) -> i32 {
        round_to_i32(f64::from(d) / self.zoom_factor)
    }

    // ─── Float conversions ───────────────────────────────────────────────

    pub fn to_viewport_f(&self, p: PointF) -> PointF {
        PointF::new(
            f64::from(self.anchor.x) + (p.x - f64::from(self.scroll.x)) * self.zoom_factor,
            f64::from(self.anchor.y) + (p.y - f64::from(self.scroll.y)) * self.zoom_factor,
        )
    }

    pub fn to_diagram_f(&self, p: PointF) -> PointF {
        PointF::new(
            (p.x - f64::from(self.anchor.x)) / self.zoom_factor + f64::from(self.scroll.x),
            (p.y - f64::from(self.anchor.y)) / self.zoom_factor + f64::from(self.scroll.y),
        )
    }

    /// Rejects NaN and infinite input instead of producing garbage.
    pub fn try_to_diagram_f(&self, p: PointF) -> Result<PointF, CoreError> {
        if !p.is_finite() {
            return Err(CoreError::NonFinite {
                context: "viewport point",
            });
        }
        Ok(self.to_diagram_f(p))
    }

    /// Diagram → viewport as affine coefficients `[a, b, c, d, e, f]`
    /// (the layout `kurbo::Affine::new` expects).
    pub fn affine_coeffs(&self) -> [f64; 6] {
        let z = self.zoom_factor;
        [
            z,
            0.0,
            0.0,
            z,
            f64::from(self.anchor.x) - f64::from(self.scroll.x) * z,
            f64::from(self.anchor.y) - f64::from(self.scroll.y) * z,
        ]
    }

    // ─── Screen ──────────────────────────────────────────────────────────

    pub fn viewport_to_screen(&self, p: Point) -> Point {
        p.offset(self.screen_origin.x, self.screen_origin.y)
    }

    pub fn screen_to_viewport(&self, p: Point) -> Point {
        p.offset(-self.screen_origin.x, -self.screen_origin.y)
    }

    pub fn diagram_to_screen(&self, p: Point) -> Point {
        self.viewport_to_screen(self.to_viewport(p))
    }

    pub fn screen_to_diagram(&self, p: Point) -> Point {
        self.to_diagram(self.screen_to_viewport(p))
    }

    pub fn rect_to_screen(&self, r: Rect) -> Rect {
        self.rect_to_viewport(r)
            .offset(self.screen_origin.x, self.screen_origin.y)
    }

    pub fn screen_rect_to_diagram(&self, r: Rect) -> Rect {
        self.rect_to_diagram(r.offset(-self.screen_origin.x, -self.screen_origin.y))
    }

    // ─── Zoom helpers ────────────────────────────────────────────────────

    /// Zoom level at which `area` fits into the draw area, clamped to
    /// `1..=MAX_ZOOM_LEVEL`.
    pub fn fit_zoom_level(&self, area: Rect) -> u32 {
        if area.is_empty() || self.draw_bounds.is_empty() {
            return self.zoom_level;
        }
        let zx = f64::from(self.draw_bounds.width) / f64::from(area.width);
        let zy = f64::from(self.draw_bounds.height) / f64::from(area.height);
        let level = (zx.min(zy) * 100.0).floor();
        (level as u32).clamp(1, MAX_ZOOM_LEVEL)
    }

    /// Scroll position that keeps diagram point `fixed` under viewport
    /// point `at` for the current zoom and anchor.
    pub fn scroll_keeping(&self, fixed: PointF, at: Point) -> Point {
        PointF::new(
            fixed.x - f64::from(at.x - self.anchor.x) / self.zoom_factor,
            fixed.y - f64::from(at.y - self.anchor.y) / self.zoom_factor,
        )
        .round()
    }
}

/// Snap each axis independently to the nearest grid line when it is
/// within `snap_distance` of it.
pub fn snap_to_grid(p: Point, grid_size: i32, snap_distance: i32) -> Point {
    if grid_size <= 0 {
        return p;
    }
    let snap = |v: i32| -> i32 {
        let nearest = round_to_i32(f64::from(v) / f64::from(grid_size)) * grid_size;
        if (nearest - v).abs() <= snap_distance {
            nearest
        } else {
            v
        }
    };
    Point::new(snap(p.x), snap(p.y))
}
