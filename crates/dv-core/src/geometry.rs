//! Integer geometry for diagram and viewport coordinates.
//!
//! Diagram units and viewport pixels are both integral. Rectangles are
//! stored as origin + extent. Float types exist only for intermediate
//! transform math.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Round half away from zero and saturate into `i32`.
pub fn round_to_i32(v: f64) -> i32 {
    // `f64::round` rounds half away from zero; `as` saturates.
    v.round() as i32
}

// ─── Point ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.hypot(dy)
    }

    pub fn to_f(self) -> PointF {
        PointF::new(self.x.into(), self.y.into())
    }
}

/// Floating point coordinate used by transform math.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Round each axis independently, half away from zero.
    pub fn round(self) -> Point {
        Point::new(round_to_i32(self.x), round_to_i32(self.y))
    }
}

// ─── Size ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Area in square units, widened so large viewports cannot overflow.
    pub fn area(self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }
}

// ─── Rect ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    /// The rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::from_ltrb(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn from_point(p: Point) -> Self {
        Self::new(p.x, p.y, 0, 0)
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Build from float components, rejecting NaN/infinite values and
    /// negative extents. Used at API boundaries that accept floats.
    pub fn try_from_f64(x: f64, y: f64, width: f64, height: f64) -> Result<Self, CoreError> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(CoreError::NonFinite {
                context: "rectangle",
            });
        }
        let r = Self::new(
            round_to_i32(x),
            round_to_i32(y),
            round_to_i32(width),
            round_to_i32(height),
        );
        r.validate()?;
        Ok(r)
    }

    /// Reject inverted rectangles (negative width or height).
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.width < 0 || self.height < 0 {
            return Err(CoreError::invalid_rect(
                self.x,
                self.y,
                self.width,
                self.height,
            ));
        }
        Ok(self)
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// A rectangle with no area. Degenerate (zero-extent) rectangles still
    /// have a position and are valid invalidation inputs once inflated.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Inclusive containment on all edges.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// AABB overlap. Touching edges count as intersecting so that
    /// zero-width rectangles (vertical lines) still hit.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let l = self.x.max(other.x);
        let t = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        (l <= r && t <= b).then(|| Rect::from_ltrb(l, t, r, b))
    }

    /// Smallest rectangle covering both. Degenerate operands are points
    /// or segments and still contribute their position.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn inflate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_sub(dx),
            self.y.saturating_sub(dy),
            self.width.saturating_add(dx.saturating_mul(2)),
            self.height.saturating_add(dy.saturating_mul(2)),
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}

/// Union of a sequence of rectangles, `None` for an empty sequence.
pub fn union_all<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
    rects
        .into_iter()
        .reduce(|acc, r| acc.union(&r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to_i32(2.5), 3);
        assert_eq!(round_to_i32(-2.5), -3);
        assert_eq!(round_to_i32(2.49), 2);
        assert_eq!(round_to_i32(-0.4), 0);
    }

    #[test]
    fn offsets_saturate_at_the_coordinate_limits() {
        let p = Point::new(i32::MAX - 1, i32::MIN + 1);
        assert_eq!(p.offset(10, -10), Point::new(i32::MAX, i32::MIN));

        let r = Rect::new(i32::MAX - 5, 0, 4, 4);
        assert_eq!(r.offset(100, 0).x, i32::MAX);
        assert_eq!(r.right(), i32::MAX - 1);

        let grown = Rect::new(i32::MIN + 1, 0, i32::MAX - 1, 10).inflate(4, 4);
        assert_eq!(grown.x, i32::MIN);
        assert_eq!(grown.width, i32::MAX);
    }

    #[test]
    fn union_keeps_degenerate_rects() {
        // A zero-size rect at a real position is a point, not "nothing".
        let p = Rect::new(50, 50, 0, 0);
        let r = Rect::new(10, 10, 5, 5);
        assert_eq!(r.union(&p), Rect::from_ltrb(10, 10, 50, 50));
    }

    #[test]
    fn union_all_of_nothing_is_none() {
        assert_eq!(union_all(std::iter::empty()), None);
        assert_eq!(
            union_all([Rect::new(0, 0, 1, 1), Rect::new(4, 4, 1, 1)]),
            Some(Rect::new(0, 0, 5, 5))
        );
    }

    #[test]
    fn union_covers_both() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, -5, 5, 5);
        assert_eq!(a.union(&b), Rect::from_ltrb(0, -5, 25, 10));
    }

    #[test]
    fn try_from_f64_rejects_nan_and_inverted() {
        assert!(Rect::try_from_f64(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(Rect::try_from_f64(0.0, 0.0, -3.0, 1.0).is_err());
        assert_eq!(
            Rect::try_from_f64(0.4, 0.6, 10.5, 2.0).unwrap(),
            Rect::new(0, 1, 11, 2)
        );
    }

    #[test]
    fn from_corners_normalizes() {
        let r = Rect::from_corners(Point::new(30, 5), Point::new(10, 25));
        assert_eq!(r, Rect::new(10, 5, 20, 20));
    }

    #[test]
    fn intersection_of_disjoint_is_none() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 5, 5);
        assert!(a.intersection(&b).is_none());
        assert!(!a.intersects(&b));
    }
}
