//! Shape model consumed by the viewport engine.
//!
//! Concrete shape types (boxes, polylines, pictures, ...) live outside this
//! crate. The engine only needs the data described here: bounds, control
//! points with capability flags, layer assignment and glue-point
//! connections. Parent/child ownership is stored in the [`Diagram`] arena,
//! not on the shape.
//!
//! [`Diagram`]: crate::diagram::Diagram

use crate::geometry::{Point, Rect};
use crate::id::{ControlPointId, LayerId, LayerIds, ShapeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::{BitAnd, BitOr, BitOrAssign};

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Helper to parse a single hex digit.
pub fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| -> Option<u8> { Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?) };

        match bytes.len() {
            3 => Some(Self::rgb(
                hex_val(bytes[0])? * 17,
                hex_val(bytes[1])? * 17,
                hex_val(bytes[2])? * 17,
            )),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

// ─── Control points ──────────────────────────────────────────────────────

/// What a control point can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControlPointCapabilities(u8);

impl ControlPointCapabilities {
    pub const NONE: Self = Self(0);
    pub const RESIZE: Self = Self(1 << 0);
    pub const ROTATE: Self = Self(1 << 1);
    /// Other shapes may glue to this point.
    pub const CONNECT: Self = Self(1 << 2);
    /// This point can glue to other shapes.
    pub const GLUE: Self = Self(1 << 3);
    pub const MOVABLE: Self = Self(1 << 4);
    /// The shape's reference (pivot) point.
    pub const REFERENCE: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b11_1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ControlPointCapabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ControlPointCapabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ControlPointCapabilities {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: ControlPointId,
    /// Position in diagram coordinates.
    pub position: Point,
    pub capabilities: ControlPointCapabilities,
}

impl ControlPoint {
    pub fn new(id: i32, position: Point, capabilities: ControlPointCapabilities) -> Self {
        Self {
            id: ControlPointId(id),
            position,
            capabilities,
        }
    }
}

// ─── Connections ─────────────────────────────────────────────────────────

/// A glue connection stored on the shape that owns the glue point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// The owning shape's glue point.
    pub own_point: ControlPointId,
    pub other_shape: ShapeId,
    /// `ControlPointId::REFERENCE` when glued to the whole shape.
    pub other_point: ControlPointId,
}

/// A connection seen from one of its two ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub own_point: ControlPointId,
    pub other_shape: ShapeId,
    pub other_point: ControlPointId,
}

impl ConnectionInfo {
    /// Whether the far end attaches to the other shape as a whole.
    pub fn targets_whole_shape(&self) -> bool {
        self.other_point.is_reference()
    }
}

// ─── Kinds ───────────────────────────────────────────────────────────────

/// Closed set of shape families the engine distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Area shapes (boxes, ellipses, pictures, text).
    Planar,
    /// Lines and connectors; hit-tested along their vertices.
    Linear,
    /// A shape that aggregates child shapes but draws itself too.
    Composite,
    /// A pure container; its members are selected as one unit.
    Group,
}

impl ShapeKind {
    pub fn is_group(self) -> bool {
        matches!(self, ShapeKind::Group)
    }

    pub fn is_linear(self) -> bool {
        matches!(self, ShapeKind::Linear)
    }
}

/// Style families a render-side style cache is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleKind {
    Cap,
    Color,
    Fill,
    Line,
    Character,
    Paragraph,
}

/// Named style references used by a shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRefs {
    pub line: Option<String>,
    pub fill: Option<String>,
    pub character: Option<String>,
}

/// Identifier of a model object attached to a shape (domain data behind
/// the graphics). Cut/copy "with models" carries it along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelObjectId(pub u64);

// ─── Shape ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    /// Concrete type name, e.g. `"Box"` or `"Polyline"`.
    pub type_name: String,
    /// Template the shape was created from, if any.
    pub template: Option<String>,
    /// Bounding rectangle in diagram coordinates.
    pub bounds: Rect,
    pub control_points: SmallVec<[ControlPoint; 8]>,
    pub home_layer: LayerId,
    pub supplemental_layers: LayerIds,
    /// Glue connections owned by this shape's glue points.
    pub connections: SmallVec<[Connection; 2]>,
    pub styles: StyleRefs,
    /// Caption text area in diagram coordinates.
    pub caption_bounds: Option<Rect>,
    pub model_object: Option<ModelObjectId>,
}

impl Shape {
    pub fn new(id: ShapeId, kind: ShapeKind, type_name: &str, bounds: Rect) -> Self {
        Self {
            id,
            kind,
            type_name: type_name.to_string(),
            template: None,
            bounds,
            control_points: SmallVec::new(),
            home_layer: LayerId::NONE,
            supplemental_layers: LayerIds::NONE,
            connections: SmallVec::new(),
            styles: StyleRefs::default(),
            caption_bounds: None,
            model_object: None,
        }
    }

    /// A planar box with the usual eight resize grips, four of them also
    /// connection points on the edge midpoints, and a center point that
    /// is both the reference point and the rotate handle.
    pub fn planar_box(id: ShapeId, bounds: Rect) -> Self {
        use ControlPointCapabilities as C;
        let mut shape = Self::new(id, ShapeKind::Planar, "Box", bounds);
        let (l, t, r, b) = (bounds.left(), bounds.top(), bounds.right(), bounds.bottom());
        let (cx, cy) = (bounds.center().x, bounds.center().y);
        let points = [
            (l, t, C::RESIZE),
            (cx, t, C::RESIZE | C::CONNECT),
            (r, t, C::RESIZE),
            (l, cy, C::RESIZE | C::CONNECT),
            (r, cy, C::RESIZE | C::CONNECT),
            (l, b, C::RESIZE),
            (cx, b, C::RESIZE | C::CONNECT),
            (r, b, C::RESIZE),
        ];
        for (i, (x, y, caps)) in points.into_iter().enumerate() {
            shape
                .control_points
                .push(ControlPoint::new(i as i32 + 1, Point::new(x, y), caps));
        }
        shape.control_points.push(ControlPoint::new(
            9,
            Point::new(cx, cy),
            C::REFERENCE | C::ROTATE,
        ));
        shape
    }

    /// A straight line between two glue-capable end points.
    pub fn line(id: ShapeId, from: Point, to: Point) -> Self {
        use ControlPointCapabilities as C;
        let mut shape = Self::new(id, ShapeKind::Linear, "Polyline", Rect::from_corners(from, to));
        shape
            .control_points
            .push(ControlPoint::new(1, from, C::GLUE | C::MOVABLE | C::RESIZE));
        shape
            .control_points
            .push(ControlPoint::new(2, to, C::GLUE | C::MOVABLE | C::RESIZE));
        shape
    }

    pub fn with_layers(mut self, home: LayerId, supplemental: LayerIds) -> Self {
        self.home_layer = home;
        self.supplemental_layers = supplemental;
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = Some(template.to_string());
        self
    }

    pub fn control_point(&self, id: ControlPointId) -> Option<&ControlPoint> {
        self.control_points.iter().find(|cp| cp.id == id)
    }

    pub fn has_capability(&self, id: ControlPointId, caps: ControlPointCapabilities) -> bool {
        self.control_point(id)
            .is_some_and(|cp| cp.capabilities.contains(caps))
    }

    /// Bounds covering the shape and every control point.
    pub fn bounds_with_points(&self) -> Rect {
        self.control_points
            .iter()
            .fold(self.bounds, |acc, cp| acc.union(&Rect::from_point(cp.position)))
    }

    /// Move the shape and its control points.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.bounds = self.bounds.offset(dx, dy);
        for cp in &mut self.control_points {
            cp.position = cp.position.offset(dx, dy);
        }
        if let Some(caption) = &mut self.caption_bounds {
            *caption = caption.offset(dx, dy);
        }
    }

    /// Glue the given point to `other` (whole shape when `other_point` is
    /// `REFERENCE`). Replaces any connection the point already had.
    pub fn connect(&mut self, own_point: ControlPointId, other: ShapeId, other_point: ControlPointId) {
        self.connections.retain(|c| c.own_point != own_point);
        self.connections.push(Connection {
            own_point,
            other_shape: other,
            other_point,
        });
    }

    pub fn disconnect(&mut self, own_point: ControlPointId) -> Option<Connection> {
        let pos = self
            .connections
            .iter()
            .position(|c| c.own_point == own_point)?;
        Some(self.connections.remove(pos))
    }

    /// Geometric hit test: planar shapes by bounds, linear shapes by
    /// distance to the polyline through their control points.
    pub fn contains_point(&self, p: Point, tolerance: i32) -> bool {
        match self.kind {
            ShapeKind::Linear => {
                let pts: SmallVec<[Point; 8]> =
                    self.control_points.iter().map(|cp| cp.position).collect();
                if pts.len() < 2 {
                    return self.bounds.inflate(tolerance, tolerance).contains(p);
                }
                pts.windows(2)
                    .any(|seg| distance_to_segment(p, seg[0], seg[1]) <= f64::from(tolerance))
            }
            ShapeKind::Planar | ShapeKind::Composite => {
                self.bounds.inflate(tolerance, tolerance).contains(p)
            }
            // Groups have no body of their own; members are hit instead.
            ShapeKind::Group => false,
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (f64::from(p.x), f64::from(p.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx).hypot(py - cy)
}

// ─── Layers ──────────────────────────────────────────────────────────────

/// A diagram layer definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub title: String,
    /// Lowest zoom level (percent) at which the layer is drawn.
    pub lower_zoom_threshold: u32,
    /// Highest zoom level (percent) at which the layer is drawn.
    pub upper_zoom_threshold: u32,
}

impl Layer {
    pub fn new(id: LayerId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            title: name.to_string(),
            lower_zoom_threshold: 0,
            upper_zoom_threshold: u32::MAX,
        }
    }

    pub fn with_zoom_thresholds(mut self, lower: u32, upper: u32) -> Self {
        self.lower_zoom_threshold = lower;
        self.upper_zoom_threshold = upper;
        self
    }

    pub fn shown_at(&self, zoom_level: u32) -> bool {
        (self.lower_zoom_threshold..=self.upper_zoom_threshold).contains(&zoom_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_roundtrip() {
        let c = Color::from_hex("#3366CC").unwrap();
        assert_eq!(c, Color::rgb(0x33, 0x66, 0xCC));
        assert_eq!(c.to_hex(), "#3366CC");
        assert_eq!(Color::from_hex("fff"), Some(Color::WHITE));
        assert_eq!(
            Color::from_hex("#00000080").map(|c| c.a),
            Some(0x80)
        );
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn capabilities_combine() {
        use ControlPointCapabilities as C;
        let caps = C::RESIZE | C::CONNECT;
        assert!(caps.contains(C::RESIZE));
        assert!(caps.intersects(C::CONNECT | C::GLUE));
        assert!(!caps.contains(C::RESIZE | C::GLUE));
    }

    #[test]
    fn line_hit_test_uses_segment_distance() {
        let line = Shape::line(ShapeId::intern("l"), Point::new(0, 0), Point::new(100, 0));
        assert!(line.contains_point(Point::new(50, 2), 3));
        assert!(!line.contains_point(Point::new(50, 10), 3));
        assert!(!line.contains_point(Point::new(110, 0), 3));
    }

    #[test]
    fn translate_moves_points_and_caption() {
        let mut shape = Shape::planar_box(ShapeId::intern("b"), Rect::new(0, 0, 10, 10));
        shape.caption_bounds = Some(Rect::new(1, 1, 8, 8));
        shape.translate(5, -5);
        assert_eq!(shape.bounds, Rect::new(5, -5, 10, 10));
        assert_eq!(shape.control_points[0].position, Point::new(5, -5));
        assert_eq!(shape.caption_bounds, Some(Rect::new(6, -4, 8, 8)));
    }

    #[test]
    fn connect_replaces_existing_glue() {
        let mut line = Shape::line(ShapeId::intern("l2"), Point::new(0, 0), Point::new(10, 0));
        line.connect(ControlPointId(1), ShapeId::intern("a"), ControlPointId::REFERENCE);
        line.connect(ControlPointId(1), ShapeId::intern("b"), ControlPointId(3));
        assert_eq!(line.connections.len(), 1);
        assert_eq!(line.connections[0].other_shape, ShapeId::intern("b"));
    }
}
