//! Control-point handles drawn on top of the selection.
//!
//! Grips are drawn in control space so they keep a constant pixel size at
//! every zoom level.

use crate::canvas::{Brush, Pen, RenderContext, Space, to_kurbo_point};
use crate::error::RenderError;
use dv_core::{Color, ControlPointCapabilities, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GripState {
    #[default]
    Normal,
    /// Under the pointer or otherwise emphasised.
    Highlighted,
    /// Shown but not usable right now.
    Deactivated,
}

/// Visual form of a grip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripShape {
    /// Resize and rotate handles.
    Square,
    /// Connection and glue points.
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripStyle {
    pub radius: f64,
    pub fill: Color,
    pub border: Color,
    pub highlight: Color,
    pub inactive: Color,
    pub connection: Color,
    /// Square grips are drawn over round ones when a point is both.
    pub resize_on_top: bool,
}

impl GripStyle {
    /// Pen and brush for a grip in `state`.
    pub fn paint(&self, shape: GripShape, state: GripState) -> (Pen, Brush) {
        let accent = match shape {
            GripShape::Square => self.border,
            GripShape::Round => self.connection,
        };
        match state {
            GripState::Normal => (Pen::solid(accent, 1.0), Brush::Solid(self.fill)),
            GripState::Highlighted => (Pen::solid(accent, 1.0), Brush::Solid(self.highlight)),
            GripState::Deactivated => (
                Pen::solid(self.inactive, 1.0),
                Brush::Solid(self.fill.with_alpha(0x80)),
            ),
        }
    }
}

/// Grip shapes for a control point, bottom first.
pub fn grip_shapes(caps: ControlPointCapabilities, resize_on_top: bool) -> Vec<GripShape> {
    let square = caps.intersects(ControlPointCapabilities::RESIZE | ControlPointCapabilities::ROTATE);
    let round = caps.intersects(ControlPointCapabilities::CONNECT | ControlPointCapabilities::GLUE);
    match (square, round) {
        (true, true) if resize_on_top => vec![GripShape::Round, GripShape::Square],
        (true, true) => vec![GripShape::Square, GripShape::Round],
        (true, false) => vec![GripShape::Square],
        (false, true) => vec![GripShape::Round],
        (false, false) => Vec::new(),
    }
}

/// Draw one control point at viewport position `at`.
///
/// When a point carries both square and round forms, the lower one is
/// drawn larger so its outline stays visible around the upper one.
pub fn draw_grip(
    ctx: &mut RenderContext<'_>,
    at: Point,
    caps: ControlPointCapabilities,
    state: GripState,
    style: &GripStyle,
) -> Result<usize, RenderError> {
    let shapes = grip_shapes(caps, style.resize_on_top);
    let canvas = ctx.canvas(Space::Control)?;
    let center = to_kurbo_point(at);
    let count = shapes.len();
    for (i, shape) in shapes.into_iter().enumerate() {
        let grow = if count > 1 && i == 0 { 1.0 } else { 0.0 };
        let r = style.radius + grow;
        let (pen, brush) = style.paint(shape, state);
        match shape {
            GripShape::Square => {
                let rect = kurbo::Rect::new(center.x - r, center.y - r, center.x + r, center.y + r);
                canvas.fill_rect(rect, &brush);
                canvas.stroke_rect(rect, &pen);
            }
            GripShape::Round => {
                let radii = kurbo::Vec2::new(r, r);
                canvas.fill_ellipse(center, radii, &brush);
                canvas.stroke_ellipse(center, radii, &pen);
            }
        }
    }
    Ok(count)
}
