//! Per-shape drawing and hit testing.
//!
//! Concrete shape types plug in through [`ShapeRenderer`].
//! [`GeometricRenderer`] draws shapes from their bounds and control points
//! alone, which is enough for headless hosts and tests.

use crate::canvas::{Brush, Pen, RenderContext, Space, to_kurbo_point, to_kurbo_rect};
use crate::error::RenderError;
use crate::style_cache::StyleCache;
use dv_core::{Point, Shape, ShapeKind};

pub trait ShapeRenderer {
    /// Draw the shape body in diagram space.
    fn draw(
        &self,
        ctx: &mut RenderContext<'_>,
        shape: &Shape,
        styles: &mut StyleCache,
    ) -> Result<(), RenderError>;

    /// Draw the selection outline in diagram space.
    fn draw_outline(
        &self,
        ctx: &mut RenderContext<'_>,
        shape: &Shape,
        pen: &Pen,
    ) -> Result<(), RenderError>;

    /// Whether `p` (diagram units) touches the shape.
    fn contains_point(&self, shape: &Shape, p: Point, tolerance: i32) -> bool {
        shape.contains_point(p, tolerance)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeometricRenderer;

impl GeometricRenderer {
    fn polyline(shape: &Shape) -> Vec<kurbo::Point> {
        shape
            .control_points
            .iter()
            .filter(|cp| !cp.id.is_reference())
            .map(|cp| to_kurbo_point(cp.position))
            .collect()
    }
}

impl ShapeRenderer for GeometricRenderer {
    fn draw(
        &self,
        ctx: &mut RenderContext<'_>,
        shape: &Shape,
        styles: &mut StyleCache,
    ) -> Result<(), RenderError> {
        let pen = styles.pen(shape.styles.line.as_deref());
        let pen = Pen {
            width: ctx.pixels(pen.width),
            ..pen
        };
        let canvas = ctx.canvas(Space::Diagram)?;
        match shape.kind {
            ShapeKind::Planar | ShapeKind::Composite => {
                let brush: Brush = styles.brush(shape.styles.fill.as_deref());
                let rect = to_kurbo_rect(shape.bounds);
                if shape.type_name == "Ellipse" {
                    let radii = kurbo::Vec2::new(rect.width() / 2.0, rect.height() / 2.0);
                    canvas.fill_ellipse(rect.center(), radii, &brush);
                    canvas.stroke_ellipse(rect.center(), radii, &pen);
                } else {
                    canvas.fill_rect(rect, &brush);
                    canvas.stroke_rect(rect, &pen);
                }
            }
            ShapeKind::Linear => canvas.stroke_polyline(&Self::polyline(shape), &pen),
            // Members draw themselves.
            ShapeKind::Group => {}
        }
        Ok(())
    }

    fn draw_outline(
        &self,
        ctx: &mut RenderContext<'_>,
        shape: &Shape,
        pen: &Pen,
    ) -> Result<(), RenderError> {
        let pen = Pen {
            width: ctx.pixels(pen.width),
            ..*pen
        };
        let canvas = ctx.canvas(Space::Diagram)?;
        match shape.kind {
            ShapeKind::Linear => canvas.stroke_polyline(&Self::polyline(shape), &pen),
            ShapeKind::Group => {
                canvas.stroke_rect(to_kurbo_rect(shape.bounds), &Pen { dashed: true, ..pen })
            }
            ShapeKind::Planar | ShapeKind::Composite => {
                canvas.stroke_rect(to_kurbo_rect(shape.bounds), &pen)
            }
        }
        Ok(())
    }
}
