//! Drawing-surface contract.
//!
//! The pipeline draws through [`RenderContext`], which tracks whether the
//! canvas currently maps diagram coordinates or raw control pixels and
//! refuses draw calls issued in the wrong space. Backends only implement
//! [`Canvas`].

use crate::error::RenderError;
use dv_core::{Color, Point, Rect, Transform};
use kurbo::Affine;

/// Coordinate space the canvas transform currently maps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Identity transform; coordinates are viewport pixels.
    Control,
    /// Zoom and scroll applied; coordinates are diagram units.
    Diagram,
}

/// Render pass stages in the order a frame runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Background,
    Sheet,
    Grid,
    Shapes,
    Outlines,
    Grips,
    Captions,
    Connections,
    ToolPreview,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color,
    pub width: f64,
    pub dashed: bool,
}

impl Pen {
    pub const fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dashed: false,
        }
    }

    pub const fn dashed(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dashed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brush {
    Solid(Color),
    /// Top-to-bottom gradient across the filled rectangle.
    VerticalGradient { top: Color, bottom: Color },
}

// ─── Canvas ──────────────────────────────────────────────────────────────

/// A drawing surface. Coordinates are interpreted through the transform
/// last passed to [`Canvas::set_transform`].
pub trait Canvas {
    fn set_transform(&mut self, transform: Affine);
    /// Intersect the clip with `rect` until the matching `pop_clip`.
    fn push_clip(&mut self, rect: kurbo::Rect);
    fn pop_clip(&mut self);
    fn fill_rect(&mut self, rect: kurbo::Rect, brush: &Brush);
    fn stroke_rect(&mut self, rect: kurbo::Rect, pen: &Pen);
    fn fill_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, brush: &Brush);
    fn stroke_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, pen: &Pen);
    fn stroke_polyline(&mut self, points: &[kurbo::Point], pen: &Pen);

    fn stroke_line(&mut self, from: kurbo::Point, to: kurbo::Point, pen: &Pen) {
        self.stroke_polyline(&[from, to], pen);
    }

    /// Marks the start of a pipeline stage. Backends may ignore it.
    fn begin_stage(&mut self, _stage: Stage) {}
}

pub fn to_kurbo_rect(r: Rect) -> kurbo::Rect {
    kurbo::Rect::new(
        f64::from(r.left()),
        f64::from(r.top()),
        f64::from(r.right()),
        f64::from(r.bottom()),
    )
}

pub fn to_kurbo_point(p: Point) -> kurbo::Point {
    kurbo::Point::new(f64::from(p.x), f64::from(p.y))
}

pub fn diagram_affine(transform: &Transform) -> Affine {
    Affine::new(transform.affine_coeffs())
}

// ─── Render context ──────────────────────────────────────────────────────

/// A canvas plus the current coordinate space.
pub struct RenderContext<'a> {
    canvas: &'a mut dyn Canvas,
    space: Space,
    diagram_transform: Affine,
    zoom: f64,
    clip_depth: usize,
}

impl<'a> RenderContext<'a> {
    /// Starts in control space with an identity transform.
    pub fn new(canvas: &'a mut dyn Canvas, transform: &Transform) -> Self {
        canvas.set_transform(Affine::IDENTITY);
        Self {
            canvas,
            space: Space::Control,
            diagram_transform: diagram_affine(transform),
            zoom: transform.zoom_factor(),
            clip_depth: 0,
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// Zoom factor of the diagram transform.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Width in diagram units that renders as `px` pixels.
    pub fn pixels(&self, px: f64) -> f64 {
        px / self.zoom
    }

    /// Switch to control space (identity transform).
    pub fn reset_transform(&mut self) {
        self.canvas.set_transform(Affine::IDENTITY);
        self.space = Space::Control;
    }

    /// Switch to diagram space (zoom and scroll applied).
    pub fn restore_transform(&mut self) {
        self.canvas.set_transform(self.diagram_transform);
        self.space = Space::Diagram;
    }

    /// The canvas, provided it is currently in `expected` space.
    pub fn canvas(&mut self, expected: Space) -> Result<&mut dyn Canvas, RenderError> {
        if self.space != expected {
            return Err(RenderError::WrongRenderSpace {
                expected,
                actual: self.space,
            });
        }
        Ok(&mut *self.canvas)
    }

    pub fn begin_stage(&mut self, stage: Stage) {
        log::trace!("render stage {stage:?} in {:?} space", self.space);
        self.canvas.begin_stage(stage);
    }

    pub fn push_clip(&mut self, rect: kurbo::Rect) {
        self.canvas.push_clip(rect);
        self.clip_depth += 1;
    }

    pub fn pop_clip(&mut self) -> Result<(), RenderError> {
        if self.clip_depth == 0 {
            return Err(RenderError::ClipUnderflow);
        }
        self.canvas.pop_clip();
        self.clip_depth -= 1;
        Ok(())
    }

    /// Pop every clip still pushed. Called when a frame ends early.
    pub(crate) fn unwind_clips(&mut self) {
        while self.clip_depth > 0 {
            self.canvas.pop_clip();
            self.clip_depth -= 1;
        }
    }
}

// ─── Recording canvas ────────────────────────────────────────────────────

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Stage(Stage),
    SetTransform(Affine),
    PushClip(kurbo::Rect),
    PopClip,
    FillRect(kurbo::Rect, Brush),
    StrokeRect(kurbo::Rect, Pen),
    FillEllipse(kurbo::Point, kurbo::Vec2, Brush),
    StrokeEllipse(kurbo::Point, kurbo::Vec2, Pen),
    Polyline(Vec<kurbo::Point>, Pen),
}

/// Headless canvas that records every call. Used for tests and for hosts
/// that replay frames onto their own surface.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages in the order they were entered.
    pub fn stages(&self) -> Vec<Stage> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Stage(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Ops recorded between the start of `stage` and the next stage.
    pub fn ops_in(&self, stage: Stage) -> Vec<&DrawOp> {
        let mut inside = false;
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                DrawOp::Stage(s) => inside = *s == stage,
                other if inside => out.push(other),
                _ => {}
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn set_transform(&mut self, transform: Affine) {
        self.ops.push(DrawOp::SetTransform(transform));
    }

    fn push_clip(&mut self, rect: kurbo::Rect) {
        self.ops.push(DrawOp::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.ops.push(DrawOp::PopClip);
    }

    fn fill_rect(&mut self, rect: kurbo::Rect, brush: &Brush) {
        self.ops.push(DrawOp::FillRect(rect, *brush));
    }

    fn stroke_rect(&mut self, rect: kurbo::Rect, pen: &Pen) {
        self.ops.push(DrawOp::StrokeRect(rect, *pen));
    }

    fn fill_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, brush: &Brush) {
        self.ops.push(DrawOp::FillEllipse(center, radii, *brush));
    }

    fn stroke_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, pen: &Pen) {
        self.ops.push(DrawOp::StrokeEllipse(center, radii, *pen));
    }

    fn stroke_polyline(&mut self, points: &[kurbo::Point], pen: &Pen) {
        self.ops.push(DrawOp::Polyline(points.to_vec(), *pen));
    }

    fn begin_stage(&mut self, stage: Stage) {
        self.ops.push(DrawOp::Stage(stage));
    }
}
