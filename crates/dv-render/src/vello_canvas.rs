//! `vello::Scene` backend.
//!
//! Records into a Vello scene; the host owns the GPU side (device,
//! surface, `vello::Renderer`) and presents the scene.

use crate::canvas::{Brush, Canvas, Pen};
use kurbo::{Affine, BezPath, Cap, Ellipse, Join, Stroke};
use peniko::{Color, Fill, Gradient, Mix};
use vello::Scene;

/// Dash pattern for dashed pens, in pen-width units.
const DASH: [f64; 2] = [4.0, 3.0];

pub struct VelloCanvas {
    scene: Scene,
    transform: Affine,
}

impl Default for VelloCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloCanvas {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            transform: Affine::IDENTITY,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take the finished scene, leaving an empty one for the next frame.
    pub fn take_scene(&mut self) -> Scene {
        self.transform = Affine::IDENTITY;
        std::mem::take(&mut self.scene)
    }

    fn fill_shape(&mut self, shape: &impl kurbo::Shape, brush: &Brush) {
        match *brush {
            Brush::Solid(c) => {
                self.scene
                    .fill(Fill::NonZero, self.transform, to_color(c), None, shape);
            }
            Brush::VerticalGradient { top, bottom } => {
                let bbox = shape.bounding_box();
                let gradient = Gradient::new_linear((bbox.x0, bbox.y0), (bbox.x0, bbox.y1))
                    .with_stops([to_color(top), to_color(bottom)]);
                self.scene
                    .fill(Fill::NonZero, self.transform, &gradient, None, shape);
            }
        }
    }

    fn stroke_shape(&mut self, shape: &impl kurbo::Shape, pen: &Pen) {
        let mut stroke = Stroke {
            width: pen.width,
            join: Join::Miter,
            start_cap: Cap::Butt,
            end_cap: Cap::Butt,
            ..Default::default()
        };
        if pen.dashed {
            stroke = stroke.with_dashes(0.0, DASH.map(|d| d * pen.width));
        }
        self.scene
            .stroke(&stroke, self.transform, to_color(pen.color), None, shape);
    }
}

fn to_color(c: dv_core::Color) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

impl Canvas for VelloCanvas {
    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn push_clip(&mut self, rect: kurbo::Rect) {
        self.scene.push_layer(Mix::Clip, 1.0, self.transform, &rect);
    }

    fn pop_clip(&mut self) {
        self.scene.pop_layer();
    }

    fn fill_rect(&mut self, rect: kurbo::Rect, brush: &Brush) {
        self.fill_shape(&rect, brush);
    }

    fn stroke_rect(&mut self, rect: kurbo::Rect, pen: &Pen) {
        self.stroke_shape(&rect, pen);
    }

    fn fill_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, brush: &Brush) {
        self.fill_shape(&Ellipse::new(center, radii, 0.0), brush);
    }

    fn stroke_ellipse(&mut self, center: kurbo::Point, radii: kurbo::Vec2, pen: &Pen) {
        self.stroke_shape(&Ellipse::new(center, radii, 0.0), pen);
    }

    fn stroke_polyline(&mut self, points: &[kurbo::Point], pen: &Pen) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let mut path = BezPath::new();
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
        self.stroke_shape(&path, pen);
    }
}
