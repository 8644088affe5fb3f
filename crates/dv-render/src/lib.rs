//! Rendering for the diagram viewport.
//!
//! [`RenderPipeline`] paints one frame through a [`Canvas`]; hit testing
//! answers the shape-collection queries the editor needs.

pub mod canvas;
pub mod error;
pub mod grips;
pub mod hit;
pub mod pipeline;
pub mod renderer;
pub mod style_cache;
pub mod vello_canvas;

pub use canvas::{
    Brush, Canvas, DrawOp, Pen, RecordingCanvas, RenderContext, Space, Stage, diagram_affine,
};
pub use error::RenderError;
pub use grips::{GripShape, GripState, GripStyle};
pub use hit::{find_control_point_at, find_shape_at, find_shapes_in, find_shapes_intersecting};
pub use pipeline::{
    Frame, FrameStats, RenderPipeline, RenderSettings, ToolPreview, adapt_grid_spacing,
    grip_capabilities,
};
pub use renderer::{GeometricRenderer, ShapeRenderer};
pub use style_cache::{Design, StyleCache, StyleChange};
pub use vello_canvas::VelloCanvas;
