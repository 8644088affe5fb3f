//! One paint pass for a dirty rectangle.
//!
//! Stages run in a fixed order:
//!
//! 1. control space: background outside the sheet
//! 2. diagram space: sheet, then grid
//! 3. visible layers resolved once for the frame
//! 4. diagram space: shapes clipped to the dirty rect, then selection outlines
//! 5. control space: grips, caption indicators, caption editor background
//! 6. control space: connection-point highlights
//! 7. diagram space: the active tool's preview

use crate::canvas::{Brush, Pen, RenderContext, Space, Stage, to_kurbo_rect};
use crate::error::RenderError;
use crate::grips::{GripState, GripStyle, draw_grip};
use crate::renderer::ShapeRenderer;
use crate::style_cache::StyleCache;
use dv_core::{
    Background, Color, ControlPointCapabilities, ControlPointId, Diagram, LayerVisibility, Rect,
    ShapeId, ShapeKind, Transform, ViewportConfig, VisibleLayers,
};

/// Render-relevant subset of the viewport configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub background: Background,
    pub sheet_color: Color,
    pub show_grid: bool,
    pub grid_size: i32,
    pub grid_color: Color,
    pub min_grid_spacing_px: i32,
    pub outline_color: Color,
    pub grips: GripStyle,
}

impl From<&ViewportConfig> for RenderSettings {
    fn from(config: &ViewportConfig) -> Self {
        Self {
            background: config.background,
            sheet_color: config.sheet_color,
            show_grid: config.show_grid,
            grid_size: config.grid_size,
            grid_color: config.grid_color,
            min_grid_spacing_px: config.min_grid_spacing_px,
            outline_color: config.outline_color,
            grips: GripStyle {
                radius: f64::from(config.grip_size),
                fill: config.grip_color,
                border: config.selection_color,
                highlight: config.highlight_color,
                inactive: config.inactive_color,
                connection: config.connection_color,
                resize_on_top: config.resize_grip_priority,
            },
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&ViewportConfig::default())
    }
}

/// Everything one frame reads. The pipeline never mutates viewport state.
pub struct Frame<'a> {
    pub diagram: &'a Diagram,
    pub transform: &'a Transform,
    pub layers: &'a LayerVisibility,
    /// Selected shapes, bottom of z-order first.
    pub selection: &'a [ShapeId],
    /// Shapes glued by reference to a selected shape.
    pub connected: &'a [ShapeId],
    /// Dirty region in viewport pixels.
    pub dirty: Rect,
    /// Diagram-space bounds of an open caption editor.
    pub caption_editor: Option<Rect>,
    /// Grip under the pointer.
    pub highlighted_grip: Option<(ShapeId, ControlPointId)>,
    /// Draw grips as deactivated, e.g. while a tool action is running.
    pub grips_inactive: bool,
}

/// Implemented by tools that draw feedback on top of the frame.
pub trait ToolPreview {
    fn draw_preview(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub shapes_drawn: usize,
    pub outlines_drawn: usize,
    /// Control points drawn; a point with two markers counts once.
    pub grips_drawn: usize,
    pub highlights_drawn: usize,
    /// How often visible layers were resolved; one per frame.
    pub layer_resolutions: usize,
    /// Grid spacing used, in diagram units.
    pub grid_spacing: Option<f64>,
}

/// Grid spacing in diagram units that keeps line density stable.
///
/// Widened by an integer multiple when the zoomed spacing drops below
/// `min_px` pixels (at least one), halved while it exceeds twice the
/// nominal spacing.
pub fn adapt_grid_spacing(grid_size: i32, zoom: f64, min_px: i32) -> f64 {
    let nominal = f64::from(grid_size.max(1));
    let min_px = f64::from(min_px.max(1));
    let mut spacing = nominal;
    let px = spacing * zoom;
    if px < min_px {
        spacing *= (min_px / px).ceil();
    } else {
        while spacing * zoom > 2.0 * nominal && spacing / 2.0 * zoom >= min_px {
            spacing /= 2.0;
        }
    }
    spacing
}

/// Which grips to show for a selection: everything for a single shape,
/// rotate+resize for several planar shapes of one type, none otherwise.
pub fn grip_capabilities(diagram: &Diagram, selection: &[ShapeId]) -> ControlPointCapabilities {
    match selection {
        [] => ControlPointCapabilities::NONE,
        [_] => ControlPointCapabilities::ALL,
        [first, rest @ ..] => {
            let Some(first) = diagram.get(*first) else {
                return ControlPointCapabilities::NONE;
            };
            let uniform = first.kind == ShapeKind::Planar
                && rest.iter().all(|id| {
                    diagram
                        .get(*id)
                        .is_some_and(|s| s.kind == ShapeKind::Planar && s.type_name == first.type_name)
                });
            if uniform {
                ControlPointCapabilities::ROTATE | ControlPointCapabilities::RESIZE
            } else {
                ControlPointCapabilities::NONE
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderPipeline {
    pub settings: RenderSettings,
}

impl RenderPipeline {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /// Paint one frame. On error, clips pushed by the frame are popped
    /// before returning.
    pub fn render(
        &self,
        ctx: &mut RenderContext<'_>,
        frame: &Frame<'_>,
        renderer: &dyn ShapeRenderer,
        styles: &mut StyleCache,
        tool: Option<&dyn ToolPreview>,
    ) -> Result<FrameStats, RenderError> {
        let result = self.render_stages(ctx, frame, renderer, styles, tool);
        if result.is_err() {
            ctx.unwind_clips();
        }
        result
    }

    fn render_stages(
        &self,
        ctx: &mut RenderContext<'_>,
        frame: &Frame<'_>,
        renderer: &dyn ShapeRenderer,
        styles: &mut StyleCache,
        tool: Option<&dyn ToolPreview>,
    ) -> Result<FrameStats, RenderError> {
        let mut stats = FrameStats::default();
        let dirty = frame.dirty.validate()?;
        if dirty.is_empty() {
            return Ok(stats);
        }
        let t = frame.transform;
        let dirty_diagram = t.rect_to_diagram(dirty);
        let sheet = frame.diagram.sheet_bounds();

        // 1. Background around the sheet.
        ctx.reset_transform();
        ctx.begin_stage(Stage::Background);
        if !t.rect_to_viewport(sheet).contains_rect(&dirty) {
            let brush = match self.settings.background {
                Background::Solid { color } => Brush::Solid(color),
                Background::Gradient { top, bottom } => Brush::VerticalGradient { top, bottom },
            };
            ctx.canvas(Space::Control)?
                .fill_rect(to_kurbo_rect(dirty), &brush);
        }

        // 2. Sheet and grid.
        ctx.restore_transform();
        ctx.begin_stage(Stage::Sheet);
        if let Some(visible_sheet) = sheet.intersection(&dirty_diagram) {
            ctx.canvas(Space::Diagram)?.fill_rect(
                to_kurbo_rect(visible_sheet),
                &Brush::Solid(self.settings.sheet_color),
            );
            if self.settings.show_grid {
                ctx.begin_stage(Stage::Grid);
                stats.grid_spacing = Some(self.draw_grid(ctx, visible_sheet)?);
            }
        }

        // 3. Visible layers, once per frame.
        let visible = frame.layers.resolve(frame.diagram.layers(), t.zoom_level());
        stats.layer_resolutions += 1;

        // 4. Shapes, then outlines in a separate pass.
        ctx.begin_stage(Stage::Shapes);
        ctx.push_clip(to_kurbo_rect(dirty_diagram));
        for id in frame.diagram.draw_order() {
            let Some(shape) = frame.diagram.get(id) else {
                continue;
            };
            if !visible.shows(shape.home_layer, shape.supplemental_layers)
                || !shape.bounds_with_points().intersects(&dirty_diagram)
            {
                continue;
            }
            renderer.draw(ctx, shape, styles)?;
            stats.shapes_drawn += 1;
        }
        ctx.begin_stage(Stage::Outlines);
        let outline = Pen::solid(self.settings.outline_color, 1.0);
        for id in frame.selection {
            let Some(shape) = frame.diagram.get(*id) else {
                continue;
            };
            if self.is_drawn(&visible, frame.diagram, *id)
                && shape.bounds.intersects(&dirty_diagram)
            {
                renderer.draw_outline(ctx, shape, &outline)?;
                stats.outlines_drawn += 1;
            }
        }
        ctx.pop_clip()?;

        // 5. Grips and captions in control space.
        ctx.reset_transform();
        ctx.begin_stage(Stage::Grips);
        stats.grips_drawn = self.draw_grips(ctx, frame, &visible, dirty)?;
        ctx.begin_stage(Stage::Captions);
        self.draw_captions(ctx, frame)?;

        // 6. Connection points of shapes glued to the selection.
        ctx.begin_stage(Stage::Connections);
        stats.highlights_drawn = self.draw_connection_highlights(ctx, frame, &visible)?;

        // 7. Tool preview, always last.
        ctx.restore_transform();
        ctx.begin_stage(Stage::ToolPreview);
        if let Some(tool) = tool {
            tool.draw_preview(ctx)?;
        }

        log::trace!(
            "frame {:?}: {} shapes, {} outlines, {} grips",
            dirty,
            stats.shapes_drawn,
            stats.outlines_drawn,
            stats.grips_drawn
        );
        Ok(stats)
    }

    fn is_drawn(&self, visible: &VisibleLayers, diagram: &Diagram, id: ShapeId) -> bool {
        diagram
            .get(id)
            .is_some_and(|s| visible.shows(s.home_layer, s.supplemental_layers))
    }

    fn draw_grid(&self, ctx: &mut RenderContext<'_>, area: Rect) -> Result<f64, RenderError> {
        let spacing = adapt_grid_spacing(
            self.settings.grid_size,
            ctx.zoom(),
            self.settings.min_grid_spacing_px,
        );
        let pen = Pen::solid(self.settings.grid_color, ctx.pixels(1.0));
        let canvas = ctx.canvas(Space::Diagram)?;
        let (l, t) = (f64::from(area.left()), f64::from(area.top()));
        let (r, b) = (f64::from(area.right()), f64::from(area.bottom()));

        let mut x = (l / spacing).ceil() * spacing;
        while x <= r {
            canvas.stroke_line(kurbo::Point::new(x, t), kurbo::Point::new(x, b), &pen);
            x += spacing;
        }
        let mut y = (t / spacing).ceil() * spacing;
        while y <= b {
            canvas.stroke_line(kurbo::Point::new(l, y), kurbo::Point::new(r, y), &pen);
            y += spacing;
        }
        Ok(spacing)
    }

    fn draw_grips(
        &self,
        ctx: &mut RenderContext<'_>,
        frame: &Frame<'_>,
        visible: &VisibleLayers,
        dirty: Rect,
    ) -> Result<usize, RenderError> {
        let caps = grip_capabilities(frame.diagram, frame.selection);
        if caps.is_empty() {
            return Ok(0);
        }
        let reach = self.settings.grips.radius.ceil() as i32 + 1;
        let area = dirty.inflate(reach, reach);
        let mut drawn = 0;
        for id in frame.selection {
            let Some(shape) = frame.diagram.get(*id) else {
                continue;
            };
            if !visible.shows(shape.home_layer, shape.supplemental_layers) {
                continue;
            }
            for cp in shape.control_points.iter().filter(|cp| cp.capabilities.intersects(caps)) {
                let at = frame.transform.to_viewport(cp.position);
                if !area.contains(at) {
                    continue;
                }
                let state = if frame.grips_inactive {
                    GripState::Deactivated
                } else if frame.highlighted_grip == Some((shape.id, cp.id)) {
                    GripState::Highlighted
                } else {
                    GripState::Normal
                };
                if draw_grip(ctx, at, cp.capabilities & caps, state, &self.settings.grips)? > 0 {
                    drawn += 1;
                }
            }
        }
        Ok(drawn)
    }

    fn draw_captions(&self, ctx: &mut RenderContext<'_>, frame: &Frame<'_>) -> Result<(), RenderError> {
        let t = frame.transform;
        if let [only] = frame.selection
            && let Some(caption) = frame.diagram.get(*only).and_then(|s| s.caption_bounds)
        {
            let pen = Pen::dashed(self.settings.grips.inactive, 1.0);
            ctx.canvas(Space::Control)?
                .stroke_rect(to_kurbo_rect(t.rect_to_viewport(caption)), &pen);
        }
        if let Some(editor) = frame.caption_editor {
            ctx.canvas(Space::Control)?.fill_rect(
                to_kurbo_rect(t.rect_to_viewport(editor)),
                &Brush::Solid(self.settings.sheet_color),
            );
        }
        Ok(())
    }

    fn draw_connection_highlights(
        &self,
        ctx: &mut RenderContext<'_>,
        frame: &Frame<'_>,
        visible: &VisibleLayers,
    ) -> Result<usize, RenderError> {
        let mut drawn = 0;
        for id in frame.connected {
            let Some(shape) = frame.diagram.get(*id) else {
                continue;
            };
            if !visible.shows(shape.home_layer, shape.supplemental_layers) {
                continue;
            }
            for info in frame
                .diagram
                .connection_infos(*id)
                .into_iter()
                .filter(|c| frame.selection.contains(&c.other_shape))
            {
                // The glue point sits on whichever side does not refer to
                // the whole shape.
                let point = if info.own_point.is_reference() {
                    frame
                        .diagram
                        .get(info.other_shape)
                        .and_then(|s| s.control_point(info.other_point))
                } else {
                    shape.control_point(info.own_point)
                };
                let Some(cp) = point else {
                    continue;
                };
                let at = frame.transform.to_viewport(cp.position);
                drawn += draw_grip(
                    ctx,
                    at,
                    ControlPointCapabilities::GLUE,
                    GripState::Highlighted,
                    &self.settings.grips,
                )?;
            }
        }
        Ok(drawn)
    }
}
