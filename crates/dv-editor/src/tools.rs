//! Tool system for viewport interactions.
//!
//! A tool turns input events into [`ToolRequest`]s that the controller
//! carries out. Tools only read viewport state, so a request list is the
//! whole effect of one event.
//!
//! ## Modifier behaviors
//!
//! | Modifier  | Selection Tool                  | Template Tool      |
//! |-----------|---------------------------------|--------------------|
//! | **Shift** | Toggle on click, add rubber-band| —                  |

use crate::input::{InputEvent, MouseButton, ToolEvent};
use crate::scroll::ScrollDirection;
use crate::selection::SelectionSet;
use dv_core::{
    Color, Diagram, LayerId, LayerIds, Point, Rect, Shape, ShapeId, ShapeKind, Size, Transform,
    ViewportConfig, VisibleLayers, snap_to_grid,
};
use dv_render::canvas::to_kurbo_rect;
use dv_render::{Pen, RenderContext, RenderError, ShapeRenderer, Space, ToolPreview, find_shape_at};

/// Pointer travel in pixels before a press becomes a drag.
pub const DRAG_THRESHOLD_PX: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Select,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Move,
    Crosshair,
    Scroll(ScrollDirection),
}

/// What a tool asks the controller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Select { shape: ShapeId, add: bool },
    Toggle(ShapeId),
    SelectInRect { rect: Rect, add: bool },
    UnselectAll,
    /// Open one undo step for a drag.
    BeginMove,
    MoveSelection { dx: i32, dy: i32 },
    EndMove,
    /// Revert the drag in progress.
    CancelMove,
    Insert(Shape),
    /// Repaint a diagram-space area, e.g. an old preview.
    Invalidate(Rect),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Handled(Vec<ToolRequest>),
    Unhandled,
    /// The tool could not complete; the controller cancels it.
    Failed(String),
}

/// Read-only view of the viewport for tools.
pub struct ToolContext<'a> {
    pub diagram: &'a Diagram,
    pub transform: &'a Transform,
    pub selection: &'a SelectionSet,
    pub visible: &'a VisibleLayers,
    pub renderer: &'a dyn ShapeRenderer,
    pub config: &'a ViewportConfig,
    /// Layer assignment for new shapes.
    pub active_layers: (LayerId, LayerIds),
}

impl ToolContext<'_> {
    /// Topmost visible shape under a diagram point, with the grip size as
    /// tolerance.
    pub fn shape_at(&self, p: Point) -> Option<ShapeId> {
        let tolerance = self.transform.distance_to_diagram(self.config.grip_size);
        find_shape_at(self.diagram, self.visible, self.renderer, p, None, tolerance)
    }

    /// Whether a click on `id` lands on something already selected.
    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(id) || self.selection.contains(self.diagram.root_of(id))
    }

    pub fn snap(&self, p: Point) -> Point {
        if self.config.snap_to_grid {
            snap_to_grid(p, self.config.grid_size, self.config.snap_distance)
        } else {
            p
        }
    }

    fn drag_started(&self, from: Point, to: Point) -> bool {
        let threshold = self.transform.distance_to_diagram(DRAG_THRESHOLD_PX).max(1);
        (to.x - from.x).abs() >= threshold || (to.y - from.y).abs() >= threshold
    }
}

/// Trait for tools that handle input and produce requests.
pub trait Tool: ToolPreview {
    fn kind(&self) -> ToolKind;

    fn process(&mut self, event: &ToolEvent, cx: &ToolContext<'_>) -> ToolResult;

    /// Abort whatever is in progress; returns the requests that undo its
    /// visible effects.
    fn cancel(&mut self) -> Vec<ToolRequest>;

    /// Mid-action: grips show as deactivated and auto-scroll may run.
    fn is_busy(&self) -> bool;

    fn cursor(&self) -> Cursor {
        Cursor::Default
    }
}

fn preview_pen(ctx: &RenderContext<'_>) -> Pen {
    Pen::dashed(Color::rgb(0x40, 0x40, 0x40), ctx.pixels(1.0))
}

fn is_escape(event: &ToolEvent) -> bool {
    matches!(&event.input, InputEvent::Key { key, .. } if key == "Escape")
}

// ─── Selection Tool ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SelectState {
    #[default]
    Idle,
    /// Button down, not yet dragged. `narrow` re-selects the hit shape
    /// on release when it was already selected on press.
    Pressed {
        origin: Point,
        hit: Option<ShapeId>,
        narrow: bool,
    },
    /// Dragging the selection; `last` is the snapped pointer.
    Moving { last: Point },
    RubberBand { origin: Point, current: Point },
}

#[derive(Debug, Default)]
pub struct SelectionTool {
    state: SelectState,
}

impl SelectionTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current rubber-band rectangle in diagram units.
    pub fn rubber_band(&self) -> Option<Rect> {
        match self.state {
            SelectState::RubberBand { origin, current } => Some(Rect::from_corners(origin, current)),
            _ => None,
        }
    }

    fn pointer_down(&mut self, p: Point, shift: bool, cx: &ToolContext<'_>) -> ToolResult {
        let mut requests = Vec::new();
        match cx.shape_at(p) {
            Some(hit) => {
                let selected = cx.is_selected(hit);
                if shift {
                    requests.push(ToolRequest::Toggle(hit));
                } else if !selected {
                    requests.push(ToolRequest::Select {
                        shape: hit,
                        add: false,
                    });
                }
                self.state = SelectState::Pressed {
                    origin: p,
                    hit: Some(hit),
                    narrow: selected && !shift,
                };
            }
            None => {
                if !shift {
                    requests.push(ToolRequest::UnselectAll);
                }
                self.state = SelectState::RubberBand {
                    origin: p,
                    current: p,
                };
            }
        }
        ToolResult::Handled(requests)
    }

    fn pointer_move(&mut self, p: Point, cx: &ToolContext<'_>) -> ToolResult {
        match self.state {
            SelectState::Idle => ToolResult::Unhandled,
            SelectState::Pressed { origin, hit, .. } => {
                if hit.is_none() || !cx.drag_started(origin, p) {
                    return ToolResult::Handled(Vec::new());
                }
                let start = cx.snap(origin);
                self.state = SelectState::Moving { last: start };
                let mut requests = vec![ToolRequest::BeginMove];
                requests.extend(self.move_to(p, cx));
                ToolResult::Handled(requests)
            }
            SelectState::Moving { .. } => ToolResult::Handled(self.move_to(p, cx)),
            SelectState::RubberBand { origin, current } => {
                let old = Rect::from_corners(origin, current);
                self.state = SelectState::RubberBand { origin, current: p };
                let new = Rect::from_corners(origin, p);
                ToolResult::Handled(vec![ToolRequest::Invalidate(old.union(&new))])
            }
        }
    }

    fn move_to(&mut self, p: Point, cx: &ToolContext<'_>) -> Vec<ToolRequest> {
        let SelectState::Moving { last } = self.state else {
            return Vec::new();
        };
        let target = cx.snap(p);
        let (dx, dy) = (target.x - last.x, target.y - last.y);
        if dx == 0 && dy == 0 {
            return Vec::new();
        }
        self.state = SelectState::Moving { last: target };
        vec![ToolRequest::MoveSelection { dx, dy }]
    }

    fn pointer_up(&mut self, shift: bool) -> ToolResult {
        let state = std::mem::take(&mut self.state);
        let requests = match state {
            SelectState::Idle => return ToolResult::Unhandled,
            // Clicking a selected shape narrows the selection to it, or
            // enters a selected group.
            SelectState::Pressed {
                hit: Some(shape),
                narrow: true,
                ..
            } if !shift => vec![ToolRequest::Select { shape, add: false }],
            SelectState::Pressed { .. } => Vec::new(),
            SelectState::Moving { .. } => vec![ToolRequest::EndMove],
            SelectState::RubberBand { origin, current } => {
                let rect = Rect::from_corners(origin, current);
                vec![
                    ToolRequest::Invalidate(rect),
                    ToolRequest::SelectInRect { rect, add: shift },
                ]
            }
        };
        ToolResult::Handled(requests)
    }
}

impl Tool for SelectionTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn process(&mut self, event: &ToolEvent, cx: &ToolContext<'_>) -> ToolResult {
        if is_escape(event) {
            return match self.state {
                SelectState::Idle => ToolResult::Unhandled,
                _ => ToolResult::Handled(self.cancel()),
            };
        }
        let Some(p) = event.diagram_position else {
            return ToolResult::Unhandled;
        };
        match &event.input {
            InputEvent::PointerDown {
                button: MouseButton::Left,
                modifiers,
                ..
            } => self.pointer_down(p, modifiers.shift, cx),
            InputEvent::PointerMove {
                button: Some(MouseButton::Left),
                ..
            } => self.pointer_move(p, cx),
            InputEvent::PointerUp {
                button: MouseButton::Left,
                modifiers,
                ..
            } => self.pointer_up(modifiers.shift),
            _ => ToolResult::Unhandled,
        }
    }

    fn cancel(&mut self) -> Vec<ToolRequest> {
        match std::mem::take(&mut self.state) {
            SelectState::Moving { .. } => vec![ToolRequest::CancelMove],
            SelectState::RubberBand { origin, current } => {
                vec![ToolRequest::Invalidate(Rect::from_corners(origin, current))]
            }
            SelectState::Idle | SelectState::Pressed { .. } => Vec::new(),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.state,
            SelectState::Moving { .. } | SelectState::RubberBand { .. }
        )
    }

    fn cursor(&self) -> Cursor {
        match self.state {
            SelectState::Moving { .. } => Cursor::Move,
            _ => Cursor::Default,
        }
    }
}

impl ToolPreview for SelectionTool {
    fn draw_preview(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        if let Some(rect) = self.rubber_band() {
            let pen = preview_pen(ctx);
            ctx.canvas(Space::Diagram)?
                .stroke_rect(to_kurbo_rect(rect), &pen);
        }
        Ok(())
    }
}

// ─── Template Tool ───────────────────────────────────────────────────────

/// Places new shapes from a template. A click uses the default size, a
/// drag spans the shape.
#[derive(Debug, Clone)]
pub struct TemplateTool {
    template: String,
    type_name: String,
    kind: ShapeKind,
    default_size: Size,
    drag: Option<(Point, Point)>,
}

impl TemplateTool {
    pub fn new(template: &str, type_name: &str, kind: ShapeKind, default_size: Size) -> Self {
        Self {
            template: template.to_string(),
            type_name: type_name.to_string(),
            kind,
            default_size,
            drag: None,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn preview_rect(&self) -> Option<Rect> {
        self.drag.map(|(a, b)| Rect::from_corners(a, b))
    }

    fn build(&self, start: Point, end: Point, cx: &ToolContext<'_>) -> Shape {
        let id = ShapeId::with_prefix(&self.type_name.to_lowercase());
        let min = cx.transform.distance_to_diagram(DRAG_THRESHOLD_PX).max(1);
        let dragged = (end.x - start.x).abs() >= min || (end.y - start.y).abs() >= min;
        let mut shape = if self.kind.is_linear() {
            let end = if dragged {
                end
            } else {
                start.offset(self.default_size.width, 0)
            };
            Shape::line(id, start, end)
        } else {
            let rect = if dragged {
                Rect::from_corners(start, end)
            } else {
                Rect::from_origin_size(start, self.default_size)
            };
            let mut shape = Shape::planar_box(id, rect);
            shape.kind = self.kind;
            shape
        };
        shape.type_name = self.type_name.clone();
        let (home, supplemental) = cx.active_layers;
        shape.with_layers(home, supplemental).with_template(&self.template)
    }
}

impl Tool for TemplateTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Template
    }

    fn process(&mut self, event: &ToolEvent, cx: &ToolContext<'_>) -> ToolResult {
        if is_escape(event) {
            return match self.drag {
                Some(_) => ToolResult::Handled(self.cancel()),
                None => ToolResult::Unhandled,
            };
        }
        let Some(p) = event.diagram_position else {
            return ToolResult::Unhandled;
        };
        let p = cx.snap(p);
        match (&event.input, self.drag) {
            (
                InputEvent::PointerDown {
                    button: MouseButton::Left,
                    ..
                },
                _,
            ) => {
                self.drag = Some((p, p));
                ToolResult::Handled(Vec::new())
            }
            (
                InputEvent::PointerMove {
                    button: Some(MouseButton::Left),
                    ..
                },
                Some((start, current)),
            ) => {
                self.drag = Some((start, p));
                let old = Rect::from_corners(start, current);
                ToolResult::Handled(vec![ToolRequest::Invalidate(
                    old.union(&Rect::from_corners(start, p)),
                )])
            }
            (
                InputEvent::PointerUp {
                    button: MouseButton::Left,
                    ..
                },
                Some((start, current)),
            ) => {
                self.drag = None;
                if self.type_name.is_empty() {
                    return ToolResult::Failed(format!("template {} has no shape type", self.template));
                }
                let shape = self.build(start, p, cx);
                ToolResult::Handled(vec![
                    ToolRequest::Invalidate(Rect::from_corners(start, current)),
                    ToolRequest::Insert(shape),
                ])
            }
            _ => ToolResult::Unhandled,
        }
    }

    fn cancel(&mut self) -> Vec<ToolRequest> {
        self.drag
            .take()
            .map(|(a, b)| vec![ToolRequest::Invalidate(Rect::from_corners(a, b))])
            .unwrap_or_default()
    }

    fn is_busy(&self) -> bool {
        self.drag.is_some()
    }

    fn cursor(&self) -> Cursor {
        Cursor::Crosshair
    }
}

impl ToolPreview for TemplateTool {
    fn draw_preview(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        if let Some(rect) = self.preview_rect() {
            let pen = preview_pen(ctx);
            ctx.canvas(Space::Diagram)?
                .stroke_rect(to_kurbo_rect(rect), &pen);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use dv_render::GeometricRenderer;
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    struct Fixture {
        diagram: Diagram,
        transform: Transform,
        selection: SelectionSet,
        visible: VisibleLayers,
        config: ViewportConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut d = Diagram::default();
            d.insert(Shape::planar_box(id("tool.a"), Rect::new(100, 100, 50, 50)))
                .unwrap();
            let mut t = Transform::new();
            t.set_draw_bounds(Rect::new(0, 0, 800, 600)).unwrap();
            Self {
                diagram: d,
                transform: t,
                selection: SelectionSet::new(),
                visible: VisibleLayers::all(),
                config: ViewportConfig {
                    snap_to_grid: false,
                    ..ViewportConfig::default()
                },
            }
        }

        fn cx(&self) -> ToolContext<'_> {
            ToolContext {
                diagram: &self.diagram,
                transform: &self.transform,
                selection: &self.selection,
                visible: &self.visible,
                renderer: &GeometricRenderer,
                config: &self.config,
                active_layers: (LayerId(2), LayerIds::NONE),
            }
        }
    }

    fn at(input: InputEvent) -> ToolEvent {
        let diagram_position = input.position();
        ToolEvent {
            input,
            diagram_position,
        }
    }

    #[test]
    fn click_on_shape_selects_it() {
        let f = Fixture::new();
        let mut tool = SelectionTool::new();
        let result = tool.process(&at(InputEvent::pointer_down(120, 120)), &f.cx());
        assert_eq!(
            result,
            ToolResult::Handled(vec![ToolRequest::Select {
                shape: id("tool.a"),
                add: false
            }])
        );
    }

    #[test]
    fn shift_click_toggles() {
        let f = Fixture::new();
        let mut tool = SelectionTool::new();
        let down = InputEvent::pointer_down(120, 120).with_modifiers(Modifiers::SHIFT);
        assert_eq!(
            tool.process(&at(down), &f.cx()),
            ToolResult::Handled(vec![ToolRequest::Toggle(id("tool.a"))])
        );
    }

    #[test]
    fn drag_moves_in_one_batch() {
        let f = Fixture::new();
        let mut tool = SelectionTool::new();
        tool.process(&at(InputEvent::pointer_down(120, 120)), &f.cx());
        let moved = tool.process(&at(InputEvent::pointer_move(130, 125)), &f.cx());
        assert_eq!(
            moved,
            ToolResult::Handled(vec![
                ToolRequest::BeginMove,
                ToolRequest::MoveSelection { dx: 10, dy: 5 }
            ])
        );
        assert!(tool.is_busy());
        assert_eq!(tool.cursor(), Cursor::Move);
        assert_eq!(
            tool.process(&at(InputEvent::pointer_up(130, 125)), &f.cx()),
            ToolResult::Handled(vec![ToolRequest::EndMove])
        );
    }

    #[test]
    fn escape_cancels_a_drag() {
        let f = Fixture::new();
        let mut tool = SelectionTool::new();
        tool.process(&at(InputEvent::pointer_down(120, 120)), &f.cx());
        tool.process(&at(InputEvent::pointer_move(140, 140)), &f.cx());
        let esc = at(InputEvent::key("Escape", Modifiers::NONE));
        assert_eq!(
            tool.process(&esc, &f.cx()),
            ToolResult::Handled(vec![ToolRequest::CancelMove])
        );
        assert!(!tool.is_busy());
        assert_eq!(tool.process(&esc, &f.cx()), ToolResult::Unhandled);
    }

    #[test]
    fn rubber_band_selects_on_release() {
        let f = Fixture::new();
        let mut tool = SelectionTool::new();
        tool.process(&at(InputEvent::pointer_down(10, 10)), &f.cx());
        tool.process(&at(InputEvent::pointer_move(200, 200)), &f.cx());
        assert_eq!(tool.rubber_band(), Some(Rect::new(10, 10, 190, 190)));
        let up = tool.process(&at(InputEvent::pointer_up(200, 200)), &f.cx());
        let rect = Rect::new(10, 10, 190, 190);
        assert_eq!(
            up,
            ToolResult::Handled(vec![
                ToolRequest::Invalidate(rect),
                ToolRequest::SelectInRect { rect, add: false }
            ])
        );
    }

    #[test]
    fn template_click_uses_default_size_and_active_layer() {
        let f = Fixture::new();
        let mut tool = TemplateTool::new("Process", "Box", ShapeKind::Planar, Size::new(80, 40));
        tool.process(&at(InputEvent::pointer_down(300, 300)), &f.cx());
        let ToolResult::Handled(requests) =
            tool.process(&at(InputEvent::pointer_up(300, 300)), &f.cx())
        else {
            panic!("expected handled");
        };
        let ToolRequest::Insert(shape) = &requests[1] else {
            panic!("expected insert");
        };
        assert_eq!(shape.bounds, Rect::new(300, 300, 80, 40));
        assert_eq!(shape.home_layer, LayerId(2));
        assert_eq!(shape.template.as_deref(), Some("Process"));
    }
}
