//! The viewport controller.
//!
//! [`ViewportController`] owns the transform, the invalidation tracker,
//! layer visibility and the selection of one diagram view. Everything the
//! host does goes through it: input events, edit operations, zoom and
//! scroll, rendering. State changes come back as queued
//! [`ViewportEvent`]s and repaint rectangles.
//!
//! Structural edits run through a [`CommandLayer`]. The controller never
//! mutates shapes itself; it reacts to the [`DiagramChange`]s the layer
//! reports, which keeps undo, redo and out-of-band edits on the same path.

use crate::commands::{CommandLayer, CommandStack, DiagramChange, DiagramCommand, EditOperation};
use crate::edit_buffer::{EditAction, EditBuffer, PlacedShape};
use crate::error::ViewportError;
use crate::events::{Confirmation, UserMessage, UserMessageListener, ViewportEvent};
use crate::input::{InputEvent, Modifiers, MouseButton, ToolEvent};
use crate::invalidation::InvalidationTracker;
use crate::scroll::{ScrollTick, ScrollTimers, auto_scroll_delta};
use crate::selection::{SelectionCx, SelectionSet};
use crate::shortcuts::{ShortcutMap, ViewportAction};
use crate::tools::{Cursor, SelectionTool, Tool, ToolContext, ToolRequest, ToolResult};
use dv_core::{
    ControlPointCapabilities, ControlPointId, CoreError, Diagnostic, Diagram, LayerId,
    LayerVisibility, MAX_ZOOM_LEVEL, MIN_ZOOM_FACTOR, Point, Rect, Shape, ShapeId, ShapeKind,
    Transform, ViewportConfig, VisibleLayers, union_all, validate_diagram,
};
use dv_render::{
    Canvas, Design, Frame, FrameStats, GeometricRenderer, RenderContext, RenderError, RenderPipeline,
    RenderSettings, ShapeRenderer, StyleCache, StyleChange, ToolPreview, find_control_point_at,
    find_shape_at, find_shapes_in,
};

/// Lends the active tool to the render pipeline as its preview.
struct ActiveTool<'a>(&'a dyn Tool);

impl ToolPreview for ActiveTool<'_> {
    fn draw_preview(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        self.0.draw_preview(ctx)
    }
}

pub struct ViewportController {
    config: ViewportConfig,
    diagram: Diagram,
    transform: Transform,
    tracker: InvalidationTracker,
    layers: LayerVisibility,
    selection: SelectionSet,
    pipeline: RenderPipeline,
    styles: StyleCache,
    renderer: Box<dyn ShapeRenderer>,
    commands: Box<dyn CommandLayer>,
    edit_buffer: EditBuffer,
    tool: Box<dyn Tool>,
    listener: Option<Box<dyn UserMessageListener>>,
    timers: ScrollTimers,
    events: Vec<ViewportEvent>,
    caption_editor: Option<ShapeId>,
    highlighted_grip: Option<(ShapeId, ControlPointId)>,
    /// A drag opened an undo batch that is still running.
    move_batch_open: bool,
}

impl ViewportController {
    /// Create a controller for `diagram` with the default command stack,
    /// renderer and selection tool.
    pub fn new(config: ViewportConfig, diagram: Diagram) -> Result<Self, ViewportError> {
        config.validate()?;
        let mut transform = Transform::new();
        transform.set_zoom_level(config.zoom_level);
        let mut controller = Self {
            tracker: InvalidationTracker::new(config.handle_margin.max(config.grip_size)),
            pipeline: RenderPipeline::new(RenderSettings::from(&config)),
            commands: Box::new(CommandStack::new(config.undo_depth)),
            config,
            diagram,
            transform,
            layers: LayerVisibility::new(),
            selection: SelectionSet::new(),
            styles: StyleCache::default(),
            renderer: Box::new(GeometricRenderer),
            edit_buffer: EditBuffer::new(),
            tool: Box::new(SelectionTool::new()),
            listener: None,
            timers: ScrollTimers::default(),
            events: Vec::new(),
            caption_editor: None,
            highlighted_grip: None,
            move_batch_open: false,
        };
        controller.update_scroll_area()?;
        Ok(controller)
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ShapeRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_command_layer(mut self, commands: Box<dyn CommandLayer>) -> Self {
        self.commands = commands;
        self
    }

    pub fn set_user_message_listener(&mut self, listener: impl UserMessageListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Replace the active tool; a running action of the old one is
    /// cancelled first.
    pub fn set_tool(&mut self, tool: Box<dyn Tool>) -> Result<(), ViewportError> {
        self.cancel_tool()?;
        log::debug!("tool: {:?} -> {:?}", self.tool.kind(), tool.kind());
        self.tool = tool;
        Ok(())
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Mutable access for out-of-band edits. Report what changed through
    /// [`notify_changes`](Self::notify_changes).
    pub fn diagram_mut(&mut self) -> &mut Diagram {
        &mut self.diagram
    }

    /// Coordinate conversions between diagram, viewport and screen space.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn layers(&self) -> &LayerVisibility {
        &self.layers
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn edit_buffer(&self) -> &EditBuffer {
        &self.edit_buffer
    }

    pub fn edit_buffer_mut(&mut self) -> &mut EditBuffer {
        &mut self.edit_buffer
    }

    pub fn tool(&self) -> &dyn Tool {
        &*self.tool
    }

    pub fn caption_editor(&self) -> Option<ShapeId> {
        self.caption_editor
    }

    pub fn highlighted_grip(&self) -> Option<(ShapeId, ControlPointId)> {
        self.highlighted_grip
    }

    pub fn can_undo(&self) -> bool {
        self.commands.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.commands.can_redo()
    }

    /// Layers shown at the current zoom level.
    pub fn visible_layers(&self) -> VisibleLayers {
        self.layers
            .resolve(self.diagram.layers(), self.transform.zoom_level())
    }

    fn is_shown(&self, visible: &VisibleLayers, id: ShapeId) -> bool {
        self.diagram
            .get(id)
            .is_some_and(|s| visible.shows(s.home_layer, s.supplemental_layers))
    }

    // ─── Notifications and repaints ──────────────────────────────────────

    /// Events raised since the last call, in issue order.
    pub fn drain_events(&mut self) -> Vec<ViewportEvent> {
        std::mem::take(&mut self.events)
    }

    /// Viewport rectangles that need repainting.
    pub fn take_repaint_requests(&mut self) -> Vec<Rect> {
        self.tracker.take_repaints()
    }

    pub fn suspend_updates(&mut self) {
        self.tracker.suspend();
    }

    pub fn resume_updates(&mut self) -> Result<(), ViewportError> {
        self.tracker.resume()
    }

    /// Repaint a diagram-space area.
    pub fn invalidate(&mut self, rect: Rect) -> Result<(), ViewportError> {
        self.tracker.invalidate(&self.transform, rect)
    }

    pub fn invalidate_all(&mut self) -> Result<(), ViewportError> {
        self.tracker.invalidate_viewport(self.transform.draw_bounds())
    }

    /// Run `f` with invalidation suspended, so everything it touches is
    /// flushed as one repaint. The tracker is resumed even when `f` fails.
    fn batched<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ViewportError>,
    ) -> Result<T, ViewportError> {
        self.tracker.suspend();
        let result = f(self);
        self.tracker.resume()?;
        result
    }

    fn notify_selection(&mut self) {
        let shapes = self.selection.bottom_up(&self.diagram);
        log::debug!("selection: {} shape(s)", shapes.len());
        self.events.push(ViewportEvent::ShapesSelected(shapes));
    }

    /// Raise a rejected edit to the user and hand back the error.
    fn reject(&mut self, operation: EditOperation, reason: impl Into<String>) -> ViewportError {
        let reason = reason.into();
        log::warn!("{operation} rejected: {reason}");
        let Some(listener) = self.listener.as_mut() else {
            return ViewportError::NoUserMessageListener;
        };
        listener.show(&UserMessage::rejected(operation, &reason));
        ViewportError::EditRejected { operation, reason }
    }

    // ─── Diagram lifecycle ───────────────────────────────────────────────

    /// Show another diagram. Selection, caption editor and undo history
    /// belong to the old one and are dropped; the edit buffer survives.
    pub fn set_diagram(&mut self, diagram: Diagram) -> Result<(), ViewportError> {
        self.events.push(ViewportEvent::DiagramChanging);
        self.cancel_tool()?;
        self.close_caption_editor()?;
        let had_selection = !self.selection.is_empty();
        self.selection = SelectionSet::new();
        self.highlighted_grip = None;
        self.commands.clear();
        self.diagram = diagram;
        self.update_scroll_area()?;
        self.invalidate_all()?;
        if had_selection {
            self.notify_selection();
        }
        log::debug!("diagram replaced: {} shape(s)", self.diagram.len());
        self.events.push(ViewportEvent::DiagramChanged);
        Ok(())
    }

    /// Lint the current diagram.
    pub fn validate(&self) -> Vec<Diagnostic> {
        validate_diagram(&self.diagram)
    }

    fn update_scroll_area(&mut self) -> Result<(), ViewportError> {
        let area = self.diagram.scrollable_bounds(self.config.scroll_area_margin);
        self.transform.recompute_anchor(area)?;
        Ok(())
    }

    // ─── Zoom and scroll ─────────────────────────────────────────────────

    pub fn zoom_level(&self) -> u32 {
        self.transform.zoom_level()
    }

    /// Set the zoom level in percent. Shapes on layers that the new zoom
    /// hides leave the selection with a single notification.
    pub fn set_zoom_level(&mut self, level: u32) -> Result<(), ViewportError> {
        if level > MAX_ZOOM_LEVEL {
            return Err(CoreError::OutOfRange {
                name: "zoom_level",
                value: level.into(),
                min: 0,
                max: MAX_ZOOM_LEVEL.into(),
            }
            .into());
        }
        if !self.transform.set_zoom_level(level) {
            return Ok(());
        }
        log::debug!("zoom: {level}%");
        self.events.push(ViewportEvent::ZoomChanged(level));
        self.batched(|this| {
            this.update_scroll_area()?;
            this.close_caption_editor()?;
            this.invalidate_all()?;
            this.prune_selection()?;
            Ok(())
        })
    }

    /// Zoom keeping the diagram point under viewport point `at` in place.
    pub fn zoom_at(&mut self, level: u32, at: Point) -> Result<(), ViewportError> {
        let fixed = self.transform.to_diagram_f(at.to_f());
        self.set_zoom_level(level)?;
        let scroll = self.transform.scroll_keeping(fixed, at);
        self.scroll_to(scroll)?;
        Ok(())
    }

    pub fn zoom_in(&mut self) -> Result<(), ViewportError> {
        let level = (self.zoom_level() + self.config.zoom_step).min(MAX_ZOOM_LEVEL);
        self.set_zoom_level(level)
    }

    pub fn zoom_out(&mut self) -> Result<(), ViewportError> {
        let level = self.zoom_level().saturating_sub(self.config.zoom_step).max(1);
        self.set_zoom_level(level)
    }

    /// Fit the visible shapes, or the sheet when there are none.
    pub fn zoom_to_fit(&mut self) -> Result<(), ViewportError> {
        let visible = self.visible_layers();
        let area = union_all(
            self.diagram
                .draw_order()
                .into_iter()
                .filter(|id| self.is_shown(&visible, *id))
                .filter_map(|id| self.diagram.total_bounds(id)),
        )
        .unwrap_or_else(|| self.diagram.sheet_bounds());
        let level = self.transform.fit_zoom_level(area);
        self.set_zoom_level(level)?;
        self.scroll_to(area.origin())?;
        Ok(())
    }

    pub fn set_draw_bounds(&mut self, bounds: Rect) -> Result<(), ViewportError> {
        self.transform.set_draw_bounds(bounds)?;
        self.update_scroll_area()?;
        self.invalidate_all()
    }

    pub fn set_screen_origin(&mut self, origin: Point) {
        self.transform.set_screen_origin(origin);
    }

    /// Scroll so diagram point `target` is at the top-left. Returns
    /// whether the view moved.
    pub fn scroll_to(&mut self, target: Point) -> Result<bool, ViewportError> {
        if !self.transform.scroll_to(target) {
            return Ok(false);
        }
        let scroll = self.transform.scroll();
        log::trace!("scroll: ({}, {})", scroll.x, scroll.y);
        self.close_caption_editor()?;
        self.invalidate_all()?;
        self.events.push(ViewportEvent::ScrollChanged(scroll));
        Ok(true)
    }

    /// Scroll by a diagram-space delta.
    pub fn scroll_by(&mut self, dx: i32, dy: i32) -> Result<bool, ViewportError> {
        let target = self.transform.scroll().offset(dx, dy);
        self.scroll_to(target)
    }

    // ─── View settings ───────────────────────────────────────────────────

    pub fn set_grid_size(&mut self, size: i32) -> Result<(), ViewportError> {
        if size <= 0 {
            return Err(CoreError::NonPositive {
                name: "grid_size",
                value: size.into(),
            }
            .into());
        }
        self.config.grid_size = size;
        self.pipeline.settings.grid_size = size;
        self.invalidate_all()
    }

    pub fn set_show_grid(&mut self, show: bool) -> Result<(), ViewportError> {
        if self.config.show_grid == show {
            return Ok(());
        }
        self.config.show_grid = show;
        self.pipeline.settings.show_grid = show;
        self.invalidate_all()
    }

    /// Grip radius in pixels. Repaint margins grow along with it.
    pub fn set_grip_size(&mut self, size: i32) -> Result<(), ViewportError> {
        if size <= 0 {
            return Err(CoreError::NonPositive {
                name: "grip_size",
                value: size.into(),
            }
            .into());
        }
        self.config.grip_size = size;
        self.pipeline.settings.grips.radius = f64::from(size);
        self.tracker
            .set_handle_margin(self.config.handle_margin.max(size));
        self.invalidate_all()
    }

    pub fn set_snap_to_grid(&mut self, snap: bool, distance: i32) -> Result<(), ViewportError> {
        if distance < 0 {
            return Err(CoreError::OutOfRange {
                name: "snap_distance",
                value: distance.into(),
                min: 0,
                max: i64::from(i32::MAX),
            }
            .into());
        }
        self.config.snap_to_grid = snap;
        self.config.snap_distance = distance;
        Ok(())
    }

    /// Snap a diagram point to the grid when snapping is on.
    pub fn snap(&self, p: Point) -> Point {
        if !self.config.snap_to_grid {
            return p;
        }
        dv_core::snap_to_grid(p, self.config.grid_size, self.config.snap_distance)
    }

    pub fn set_design(&mut self, design: Design) -> Result<(), ViewportError> {
        self.styles.set_design(design);
        self.invalidate_all()
    }

    /// Update one named style. Cached pens and brushes of that style are
    /// dropped and the view repainted.
    pub fn apply_style_change(&mut self, change: StyleChange) -> Result<(), ViewportError> {
        let kind = self.styles.apply(change);
        log::debug!("style changed: {kind:?}");
        self.invalidate_all()
    }

    // ─── Layers ──────────────────────────────────────────────────────────

    pub fn is_layer_visible(&self, layer: LayerId) -> bool {
        !self.layers.is_layer_hidden(layer)
    }

    pub fn is_layer_active(&self, layer: LayerId) -> bool {
        self.layers.is_layer_active(layer)
    }

    /// Show or hide layers. Selected shapes that disappear are unselected;
    /// the whole change is one repaint.
    pub fn set_layer_visibility(
        &mut self,
        layers: impl IntoIterator<Item = LayerId>,
        visible: bool,
    ) -> Result<bool, ViewportError> {
        let layers: Vec<LayerId> = layers.into_iter().collect();
        if !self.layers.set_visibility(layers.iter().copied(), visible) {
            return Ok(false);
        }
        log::debug!("layers {layers:?} visible: {visible}");
        self.events.push(ViewportEvent::LayerVisibilityChanged(layers));
        self.batched(|this| {
            this.invalidate_all()?;
            this.prune_selection()
        })?;
        Ok(true)
    }

    /// Mark layers active; new shapes are placed on the active layers.
    pub fn set_layers_active(
        &mut self,
        layers: impl IntoIterator<Item = LayerId>,
        active: bool,
    ) -> Result<bool, ViewportError> {
        let layers: Vec<LayerId> = layers.into_iter().collect();
        if !self.layers.set_active(layers.iter().copied(), active) {
            return Ok(false);
        }
        log::debug!("layers {layers:?} active: {active}");
        self.events.push(ViewportEvent::ActiveLayersChanged(layers));
        self.batched(|this| this.prune_selection())?;
        Ok(true)
    }

    /// Unselect shapes on layers that are no longer shown.
    fn prune_selection(&mut self) -> Result<(), ViewportError> {
        let visible = self.visible_layers();
        let mut cx = SelectionCx {
            diagram: &self.diagram,
            transform: &self.transform,
            tracker: &mut self.tracker,
        };
        let dropped = self.selection.unselect_invisible(&mut cx, &visible)?;
        if !dropped.is_empty() {
            self.notify_selection();
        }
        Ok(())
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Run a selection mutation as one repaint and notify once if it
    /// changed anything.
    fn change_selection(
        &mut self,
        f: impl FnOnce(&mut SelectionSet, &mut SelectionCx<'_>) -> Result<bool, ViewportError>,
    ) -> Result<bool, ViewportError> {
        let changed = self.update_selection(f)?;
        if changed {
            self.notify_selection();
        }
        Ok(changed)
    }

    /// [`change_selection`](Self::change_selection) without the
    /// notification, for callers that raise one for several steps.
    fn update_selection(
        &mut self,
        f: impl FnOnce(&mut SelectionSet, &mut SelectionCx<'_>) -> Result<bool, ViewportError>,
    ) -> Result<bool, ViewportError> {
        self.tracker.suspend();
        let result = {
            let mut cx = SelectionCx {
                diagram: &self.diagram,
                transform: &self.transform,
                tracker: &mut self.tracker,
            };
            f(&mut self.selection, &mut cx)
        };
        self.tracker.resume()?;
        result
    }

    /// Selected shapes, bottom of z-order first.
    pub fn selected_shapes(&self) -> Vec<ShapeId> {
        self.selection.bottom_up(&self.diagram)
    }

    /// Shapes glued by reference to a selected shape.
    pub fn connected_shapes(&self) -> Vec<ShapeId> {
        self.selection.connected_shapes()
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(id)
    }

    /// Select `id`, honouring group and aggregation promotion.
    pub fn select(&mut self, id: ShapeId, add: bool) -> Result<bool, ViewportError> {
        self.change_selection(|sel, cx| sel.select(cx, id, add))
    }

    pub fn select_shapes(
        &mut self,
        ids: &[ShapeId],
        add: bool,
    ) -> Result<bool, ViewportError> {
        self.change_selection(|sel, cx| {
            let mut changed = if add { false } else { sel.clear(cx)? };
            for id in ids {
                changed |= sel.select(cx, *id, true)?;
            }
            Ok(changed)
        })
    }

    pub fn select_aggregation(&mut self, owner: ShapeId, add: bool) -> Result<bool, ViewportError> {
        self.change_selection(|sel, cx| sel.select_aggregation(cx, owner, add))
    }

    pub fn unselect(&mut self, id: ShapeId) -> Result<bool, ViewportError> {
        self.change_selection(|sel, cx| sel.unselect(cx, id))
    }

    pub fn unselect_all(&mut self) -> Result<bool, ViewportError> {
        self.change_selection(|sel, cx| sel.clear(cx))
    }

    /// Unselect `id` if its unit is selected, select it otherwise.
    pub fn toggle(&mut self, id: ShapeId) -> Result<bool, ViewportError> {
        let root = self.diagram.root_of(id);
        if self.selection.contains(id) || self.selection.contains(root) {
            let target = if self.selection.contains(id) { id } else { root };
            self.unselect(target)
        } else {
            self.select(id, true)
        }
    }

    /// Select every visible top-level shape.
    pub fn select_all(&mut self) -> Result<bool, ViewportError> {
        let visible = self.visible_layers();
        let roots: Vec<ShapeId> = self
            .diagram
            .draw_order()
            .into_iter()
            .filter(|id| self.diagram.parent(*id).is_none() && self.is_shown(&visible, *id))
            .collect();
        self.change_selection(|sel, cx| {
            let mut changed = false;
            for id in roots {
                changed |= sel.add(cx, id)?;
            }
            Ok(changed)
        })
    }

    /// Select visible shapes lying entirely inside a diagram rectangle.
    pub fn select_in_rect(&mut self, rect: Rect, add: bool) -> Result<bool, ViewportError> {
        let rect = rect.validate()?;
        let visible = self.visible_layers();
        let hits = find_shapes_in(&self.diagram, &visible, rect);
        self.select_shapes(&hits, add)
    }

    /// Select visible shapes of the given type name.
    pub fn select_by_type(&mut self, type_name: &str, add: bool) -> Result<bool, ViewportError> {
        let hits = self.matching(|s| s.type_name == type_name);
        self.select_shapes(&hits, add)
    }

    /// Select visible shapes created from the given template.
    pub fn select_by_template(&mut self, template: &str, add: bool) -> Result<bool, ViewportError> {
        let hits = self.matching(|s| s.template.as_deref() == Some(template));
        self.select_shapes(&hits, add)
    }

    fn matching(&self, pred: impl Fn(&Shape) -> bool) -> Vec<ShapeId> {
        let visible = self.visible_layers();
        self.diagram
            .draw_order()
            .into_iter()
            .filter(|id| self.is_shown(&visible, *id))
            .filter(|id| self.diagram.get(*id).is_some_and(&pred))
            .collect()
    }

    /// Topmost visible shape under a viewport point.
    pub fn shape_at(&self, at: Point) -> Option<ShapeId> {
        let p = self.transform.to_diagram(at);
        let tolerance = self.transform.distance_to_diagram(self.config.grip_size);
        let visible = self.visible_layers();
        find_shape_at(
            &self.diagram,
            &visible,
            &*self.renderer,
            p,
            None,
            tolerance,
        )
    }

    /// Select the shape under a viewport point. Clicking empty space
    /// without `add` clears the selection.
    pub fn select_at(&mut self, at: Point, add: bool) -> Result<Option<ShapeId>, ViewportError> {
        match self.shape_at(at) {
            Some(id) => {
                self.select(id, add)?;
                Ok(Some(id))
            }
            None => {
                if !add {
                    self.unselect_all()?;
                }
                Ok(None)
            }
        }
    }

    // ─── Edit operations ─────────────────────────────────────────────────

    /// Whether `operation` is possible on the current selection, with a
    /// reason when it is not.
    pub fn can(&self, operation: EditOperation) -> Result<(), String> {
        match operation {
            EditOperation::Copy => {
                if self.selection.is_empty() {
                    return Err("no shapes selected".into());
                }
                Ok(())
            }
            EditOperation::Paste => {
                if self.edit_buffer.is_empty() {
                    return Err("nothing to paste".into());
                }
                Ok(())
            }
            EditOperation::Undo if !self.commands.can_undo() => Err("nothing to undo".into()),
            EditOperation::Redo if !self.commands.can_redo() => Err("nothing to redo".into()),
            EditOperation::Undo | EditOperation::Redo | EditOperation::Insert => Ok(()),
            EditOperation::CaptionEdit => match self.selected_shapes().as_slice() {
                [id] if self.diagram.get(*id).is_some_and(|s| s.caption_bounds.is_some()) => {
                    Ok(())
                }
                _ => Err("select one shape with a caption".into()),
            },
            _ => {
                let command = self.command_for(operation, &self.selected_shapes())?;
                self.commands.check(&self.diagram, &command)
            }
        }
    }

    /// Build the command for a selection-based operation.
    fn command_for(
        &self,
        operation: EditOperation,
        ids: &[ShapeId],
    ) -> Result<DiagramCommand, String> {
        let ids = ids.to_vec();
        match operation {
            EditOperation::Cut | EditOperation::Delete => Ok(DiagramCommand::Delete { ids }),
            EditOperation::Move => Ok(DiagramCommand::Move { ids, dx: 0, dy: 0 }),
            EditOperation::ZOrder => Ok(DiagramCommand::ZOrder {
                ids,
                to_front: true,
            }),
            EditOperation::Group => {
                let bounds = union_all(ids.iter().filter_map(|id| self.diagram.total_bounds(*id)))
                    .ok_or("no shapes selected")?;
                let (home, supplemental) = self.layers.active_assignment();
                let group = Shape::new(ShapeId::with_prefix("group"), ShapeKind::Group, "Group", bounds)
                    .with_layers(home, supplemental);
                Ok(DiagramCommand::Group {
                    group,
                    members: ids,
                })
            }
            EditOperation::Ungroup => match ids.as_slice() {
                [group] => Ok(DiagramCommand::Ungroup { group: *group }),
                _ => Err("select exactly one group".into()),
            },
            EditOperation::Aggregate => match ids.split_first() {
                Some((owner, members)) if !members.is_empty() => Ok(DiagramCommand::Aggregate {
                    owner: *owner,
                    members: members.to_vec(),
                }),
                _ => Err("select an owner and at least one member".into()),
            },
            EditOperation::Disaggregate => match ids.as_slice() {
                [owner] => {
                    let members = self.diagram.children(*owner);
                    if members.is_empty() {
                        return Err("shape has no aggregated members".into());
                    }
                    Ok(DiagramCommand::Disaggregate {
                        owner: *owner,
                        members,
                    })
                }
                _ => Err("select exactly one aggregation owner".into()),
            },
            other => Err(format!("{other} is not a selection command")),
        }
    }

    /// Check and execute a command, then react to its changes.
    fn run(
        &mut self,
        operation: EditOperation,
        command: DiagramCommand,
    ) -> Result<(), ViewportError> {
        if self.execute(operation, command)? {
            self.notify_selection();
        }
        Ok(())
    }

    /// Like [`run`](Self::run), then make `select` the selection. One
    /// selection notification covers both steps.
    fn run_and_select(
        &mut self,
        operation: EditOperation,
        command: DiagramCommand,
        select: &[ShapeId],
    ) -> Result<(), ViewportError> {
        let changed = self.batched(|this| {
            let forgotten = this.execute(operation, command)?;
            let replaced = this.update_selection(|sel, cx| replace_in(sel, cx, select))?;
            Ok(forgotten | replaced)
        })?;
        if changed {
            self.notify_selection();
        }
        Ok(())
    }

    /// Returns whether the selection lost deleted shapes.
    fn execute(
        &mut self,
        operation: EditOperation,
        command: DiagramCommand,
    ) -> Result<bool, ViewportError> {
        if let Err(reason) = self.commands.check(&self.diagram, &command) {
            return Err(self.reject(operation, reason));
        }
        let description = operation.to_string();
        let changes = self
            .commands
            .execute(&mut self.diagram, command, &description)?;
        self.batched(|this| this.apply_changes(&changes))
    }

    /// Build, check and execute a selection-based command on a snapshot
    /// of the selection.
    fn run_on_selection(&mut self, operation: EditOperation) -> Result<Vec<ShapeId>, ViewportError> {
        let ids = self.selected_shapes();
        let command = match self.command_for(operation, &ids) {
            Ok(command) => command,
            Err(reason) => return Err(self.reject(operation, reason)),
        };
        self.run(operation, command)?;
        Ok(ids)
    }

    /// Copy the selection into the edit buffer, then delete it.
    pub fn cut(&mut self, with_models: bool) -> Result<(), ViewportError> {
        let ids = self.selected_shapes();
        let command = DiagramCommand::Delete { ids: ids.clone() };
        if let Err(reason) = self.commands.check(&self.diagram, &command) {
            return Err(self.reject(EditOperation::Cut, reason));
        }
        let action = if with_models {
            EditAction::CutWithModels
        } else {
            EditAction::Cut
        };
        self.edit_buffer.store(action, &self.diagram, &ids);
        self.run(EditOperation::Cut, command)
    }

    pub fn copy(&mut self, with_models: bool) -> Result<(), ViewportError> {
        let ids = self.selected_shapes();
        if ids.is_empty() {
            return Err(self.reject(EditOperation::Copy, "no shapes selected"));
        }
        let action = if with_models {
            EditAction::CopyWithModels
        } else {
            EditAction::Copy
        };
        self.edit_buffer.store(action, &self.diagram, &ids);
        Ok(())
    }

    /// Paste the edit buffer at a diagram position, or one grid cell
    /// further along per repeated paste. The pasted shapes become the
    /// selection.
    pub fn paste(&mut self, target: Option<Point>) -> Result<Vec<ShapeId>, ViewportError> {
        if self.edit_buffer.is_empty() {
            return Err(self.reject(EditOperation::Paste, "nothing to paste"));
        }
        let shapes = self
            .edit_buffer
            .prepare_paste(target, self.config.grid_size);
        let roots: Vec<ShapeId> = shapes
            .iter()
            .filter(|p| p.parent.is_none())
            .map(|p| p.shape.id)
            .collect();
        self.run_and_select(EditOperation::Paste, DiagramCommand::Insert { shapes }, &roots)?;
        Ok(roots)
    }

    pub fn delete_selection(&mut self) -> Result<(), ViewportError> {
        self.run_on_selection(EditOperation::Delete).map(drop)
    }

    /// Group the selection and select the new group.
    pub fn group(&mut self) -> Result<ShapeId, ViewportError> {
        let ids = self.selected_shapes();
        let command = match self.command_for(EditOperation::Group, &ids) {
            Ok(command) => command,
            Err(reason) => return Err(self.reject(EditOperation::Group, reason)),
        };
        let DiagramCommand::Group { group, .. } = &command else {
            return Err(ViewportError::InvalidCommand("group".into()));
        };
        let group = group.id;
        self.run_and_select(EditOperation::Group, command, &[group])?;
        Ok(group)
    }

    /// Dissolve the selected group; its members become the selection.
    pub fn ungroup(&mut self) -> Result<Vec<ShapeId>, ViewportError> {
        let ids = self.selected_shapes();
        let command = match self.command_for(EditOperation::Ungroup, &ids) {
            Ok(command) => command,
            Err(reason) => return Err(self.reject(EditOperation::Ungroup, reason)),
        };
        let members = match ids.as_slice() {
            [group] => self.diagram.children(*group),
            _ => Vec::new(),
        };
        self.run_and_select(EditOperation::Ungroup, command, &members)?;
        Ok(members)
    }

    /// Make the rest of the selection members of its bottom-most shape.
    /// The selection stays as it was.
    pub fn aggregate(&mut self) -> Result<(), ViewportError> {
        self.run_on_selection(EditOperation::Aggregate).map(drop)
    }

    pub fn disaggregate(&mut self) -> Result<(), ViewportError> {
        self.run_on_selection(EditOperation::Disaggregate).map(drop)
    }

    pub fn bring_to_front(&mut self) -> Result<(), ViewportError> {
        self.z_order(true)
    }

    pub fn send_to_back(&mut self) -> Result<(), ViewportError> {
        self.z_order(false)
    }

    fn z_order(&mut self, to_front: bool) -> Result<(), ViewportError> {
        let ids = self.selected_shapes();
        self.run(EditOperation::ZOrder, DiagramCommand::ZOrder { ids, to_front })
    }

    /// Move the selection by a diagram-space delta.
    pub fn move_selection(&mut self, dx: i32, dy: i32) -> Result<(), ViewportError> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        let ids = self.selected_shapes();
        self.run(EditOperation::Move, DiagramCommand::Move { ids, dx, dy })
    }

    /// Arrow-key move: one unit, or one grid cell when `coarse`.
    pub fn nudge(&mut self, dx: i32, dy: i32, coarse: bool) -> Result<(), ViewportError> {
        let step = if coarse { self.config.grid_size } else { 1 };
        self.move_selection(dx * step, dy * step)
    }

    pub fn insert_shape(&mut self, shape: Shape) -> Result<ShapeId, ViewportError> {
        let id = shape.id;
        self.insert_shapes(vec![PlacedShape {
            shape,
            parent: None,
        }])?;
        Ok(id)
    }

    /// Insert shapes; parents must precede their children.
    pub fn insert_shapes(&mut self, shapes: Vec<PlacedShape>) -> Result<(), ViewportError> {
        self.run(EditOperation::Insert, DiagramCommand::Insert { shapes })
    }

    pub fn undo(&mut self) -> Result<(), ViewportError> {
        match self.commands.undo(&mut self.diagram)? {
            Some((description, changes)) => {
                log::debug!("undo: {description}");
                self.notify_changes(&changes)
            }
            None => Err(self.reject(EditOperation::Undo, "nothing to undo")),
        }
    }

    pub fn redo(&mut self) -> Result<(), ViewportError> {
        match self.commands.redo(&mut self.diagram)? {
            Some((description, changes)) => {
                log::debug!("redo: {description}");
                self.notify_changes(&changes)
            }
            None => Err(self.reject(EditOperation::Redo, "nothing to redo")),
        }
    }

    // ─── Change feed ─────────────────────────────────────────────────────

    /// React to changes made to the diagram: repaint old and new areas,
    /// drop deleted shapes from the selection and raise notifications.
    /// Hosts call this for edits made outside the command layer.
    pub fn notify_changes(&mut self, changes: &[DiagramChange]) -> Result<(), ViewportError> {
        if self.batched(|this| this.apply_changes(changes))? {
            self.notify_selection();
        }
        Ok(())
    }

    /// Returns whether the selection lost deleted shapes; the caller
    /// raises the notification.
    fn apply_changes(&mut self, changes: &[DiagramChange]) -> Result<bool, ViewportError> {
        let mut selection_changed = false;
        for change in changes {
            match change {
                DiagramChange::ShapesInserted(ids) => {
                    for id in ids {
                        self.tracker
                            .invalidate_shape(&self.diagram, &self.transform, *id)?;
                    }
                    self.events.push(ViewportEvent::ShapesInserted(ids.clone()));
                }
                DiagramChange::ShapesUpdated(updated) => {
                    let mut moved = Vec::new();
                    let mut resized = Vec::new();
                    for (id, old) in updated {
                        self.tracker.invalidate(&self.transform, *old)?;
                        let Some(now) = self.diagram.total_bounds(*id) else {
                            continue;
                        };
                        self.tracker
                            .invalidate_shape(&self.diagram, &self.transform, *id)?;
                        if now.size() == old.size() {
                            moved.push(*id);
                        } else {
                            resized.push(*id);
                        }
                    }
                    if !moved.is_empty() {
                        self.events.push(ViewportEvent::ShapesMoved(moved));
                    }
                    if !resized.is_empty() {
                        self.events.push(ViewportEvent::ShapesResized(resized));
                    }
                }
                DiagramChange::ShapesDeleted(deleted) => {
                    let ids: Vec<ShapeId> = deleted.iter().map(|(id, _)| *id).collect();
                    for (_, old) in deleted {
                        self.tracker.invalidate(&self.transform, *old)?;
                    }
                    if self.caption_editor.is_some_and(|c| ids.contains(&c)) {
                        self.close_caption_editor()?;
                    }
                    if self
                        .highlighted_grip
                        .is_some_and(|(id, _)| ids.contains(&id))
                    {
                        self.highlighted_grip = None;
                    }
                    selection_changed |= self.selection.forget(&self.diagram, &ids);
                    self.events.push(ViewportEvent::ShapesRemoved(ids));
                }
                DiagramChange::ConnectionMade(c) | DiagramChange::ConnectionBroken(c) => {
                    for id in [c.owner, c.connection.other_shape] {
                        if self.diagram.contains(id) {
                            self.tracker
                                .invalidate_shape(&self.diagram, &self.transform, id)?;
                        }
                    }
                    self.selection.refresh_connections(&self.diagram);
                }
                DiagramChange::ZOrderChanged(ids) => {
                    for id in ids {
                        self.tracker
                            .invalidate_shape(&self.diagram, &self.transform, *id)?;
                    }
                }
            }
        }
        self.update_scroll_area()?;
        Ok(selection_changed)
    }

    // ─── Caption editor ──────────────────────────────────────────────────

    pub fn open_caption_editor(&mut self, id: ShapeId) -> Result<(), ViewportError> {
        let caption = self.diagram.try_get(id)?.caption_bounds;
        let Some(caption) = caption else {
            return Err(self.reject(EditOperation::CaptionEdit, "shape has no caption"));
        };
        if self.caption_editor == Some(id) {
            return Ok(());
        }
        self.close_caption_editor()?;
        self.caption_editor = Some(id);
        self.tracker.invalidate(&self.transform, caption)?;
        self.events.push(ViewportEvent::CaptionEditorOpened(id));
        Ok(())
    }

    pub fn close_caption_editor(&mut self) -> Result<(), ViewportError> {
        let Some(id) = self.caption_editor.take() else {
            return Ok(());
        };
        if let Some(caption) = self.diagram.get(id).and_then(|s| s.caption_bounds) {
            self.tracker.invalidate(&self.transform, caption)?;
        }
        self.events.push(ViewportEvent::CaptionEditorClosed(id));
        Ok(())
    }

    // ─── Export size check ───────────────────────────────────────────────

    /// Whether an image of diagram `bounds` at `zoom_level` may be
    /// rendered. Above the pixel ceiling the user is asked; only an
    /// explicit continue allows it.
    pub fn check_export_size(
        &mut self,
        bounds: Rect,
        zoom_level: u32,
    ) -> Result<bool, ViewportError> {
        let bounds = bounds.validate()?;
        let zoom = (f64::from(zoom_level) / 100.0).max(MIN_ZOOM_FACTOR);
        let width = (f64::from(bounds.width) * zoom).ceil() as u64;
        let height = (f64::from(bounds.height) * zoom).ceil() as u64;
        let pixels = width.saturating_mul(height);
        let ceiling = self.config.max_preview_pixels;
        if pixels <= ceiling {
            return Ok(true);
        }
        log::warn!("export of {width}x{height} px exceeds {ceiling} px");
        let listener = self
            .listener
            .as_mut()
            .ok_or(ViewportError::NoUserMessageListener)?;
        let answer = listener.show(&UserMessage::confirm(format!(
            "The image would be {width} x {height} pixels, more than the {ceiling} allowed. \
             Continue anyway?"
        )));
        Ok(answer == Confirmation::Continue)
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Feed one input event. Positions are viewport pixels.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<(), ViewportError> {
        match &event {
            InputEvent::PointerDown {
                position,
                button: MouseButton::Middle,
                ..
            } => {
                self.timers.start_universal(*position);
                return Ok(());
            }
            InputEvent::PointerUp {
                button: MouseButton::Middle,
                ..
            } => {
                self.timers.stop_universal();
                return Ok(());
            }
            InputEvent::PointerMove { position, .. } if self.timers.is_universal_scrolling() => {
                self.timers.update_universal(*position);
                return Ok(());
            }
            InputEvent::Wheel {
                position,
                delta,
                modifiers,
            } => return self.wheel(*position, *delta, *modifiers),
            InputEvent::FocusLost => {
                self.timers.stop_universal();
                return self.cancel_tool();
            }
            _ => {}
        }

        let handled = self.dispatch_to_tool(&event)?;
        match &event {
            InputEvent::Key { key, modifiers } if !handled => {
                if let Some(action) = ShortcutMap::resolve(key, *modifiers) {
                    self.perform(action)?;
                }
            }
            InputEvent::PointerMove { position, .. } => {
                self.update_auto_scroll(*position);
                if !handled {
                    self.update_hover(*position)?;
                }
            }
            InputEvent::PointerUp { .. } => self.timers.stop_auto(),
            _ => {}
        }
        Ok(())
    }

    fn wheel(&mut self, at: Point, delta: i32, modifiers: Modifiers) -> Result<(), ViewportError> {
        if delta == 0 {
            return Ok(());
        }
        if modifiers.command() {
            let step = self.config.zoom_step;
            let level = if delta > 0 {
                (self.zoom_level() + step).min(MAX_ZOOM_LEVEL)
            } else {
                self.zoom_level().saturating_sub(step).max(1)
            };
            return self.zoom_at(level, at);
        }
        let amount = -delta * self.config.grid_size;
        if modifiers.shift {
            self.scroll_by(amount, 0)?;
        } else {
            self.scroll_by(0, amount)?;
        }
        Ok(())
    }

    /// Run a keyboard action.
    pub fn perform(&mut self, action: ViewportAction) -> Result<(), ViewportError> {
        log::trace!("action: {action:?}");
        match action {
            ViewportAction::Undo => self.undo(),
            ViewportAction::Redo => self.redo(),
            ViewportAction::Cut => self.cut(false),
            ViewportAction::Copy => self.copy(false),
            ViewportAction::Paste => self.paste(None).map(drop),
            ViewportAction::Delete => self.delete_selection(),
            ViewportAction::SelectAll => self.select_all().map(drop),
            ViewportAction::Group => self.group().map(drop),
            ViewportAction::Ungroup => self.ungroup().map(drop),
            ViewportAction::Aggregate => self.aggregate(),
            ViewportAction::Disaggregate => self.disaggregate(),
            ViewportAction::ZoomIn => self.zoom_in(),
            ViewportAction::ZoomOut => self.zoom_out(),
            ViewportAction::ZoomToFit => self.zoom_to_fit(),
            ViewportAction::BringToFront => self.bring_to_front(),
            ViewportAction::SendToBack => self.send_to_back(),
            ViewportAction::Nudge { dx, dy, coarse } => self.nudge(dx, dy, coarse),
            ViewportAction::Escape => self.unselect_all().map(drop),
        }
    }

    /// Hand an event to the active tool and carry out its requests.
    /// Returns whether the tool consumed it.
    fn dispatch_to_tool(&mut self, event: &InputEvent) -> Result<bool, ViewportError> {
        let tool_event = ToolEvent {
            diagram_position: event.position().map(|p| self.transform.to_diagram(p)),
            input: event.clone(),
        };
        let visible = self.visible_layers();
        let result = {
            let cx = ToolContext {
                diagram: &self.diagram,
                transform: &self.transform,
                selection: &self.selection,
                visible: &visible,
                renderer: &*self.renderer,
                config: &self.config,
                active_layers: self.layers.active_assignment(),
            };
            self.tool.process(&tool_event, &cx)
        };
        match result {
            ToolResult::Handled(requests) => {
                if let Err(err) = self.run_requests(requests) {
                    log::error!("{:?} tool action failed: {err}", self.tool.kind());
                    self.cancel_after_fault();
                    return Err(err);
                }
                Ok(true)
            }
            ToolResult::Unhandled => Ok(false),
            ToolResult::Failed(reason) => {
                log::error!("{:?} tool failed: {reason}", self.tool.kind());
                self.cancel_after_fault();
                Err(ViewportError::ToolFailed(reason))
            }
        }
    }

    fn run_requests(&mut self, requests: Vec<ToolRequest>) -> Result<(), ViewportError> {
        for request in requests {
            match request {
                ToolRequest::Select { shape, add } => {
                    self.select(shape, add)?;
                }
                ToolRequest::Toggle(shape) => {
                    self.toggle(shape)?;
                }
                ToolRequest::SelectInRect { rect, add } => {
                    self.select_in_rect(rect, add)?;
                }
                ToolRequest::UnselectAll => {
                    self.unselect_all()?;
                }
                ToolRequest::BeginMove => {
                    self.commands.begin_batch();
                    self.move_batch_open = true;
                }
                ToolRequest::MoveSelection { dx, dy } => self.move_selection(dx, dy)?,
                ToolRequest::EndMove => {
                    if self.move_batch_open {
                        self.commands.end_batch();
                        self.move_batch_open = false;
                    }
                }
                ToolRequest::CancelMove => self.abort_move()?,
                ToolRequest::Insert(shape) => {
                    let id = self.insert_shape(shape)?;
                    self.select(id, false)?;
                }
                ToolRequest::Invalidate(rect) => self.tracker.invalidate(&self.transform, rect)?,
            }
        }
        Ok(())
    }

    fn abort_move(&mut self) -> Result<(), ViewportError> {
        if !self.move_batch_open {
            return Ok(());
        }
        self.move_batch_open = false;
        let changes = self.commands.abort_batch(&mut self.diagram)?;
        self.notify_changes(&changes)
    }

    /// Cancel the active tool action and revert a drag in progress.
    pub fn cancel_tool(&mut self) -> Result<(), ViewportError> {
        self.timers.stop_auto();
        let requests = self.tool.cancel();
        let result = self.run_requests(requests);
        // Always close a drag batch, even when the tool's own requests failed.
        self.abort_move()?;
        result
    }

    /// Cancel after the tool faulted. The fault is what the caller sees,
    /// so a failing cancel is only logged.
    fn cancel_after_fault(&mut self) {
        if let Err(err) = self.cancel_tool() {
            log::error!("cancelling {:?} tool failed: {err}", self.tool.kind());
        }
    }

    fn update_auto_scroll(&mut self, at: Point) {
        let delta = self.tool.is_busy().then(|| {
            auto_scroll_delta(
                at,
                self.transform.draw_bounds(),
                self.config.auto_scroll_margin,
                self.config.auto_scroll_step,
            )
        });
        match delta.flatten() {
            Some(delta) => self.timers.start_auto(delta, at),
            None => self.timers.stop_auto(),
        }
    }

    /// Highlight the grip of a selected shape under the pointer.
    fn update_hover(&mut self, at: Point) -> Result<(), ViewportError> {
        let p = self.transform.to_diagram(at);
        let tolerance = self.transform.distance_to_diagram(self.config.grip_size);
        let hit = self
            .selection
            .top_down(&self.diagram)
            .into_iter()
            .filter_map(|id| self.diagram.get(id))
            .find_map(|s| {
                find_control_point_at(s, p, ControlPointCapabilities::ALL, tolerance)
                    .map(|cp| (s.id, cp))
            });
        if hit == self.highlighted_grip {
            return Ok(());
        }
        let touched = [self.highlighted_grip, hit];
        self.highlighted_grip = hit;
        self.batched(|this| {
            for (id, _) in touched.into_iter().flatten() {
                if this.diagram.contains(id) {
                    this.tracker
                        .invalidate_shape(&this.diagram, &this.transform, id)?;
                }
            }
            Ok(())
        })
    }

    pub fn cursor(&self) -> Cursor {
        match self
            .timers
            .universal_direction(self.config.universal_scroll_dead_zone)
        {
            Some(direction) => Cursor::Scroll(direction),
            None => self.tool.cursor(),
        }
    }

    // ─── Timers ──────────────────────────────────────────────────────────

    /// Timer interval the host should call [`tick`](Self::tick) with.
    pub fn scroll_interval_ms(&self) -> u64 {
        self.config.scroll_interval_ms
    }

    pub fn is_scrolling(&self) -> bool {
        self.timers.is_running()
    }

    /// One timer step for auto-scroll and universal scroll.
    pub fn tick(&mut self) -> Result<(), ViewportError> {
        let ticks = self.timers.tick(
            self.config.universal_scroll_dead_zone,
            self.config.universal_scroll_speed,
        );
        for tick in ticks {
            match tick {
                ScrollTick::Auto { dx, dy, pointer } => {
                    if self.scroll_by(dx, dy)? {
                        // The pointer stands still while the diagram slides
                        // under it; replay the move so the drag follows.
                        let replay = InputEvent::PointerMove {
                            position: pointer,
                            button: Some(MouseButton::Left),
                            modifiers: Modifiers::NONE,
                        };
                        self.dispatch_to_tool(&replay)?;
                    } else {
                        self.timers.stop_auto();
                    }
                }
                ScrollTick::Universal { dx, dy } => {
                    let dx = self.transform.distance_to_diagram(dx);
                    let dy = self.transform.distance_to_diagram(dy);
                    self.scroll_by(dx, dy)?;
                }
            }
        }
        Ok(())
    }

    /// Stop all timers for good, e.g. when the view is closed.
    pub fn detach(&mut self) -> Result<(), ViewportError> {
        self.cancel_tool()?;
        self.timers.detach();
        log::debug!("viewport detached");
        Ok(())
    }

    pub fn attach(&mut self) {
        self.timers.attach();
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    /// Paint the viewport-space `dirty` rectangle.
    pub fn render(
        &mut self,
        canvas: &mut dyn Canvas,
        dirty: Rect,
    ) -> Result<FrameStats, ViewportError> {
        let selection = self.selection.bottom_up(&self.diagram);
        let connected = self.selection.connected_shapes();
        let caption_editor = self
            .caption_editor
            .and_then(|id| self.diagram.get(id))
            .and_then(|s| s.caption_bounds);
        let frame = Frame {
            diagram: &self.diagram,
            transform: &self.transform,
            layers: &self.layers,
            selection: &selection,
            connected: &connected,
            dirty,
            caption_editor,
            highlighted_grip: self.highlighted_grip,
            grips_inactive: self.tool.is_busy(),
        };
        let preview = ActiveTool(&*self.tool);
        let mut ctx = RenderContext::new(canvas, &self.transform);
        let stats = self.pipeline.render(
            &mut ctx,
            &frame,
            &*self.renderer,
            &mut self.styles,
            Some(&preview),
        )?;
        log::trace!("frame: {stats:?}");
        Ok(stats)
    }
}

fn replace_in(
    sel: &mut SelectionSet,
    cx: &mut SelectionCx<'_>,
    ids: &[ShapeId],
) -> Result<bool, ViewportError> {
    if sel.iter().eq(ids.iter().copied()) {
        return Ok(false);
    }
    let mut changed = sel.clear(cx)?;
    for id in ids {
        changed |= sel.add(cx, *id)?;
    }
    Ok(changed)
}
