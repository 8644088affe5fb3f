//! Integration tests: undo/redo through the viewport controller.
//!
//! Edits run through the default `CommandStack`; undo and redo must feed
//! the same change stream, so selection and repaint stay in step with the
//! diagram.

use dv_core::{ControlPointId, Diagram, Point, Rect, Shape, ShapeId, Size, ViewportConfig};
use dv_editor::{
    CommandLayer, CommandStack, Confirmation, DiagramCommand, UserMessage, ViewportController,
    ViewportError, ViewportEvent,
};
use pretty_assertions::assert_eq;

fn id(name: &str) -> ShapeId {
    ShapeId::intern(name)
}

fn diagram() -> Diagram {
    let mut d = Diagram::new("undo", Size::new(400, 300));
    d.insert(Shape::planar_box(id("u.box"), Rect::new(20, 20, 60, 40)))
        .unwrap();
    d.insert(Shape::planar_box(id("u.other"), Rect::new(200, 20, 60, 40)))
        .unwrap();
    let mut wire = Shape::line(id("u.wire"), Point::new(80, 40), Point::new(200, 40));
    wire.connect(ControlPointId(2), id("u.other"), ControlPointId::REFERENCE);
    d.insert(wire).unwrap();
    d
}

fn controller() -> ViewportController {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut c = ViewportController::new(ViewportConfig::default(), diagram()).unwrap();
    c.set_draw_bounds(Rect::new(0, 0, 800, 600)).unwrap();
    c.set_user_message_listener(|_: &UserMessage| Confirmation::Acknowledged);
    c.drain_events();
    c.take_repaint_requests();
    c
}

fn origin(c: &ViewportController, name: &str) -> Point {
    c.diagram().get(id(name)).unwrap().bounds.origin()
}

// ─── Basic undo/redo ────────────────────────────────────────────────────

#[test]
fn undo_restores_previous_position() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.move_selection(30, 10).unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(50, 30));

    c.undo().unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(20, 20));
    assert!(c.can_redo());
}

#[test]
fn redo_reapplies_undone_move() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.move_selection(30, 10).unwrap();
    c.undo().unwrap();
    c.redo().unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(50, 30));
}

#[test]
fn undo_reports_moves_and_repaints() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.move_selection(100, 0).unwrap();
    c.drain_events();
    c.take_repaint_requests();

    c.undo().unwrap();
    assert_eq!(
        c.drain_events(),
        vec![ViewportEvent::ShapesMoved(vec![id("u.box")])]
    );
    // Old and new positions flush as one rectangle.
    let repaints = c.take_repaint_requests();
    assert_eq!(repaints.len(), 1);
    let moved_from = c.transform().rect_to_viewport(Rect::new(120, 20, 60, 40));
    assert!(repaints[0].contains_rect(&moved_from));
}

// ─── Multiple operations ────────────────────────────────────────────────

#[test]
fn undo_multiple_operations_in_order() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.move_selection(20, 0).unwrap();
    c.move_selection(0, 40).unwrap();

    c.undo().unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(40, 20), "back to first move");
    c.undo().unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(20, 20), "back to original");
    assert!(!c.can_undo());
}

// ─── Deletion and selection ─────────────────────────────────────────────

#[test]
fn deleting_drops_selection_and_undo_restores_connections() {
    let mut c = controller();
    c.select(id("u.wire"), false).unwrap();
    assert_eq!(c.connected_shapes(), vec![id("u.other")]);
    c.select(id("u.other"), false).unwrap();
    assert!(c.connected_shapes().is_empty());
    c.drain_events();

    c.delete_selection().unwrap();
    assert!(!c.diagram().contains(id("u.other")));
    assert!(c.selected_shapes().is_empty());
    assert!(c.diagram().get(id("u.wire")).unwrap().connections.is_empty());
    let events = c.drain_events();
    assert!(events.contains(&ViewportEvent::ShapesRemoved(vec![id("u.other")])));
    assert!(events.contains(&ViewportEvent::ShapesSelected(Vec::new())));

    c.undo().unwrap();
    assert!(c.diagram().contains(id("u.other")));
    let wire = c.diagram().get(id("u.wire")).unwrap();
    assert_eq!(wire.connections.len(), 1);
    assert_eq!(wire.connections[0].other_shape, id("u.other"));
}

#[test]
fn z_order_change_is_undoable() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.bring_to_front().unwrap();
    assert_eq!(c.diagram().draw_order().last(), Some(&id("u.box")));
    c.undo().unwrap();
    assert_eq!(c.diagram().draw_order().first(), Some(&id("u.box")));
}

// ─── Redo cleared on new action ─────────────────────────────────────────

#[test]
fn new_action_clears_redo_stack() {
    let mut c = controller();
    c.select(id("u.box"), false).unwrap();
    c.move_selection(10, 0).unwrap();
    c.undo().unwrap();
    assert!(c.can_redo(), "should be able to redo after undo");

    c.nudge(1, 0, true).unwrap();
    assert_eq!(origin(&c, "u.box"), Point::new(40, 20));
    assert!(!c.can_redo(), "redo stack should be cleared after new action");
}

// ─── Empty stack edge cases ─────────────────────────────────────────────

#[test]
fn undo_on_empty_stack_is_rejected() {
    let mut c = controller();
    assert!(matches!(
        c.undo(),
        Err(ViewportError::EditRejected { .. })
    ));
    assert!(matches!(
        c.redo(),
        Err(ViewportError::EditRejected { .. })
    ));
}

#[test]
fn stack_without_viewport() {
    let mut d = diagram();
    let mut stack = CommandStack::new(100);
    assert_eq!(stack.undo(&mut d), Ok(None));

    stack
        .execute(
            &mut d,
            DiagramCommand::Move {
                ids: vec![id("u.box")],
                dx: 5,
                dy: 5,
            },
            "move",
        )
        .unwrap();
    let (description, _) = stack.undo(&mut d).unwrap().unwrap();
    assert_eq!(description, "move");
    assert_eq!(d.get(id("u.box")).unwrap().bounds.origin(), Point::new(20, 20));
}
