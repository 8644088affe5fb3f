//! End-to-end viewport behaviour: invalidation, selection and layer
//! visibility working together through the controller.

use dv_core::{
    Diagram, Layer, LayerId, LayerIds, LayerVisibility, Point, Rect, Shape, ShapeId, Size,
    Transform, ViewportConfig,
};
use dv_editor::{Confirmation, UserMessage, ViewportController, ViewportError, ViewportEvent};
use pretty_assertions::assert_eq;

fn id(name: &str) -> ShapeId {
    ShapeId::intern(name)
}

/// Two boxes on no layer, one on layer 5, an aggregation and a zoom-gated
/// note layer.
fn diagram() -> Diagram {
    let mut d = Diagram::new("scenarios", Size::new(600, 400));
    d.add_layer(Layer::new(LayerId(5), "five"));
    d.add_layer(Layer::new(LayerId(40), "notes").with_zoom_thresholds(25, 200));
    d.insert(Shape::planar_box(id("s.a"), Rect::new(20, 20, 40, 40)))
        .unwrap();
    d.insert(Shape::planar_box(id("s.b"), Rect::new(100, 20, 40, 40)))
        .unwrap();
    d.insert(
        Shape::planar_box(id("s.c"), Rect::new(200, 20, 40, 40))
            .with_layers(LayerId(5), LayerIds::NONE),
    )
    .unwrap();
    d.insert(
        Shape::planar_box(id("s.note"), Rect::new(300, 20, 40, 40))
            .with_layers(LayerId(40), LayerIds::NONE),
    )
    .unwrap();
    d.insert(Shape::planar_box(id("s.owner"), Rect::new(20, 200, 200, 100)))
        .unwrap();
    d.insert_child(
        id("s.owner"),
        Shape::planar_box(id("s.part1"), Rect::new(30, 210, 40, 40)),
    )
    .unwrap();
    d.insert_child(
        id("s.owner"),
        Shape::planar_box(id("s.part2"), Rect::new(100, 210, 40, 40)),
    )
    .unwrap();
    d
}

fn controller() -> ViewportController {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut c = ViewportController::new(ViewportConfig::default(), diagram()).unwrap();
    c.set_draw_bounds(Rect::new(0, 0, 1000, 800)).unwrap();
    c.set_user_message_listener(|_: &UserMessage| Confirmation::Acknowledged);
    c.drain_events();
    c.take_repaint_requests();
    c
}

fn selection_events(events: &[ViewportEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ViewportEvent::ShapesSelected(_)))
        .count()
}

// ─── Properties ─────────────────────────────────────────────────────────

#[test]
fn invalidation_coalescing() {
    let mut c = controller();
    let rects = [
        Rect::new(10, 10, 20, 20),
        Rect::new(300, 150, 5, 5),
        Rect::new(-40, 90, 10, 30),
    ];
    c.suspend_updates();
    c.suspend_updates();
    for r in rects {
        c.invalidate(r).unwrap();
    }
    c.resume_updates().unwrap();
    assert!(c.take_repaint_requests().is_empty(), "inner resume must not flush");
    c.resume_updates().unwrap();

    let repaints = c.take_repaint_requests();
    assert_eq!(repaints.len(), 1);
    let margin = c.config().handle_margin;
    for r in rects {
        let grown = c.transform().rect_to_viewport(r).inflate(margin, margin);
        assert!(repaints[0].contains_rect(&grown), "{grown:?} not covered");
    }

    assert_eq!(c.resume_updates(), Err(ViewportError::UnbalancedResume));
}

#[test]
fn selection_idempotence() {
    let mut c = controller();
    assert!(c.select(id("s.a"), false).unwrap());
    let first = c.selection().clone();
    c.drain_events();
    c.take_repaint_requests();

    assert!(!c.select(id("s.a"), false).unwrap());
    assert_eq!(c.selection(), &first);
    assert!(c.take_repaint_requests().is_empty());
    assert!(c.drain_events().is_empty());
}

#[test]
fn aggregation_selection_law() {
    let mut one_by_one = controller();
    one_by_one.select_aggregation(id("s.owner"), false).unwrap();
    assert_eq!(
        one_by_one.selected_shapes(),
        vec![id("s.part1"), id("s.part2")]
    );
    one_by_one.select_aggregation(id("s.owner"), false).unwrap();

    let mut direct = controller();
    direct.select(id("s.owner"), false).unwrap();

    assert_eq!(one_by_one.selection(), direct.selection());
    assert_eq!(direct.selected_shapes(), vec![id("s.owner")]);
}

#[test]
fn aggregation_children_promote_to_owner() {
    let mut c = controller();
    c.select(id("s.part2"), false).unwrap();
    assert_eq!(c.selected_shapes(), vec![id("s.owner")]);
}

#[test]
fn visibility_consistency() {
    let mut layers = LayerVisibility::new();
    assert!(layers.is_visible(LayerId::NONE, LayerIds::NONE));

    let before = layers.is_visible(LayerId(5), LayerIds::NONE);
    layers.set_visibility([LayerId(5)], false);
    assert!(!layers.is_visible(LayerId(5), LayerIds::NONE));
    assert!(layers.is_visible(LayerId::NONE, LayerIds::NONE));
    layers.set_visibility([LayerId(5)], true);
    assert_eq!(layers.is_visible(LayerId(5), LayerIds::NONE), before);
}

#[test]
fn zoom_selection_pruning() {
    let mut c = controller();
    c.select_shapes(&[id("s.a"), id("s.note")], false).unwrap();
    assert_eq!(c.selected_shapes(), vec![id("s.a"), id("s.note")]);
    c.drain_events();

    c.set_zoom_level(300).unwrap();
    let events = c.drain_events();
    assert_eq!(events[0], ViewportEvent::ZoomChanged(300));
    assert_eq!(selection_events(&events), 1);
    assert!(events.contains(&ViewportEvent::ShapesSelected(vec![id("s.a")])));
    assert_eq!(c.selected_shapes(), vec![id("s.a")]);

    // The note layer is no longer offered for selection either.
    c.select_all().unwrap();
    assert!(!c.is_selected(id("s.note")));
}

// ─── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn scenario_a_add_to_selection() {
    let mut c = controller();
    assert_eq!(c.zoom_level(), 100);
    c.select(id("s.a"), false).unwrap();
    c.select(id("s.b"), true).unwrap();
    assert_eq!(c.selection().len(), 2);
    assert_eq!(c.selected_shapes(), vec![id("s.a"), id("s.b")]);
}

#[test]
fn scenario_b_hiding_a_layer_unselects_its_shapes() {
    let mut c = controller();
    c.select_shapes(&[id("s.a"), id("s.c")], false).unwrap();
    c.drain_events();
    c.take_repaint_requests();

    assert!(c.set_layer_visibility([LayerId(5)], false).unwrap());
    assert_eq!(c.selected_shapes(), vec![id("s.a")]);

    let repaints = c.take_repaint_requests();
    assert_eq!(repaints.len(), 1);
    let margin = c.config().handle_margin;
    let c_bounds = c.diagram().total_bounds(id("s.c")).unwrap();
    let covered = c.transform().rect_to_viewport(c_bounds).inflate(margin, margin);
    assert!(repaints[0].contains_rect(&covered));

    let events = c.drain_events();
    assert_eq!(
        events,
        vec![
            ViewportEvent::LayerVisibilityChanged(vec![LayerId(5)]),
            ViewportEvent::ShapesSelected(vec![id("s.a")]),
        ]
    );
}

#[test]
fn scenario_c_cut_then_paste_offsets_by_one_grid_cell() {
    let mut c = controller();
    c.select_shapes(&[id("s.a"), id("s.b")], false).unwrap();
    c.cut(false).unwrap();
    assert!(!c.diagram().contains(id("s.a")));
    assert!(c.selected_shapes().is_empty());

    let pasted = c.paste(None).unwrap();
    assert_eq!(pasted.len(), 2);
    assert_eq!(c.selected_shapes(), pasted);
    let origins: Vec<Point> = pasted
        .iter()
        .map(|p| c.diagram().get(*p).unwrap().bounds.origin())
        .collect();
    assert_eq!(origins, vec![Point::new(40, 40), Point::new(120, 40)]);

    // A second paste fans out one more cell.
    let again = c.paste(None).unwrap();
    let origin = c.diagram().get(again[0]).unwrap().bounds.origin();
    assert_eq!(origin, Point::new(60, 60));
}

#[test]
fn scenario_d_half_zoom_with_anchor() {
    let mut t = Transform::new();
    t.set_zoom_level(50);
    t.set_anchor(Point::new(10, 10));
    assert_eq!(t.scroll(), Point::new(0, 0));
    assert_eq!(t.to_viewport(Point::new(100, 100)), Point::new(60, 60));
}

// ─── Edits ──────────────────────────────────────────────────────────────

#[test]
fn paste_with_nothing_buffered_is_rejected() {
    let mut c = controller();
    assert!(matches!(
        c.paste(None),
        Err(ViewportError::EditRejected { .. })
    ));
}

#[test]
fn select_by_type_and_template() {
    let mut c = controller();
    let templated =
        Shape::planar_box(id("s.t"), Rect::new(400, 100, 30, 30)).with_template("Pump");
    c.insert_shape(templated).unwrap();

    c.select_by_template("Pump", false).unwrap();
    assert_eq!(c.selected_shapes(), vec![id("s.t")]);

    c.set_layer_visibility([LayerId(5)], false).unwrap();
    c.select_by_type("Box", false).unwrap();
    assert!(c.is_selected(id("s.a")));
    assert!(!c.is_selected(id("s.c")));
    assert!(c.is_selected(id("s.owner")));
}

#[test]
fn rubber_band_selects_contained_shapes() {
    let mut c = controller();
    c.select_in_rect(Rect::new(0, 0, 150, 100), false).unwrap();
    assert_eq!(c.selected_shapes(), vec![id("s.a"), id("s.b")]);
}

#[test]
fn replacing_the_diagram_resets_the_view() {
    let mut c = controller();
    c.select(id("s.a"), false).unwrap();
    c.drain_events();
    c.set_diagram(Diagram::new("empty", Size::new(100, 100))).unwrap();
    assert!(c.selected_shapes().is_empty());
    assert!(!c.can_undo());
    let events = c.drain_events();
    assert_eq!(events.first(), Some(&ViewportEvent::DiagramChanging));
    assert_eq!(events.last(), Some(&ViewportEvent::DiagramChanged));
}
