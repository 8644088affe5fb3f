//! Hit testing: point/rect → shape lookup.
//!
//! Walks the draw order in reverse (last drawn = topmost) and skips shapes
//! whose layers are not visible in the current frame.

use crate::renderer::ShapeRenderer;
use dv_core::{
    ControlPointCapabilities, ControlPointId, Diagram, Point, Rect, Shape, ShapeId, VisibleLayers,
};

fn shown(shape: &Shape, visible: &VisibleLayers) -> bool {
    visible.shows(shape.home_layer, shape.supplemental_layers)
}

/// Find the topmost visible shape at diagram point `p`.
///
/// With a capability filter, only shapes with a matching control point
/// within `tolerance` of `p` count as hit.
pub fn find_shape_at(
    diagram: &Diagram,
    visible: &VisibleLayers,
    renderer: &dyn ShapeRenderer,
    p: Point,
    filter: Option<ControlPointCapabilities>,
    tolerance: i32,
) -> Option<ShapeId> {
    diagram
        .draw_order()
        .into_iter()
        .rev()
        .filter_map(|id| diagram.get(id))
        .filter(|s| shown(s, visible))
        .find(|s| match filter {
            Some(caps) => find_control_point_at(s, p, caps, tolerance).is_some(),
            None => renderer.contains_point(s, p, tolerance),
        })
        .map(|s| s.id)
}

/// Control point of `shape` with `caps` closest to `p` within `tolerance`.
pub fn find_control_point_at(
    shape: &Shape,
    p: Point,
    caps: ControlPointCapabilities,
    tolerance: i32,
) -> Option<ControlPointId> {
    shape
        .control_points
        .iter()
        .filter(|cp| cp.capabilities.intersects(caps))
        .map(|cp| (cp.id, cp.position.distance_to(p)))
        .filter(|(_, d)| *d <= f64::from(tolerance))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Visible shapes lying entirely inside `rect`, bottom first. Group
/// containers are skipped; their members are reported individually.
pub fn find_shapes_in(diagram: &Diagram, visible: &VisibleLayers, rect: Rect) -> Vec<ShapeId> {
    diagram
        .draw_order()
        .into_iter()
        .filter_map(|id| diagram.get(id))
        .filter(|s| !s.kind.is_group() && shown(s, visible))
        .filter(|s| rect.contains_rect(&s.bounds))
        .map(|s| s.id)
        .collect()
}

/// Visible shapes whose bounds touch `rect`, bottom first.
pub fn find_shapes_intersecting(
    diagram: &Diagram,
    visible: &VisibleLayers,
    rect: Rect,
) -> Vec<ShapeId> {
    diagram
        .draw_order()
        .into_iter()
        .filter_map(|id| diagram.get(id))
        .filter(|s| !s.kind.is_group() && shown(s, visible))
        .filter(|s| rect.intersects(&s.bounds))
        .map(|s| s.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::GeometricRenderer;
    use dv_core::{LayerId, LayerIds, LayerVisibility};
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    fn sample() -> Diagram {
        let mut d = Diagram::default();
        d.insert(Shape::planar_box(id("h.below"), Rect::new(0, 0, 100, 100)))
            .unwrap();
        d.insert(
            Shape::planar_box(id("h.above"), Rect::new(50, 50, 100, 100))
                .with_layers(LayerId(4), LayerIds::NONE),
        )
        .unwrap();
        d
    }

    #[test]
    fn topmost_visible_shape_wins() {
        let d = sample();
        let all = VisibleLayers::all();
        let hit = find_shape_at(&d, &all, &GeometricRenderer, Point::new(75, 75), None, 0);
        assert_eq!(hit, Some(id("h.above")));

        let mut lv = LayerVisibility::new();
        lv.set_visibility([LayerId(4)], false);
        let visible = lv.resolve(d.layers(), 100);
        let hit = find_shape_at(&d, &visible, &GeometricRenderer, Point::new(75, 75), None, 0);
        assert_eq!(hit, Some(id("h.below")));
    }

    #[test]
    fn capability_filter_targets_control_points() {
        let d = sample();
        let all = VisibleLayers::all();
        // Edge midpoint of the lower box is a connection point.
        let hit = find_shape_at(
            &d,
            &all,
            &GeometricRenderer,
            Point::new(1, 49),
            Some(ControlPointCapabilities::CONNECT),
            3,
        );
        assert_eq!(hit, Some(id("h.below")));
        let shape = d.get(id("h.below")).unwrap();
        assert_eq!(
            find_control_point_at(shape, Point::new(1, 49), ControlPointCapabilities::CONNECT, 3),
            Some(ControlPointId(4))
        );
    }

    #[test]
    fn rect_query_requires_full_containment() {
        let d = sample();
        let all = VisibleLayers::all();
        assert_eq!(
            find_shapes_in(&d, &all, Rect::new(-1, -1, 120, 120)),
            vec![id("h.below")]
        );
        assert_eq!(
            find_shapes_intersecting(&d, &all, Rect::new(-1, -1, 120, 120)),
            vec![id("h.below"), id("h.above")]
        );
    }
}
