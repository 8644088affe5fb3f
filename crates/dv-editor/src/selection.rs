//! The set of selected shapes.
//!
//! Selection is aggregation aware: children of a plain aggregation are
//! never selected on their own, children of a group are selected on their
//! own only in "edit member" mode. Every change invalidates the affected
//! shapes through the [`InvalidationTracker`].

use crate::error::ViewportError;
use crate::invalidation::InvalidationTracker;
use dv_core::{ConnectionInfo, CoreError, Diagram, ShapeId, Transform, VisibleLayers};

/// Borrowed state a selection change needs to invalidate what it touches.
pub struct SelectionCx<'a> {
    pub diagram: &'a Diagram,
    pub transform: &'a Transform,
    pub tracker: &'a mut InvalidationTracker,
}

impl SelectionCx<'_> {
    fn invalidate(&mut self, id: ShapeId) -> Result<(), ViewportError> {
        self.tracker.invalidate_shape(self.diagram, self.transform, id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    /// Insertion order, no duplicates.
    shapes: Vec<ShapeId>,
    /// Shapes a selected shape is glued to as a whole.
    connected: Vec<(ShapeId, ConnectionInfo)>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains(&id)
    }

    /// Selected shapes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.shapes.iter().copied()
    }

    /// Selected shapes, bottom of z-order first.
    pub fn bottom_up(&self, diagram: &Diagram) -> Vec<ShapeId> {
        let ranks = diagram.z_ranks();
        let mut out = self.shapes.clone();
        out.sort_by_key(|id| ranks.get(id).copied().unwrap_or(usize::MAX));
        out
    }

    /// Selected shapes, top of z-order first.
    pub fn top_down(&self, diagram: &Diagram) -> Vec<ShapeId> {
        let mut out = self.bottom_up(diagram);
        out.reverse();
        out
    }

    pub fn connections(&self) -> &[(ShapeId, ConnectionInfo)] {
        &self.connected
    }

    /// Distinct shapes in the connected side-table.
    pub fn connected_shapes(&self) -> Vec<ShapeId> {
        let mut out: Vec<ShapeId> = Vec::new();
        for (id, _) in &self.connected {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }

    // ─── Primitive changes ───────────────────────────────────────────────

    /// Add one shape as is. Idempotent.
    pub fn add(&mut self, cx: &mut SelectionCx<'_>, id: ShapeId) -> Result<bool, ViewportError> {
        if self.contains(id) {
            return Ok(false);
        }
        if !cx.diagram.contains(id) {
            return Err(CoreError::ShapeNotFound(id).into());
        }
        self.shapes.push(id);
        self.track_connections(cx.diagram, id);
        cx.invalidate(id)?;
        Ok(true)
    }

    fn track_connections(&mut self, diagram: &Diagram, id: ShapeId) {
        let Some(shape) = diagram.get(id) else {
            return;
        };
        for c in shape.connections.iter().filter(|c| c.other_point.is_reference()) {
            if self.connected.iter().any(|(other, _)| *other == c.other_shape) {
                continue;
            }
            self.connected.push((
                c.other_shape,
                ConnectionInfo {
                    own_point: c.own_point,
                    other_shape: id,
                    other_point: c.other_point,
                },
            ));
        }
    }

    fn rebuild_connections(&mut self, diagram: &Diagram) {
        self.connected.clear();
        for id in self.shapes.clone() {
            self.track_connections(diagram, id);
        }
    }

    /// Remove exactly `ids`, invalidating each one that was selected.
    fn remove_many(
        &mut self,
        cx: &mut SelectionCx<'_>,
        ids: &[ShapeId],
    ) -> Result<bool, ViewportError> {
        let removed: Vec<ShapeId> = self
            .shapes
            .iter()
            .copied()
            .filter(|s| ids.contains(s))
            .collect();
        if removed.is_empty() {
            return Ok(false);
        }
        let dropped_connected = self.connected_shapes();
        self.shapes.retain(|s| !removed.contains(s));
        self.rebuild_connections(cx.diagram);
        for id in removed {
            if cx.diagram.contains(id) {
                cx.invalidate(id)?;
            }
        }
        for id in dropped_connected {
            if !self.connected.iter().any(|(c, _)| *c == id) && cx.diagram.contains(id) {
                cx.invalidate(id)?;
            }
        }
        Ok(true)
    }

    /// Invalidate every selected and connected shape, then empty both.
    pub fn clear(&mut self, cx: &mut SelectionCx<'_>) -> Result<bool, ViewportError> {
        if self.shapes.is_empty() && self.connected.is_empty() {
            return Ok(false);
        }
        let touched: Vec<ShapeId> = self
            .shapes
            .iter()
            .copied()
            .chain(self.connected_shapes())
            .collect();
        self.shapes.clear();
        self.connected.clear();
        for id in touched {
            if cx.diagram.contains(id) {
                cx.invalidate(id)?;
            }
        }
        Ok(true)
    }

    /// Drop shapes that no longer exist. Nothing is invalidated: the
    /// deletion already repainted their area.
    pub fn forget(&mut self, diagram: &Diagram, ids: &[ShapeId]) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| !ids.contains(s) && diagram.contains(*s));
        let changed = self.shapes.len() != before;
        self.rebuild_connections(diagram);
        changed
    }

    /// Re-derive the connected side-table after connections changed.
    pub fn refresh_connections(&mut self, diagram: &Diagram) {
        self.rebuild_connections(diagram);
    }

    // ─── Aggregation-aware selection ─────────────────────────────────────

    /// The shape a click on `id` actually selects.
    fn target(&self, diagram: &Diagram, id: ShapeId, add: bool) -> Result<ShapeId, ViewportError> {
        let mut current = id;
        for _ in 0..=diagram.len() {
            let Some(parent) = diagram.parent(current) else {
                return Ok(current);
            };
            if !diagram.is_group(parent) {
                current = parent;
                continue;
            }
            let member_mode = !add
                && matches!(self.shapes.as_slice(), [only]
                    if *only == parent || *only == current || diagram.parent(*only) == Some(parent));
            if member_mode {
                return Ok(current);
            }
            current = parent;
        }
        Err(CoreError::ParentCycle(id).into())
    }

    /// Select `id` honouring aggregation. Returns whether the selection
    /// changed; repeating a call is a no-op.
    pub fn select(
        &mut self,
        cx: &mut SelectionCx<'_>,
        id: ShapeId,
        add: bool,
    ) -> Result<bool, ViewportError> {
        if !cx.diagram.contains(id) {
            return Err(CoreError::ShapeNotFound(id).into());
        }
        let target = self.target(cx.diagram, id, add)?;
        if add {
            return self.add(cx, target);
        }
        if self.shapes == [target] {
            return Ok(false);
        }
        self.clear(cx)?;
        self.add(cx, target)
    }

    /// Select the members of `owner` one by one, or collapse to the owner
    /// once every member is already selected.
    pub fn select_aggregation(
        &mut self,
        cx: &mut SelectionCx<'_>,
        owner: ShapeId,
        add: bool,
    ) -> Result<bool, ViewportError> {
        let members = cx.diagram.children(owner);
        if members.is_empty() {
            return self.select(cx, owner, add);
        }
        if members.iter().all(|m| self.contains(*m)) {
            let mut changed = if add {
                self.remove_many(cx, &members)?
            } else {
                self.clear(cx)?
            };
            changed |= self.add(cx, owner)?;
            return Ok(changed);
        }
        let mut changed = false;
        if !add {
            let keep = self.shapes.iter().all(|s| members.contains(s));
            if !keep {
                changed |= self.clear(cx)?;
            }
        }
        for m in members {
            changed |= self.add(cx, m)?;
        }
        Ok(changed)
    }

    /// Unselect at the granularity of select: a child takes its whole
    /// sibling unit and its parent along.
    pub fn unselect(&mut self, cx: &mut SelectionCx<'_>, id: ShapeId) -> Result<bool, ViewportError> {
        let ids = match cx.diagram.parent(id) {
            Some(parent) => {
                let mut unit = cx.diagram.children(parent);
                unit.push(parent);
                unit
            }
            None => vec![id],
        };
        self.remove_many(cx, &ids)
    }

    /// Unselect every shape whose layers are no longer visible. One
    /// repaint covers all of them.
    pub fn unselect_invisible(
        &mut self,
        cx: &mut SelectionCx<'_>,
        visible: &VisibleLayers,
    ) -> Result<Vec<ShapeId>, ViewportError> {
        let hidden: Vec<ShapeId> = self
            .top_down(cx.diagram)
            .into_iter()
            .filter(|id| {
                cx.diagram
                    .get(*id)
                    .is_none_or(|s| !visible.shows(s.home_layer, s.supplemental_layers))
            })
            .collect();
        if hidden.is_empty() {
            return Ok(hidden);
        }
        cx.tracker.suspend();
        let result = self.remove_many(cx, &hidden);
        cx.tracker.resume()?;
        result?;
        log::debug!("unselected {} shape(s) on hidden layers", hidden.len());
        Ok(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::{ControlPointId, LayerId, LayerIds, LayerVisibility, Point, Rect, Shape, ShapeKind};
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    struct Fixture {
        diagram: Diagram,
        transform: Transform,
        tracker: InvalidationTracker,
    }

    impl Fixture {
        fn new() -> Self {
            let mut d = Diagram::default();
            d.insert(Shape::planar_box(id("sel.a"), Rect::new(0, 0, 10, 10)))
                .unwrap();
            d.insert(
                Shape::planar_box(id("sel.b"), Rect::new(50, 0, 10, 10))
                    .with_layers(LayerId(3), LayerIds::NONE),
            )
            .unwrap();
            let group = Shape::new(id("sel.group"), ShapeKind::Group, "Group", Rect::new(100, 0, 60, 10));
            d.insert(group).unwrap();
            for (n, x) in [("sel.g1", 100), ("sel.g2", 150)] {
                d.insert_child(id("sel.group"), Shape::planar_box(id(n), Rect::new(x, 0, 10, 10)))
                    .unwrap();
            }
            let owner = Shape::new(id("sel.owner"), ShapeKind::Composite, "Box", Rect::new(200, 0, 60, 10));
            d.insert(owner).unwrap();
            for (n, x) in [("sel.p1", 200), ("sel.p2", 250)] {
                d.insert_child(id("sel.owner"), Shape::planar_box(id(n), Rect::new(x, 0, 10, 10)))
                    .unwrap();
            }
            let mut wire = Shape::line(id("sel.wire"), Point::new(10, 5), Point::new(50, 5));
            wire.connect(ControlPointId(2), id("sel.b"), ControlPointId::REFERENCE);
            d.insert(wire).unwrap();
            let mut t = Transform::new();
            t.set_draw_bounds(Rect::new(0, 0, 800, 600)).unwrap();
            Self {
                diagram: d,
                transform: t,
                tracker: InvalidationTracker::new(0),
            }
        }

        fn cx(&mut self) -> SelectionCx<'_> {
            SelectionCx {
                diagram: &self.diagram,
                transform: &self.transform,
                tracker: &mut self.tracker,
            }
        }
    }

    #[test]
    fn select_twice_is_a_no_op() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        assert!(sel.select(&mut f.cx(), id("sel.a"), false).unwrap());
        f.tracker.take_repaints();
        assert!(!sel.select(&mut f.cx(), id("sel.a"), false).unwrap());
        assert!(f.tracker.take_repaints().is_empty());
        assert!(!sel.select(&mut f.cx(), id("sel.a"), true).unwrap());
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn aggregation_children_promote_to_owner() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select(&mut f.cx(), id("sel.p1"), false).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.owner")]);
    }

    #[test]
    fn group_member_mode() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select(&mut f.cx(), id("sel.g1"), false).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.group")]);
        // Clicking a member of the selected group enters member mode.
        sel.select(&mut f.cx(), id("sel.g1"), false).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.g1")]);
        // A sibling stays in member mode.
        sel.select(&mut f.cx(), id("sel.g2"), false).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.g2")]);
        // Adding selects the group again.
        sel.select(&mut f.cx(), id("sel.g1"), true).unwrap();
        assert_eq!(
            sel.iter().collect::<Vec<_>>(),
            vec![id("sel.g2"), id("sel.group")]
        );
    }

    #[test]
    fn select_aggregation_collapses_on_repeat() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap();
        assert_eq!(sel.bottom_up(&f.diagram), vec![id("sel.p1"), id("sel.p2")]);
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.owner")]);
    }

    #[test]
    fn select_aggregation_collapse_replaces_other_shapes() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap();
        sel.select(&mut f.cx(), id("sel.a"), true).unwrap();
        assert!(sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap());
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.owner")]);
    }

    #[test]
    fn select_aggregation_collapse_with_add_keeps_other_shapes() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select(&mut f.cx(), id("sel.a"), false).unwrap();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), true).unwrap();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), true).unwrap();
        assert_eq!(
            sel.iter().collect::<Vec<_>>(),
            vec![id("sel.a"), id("sel.owner")]
        );
    }

    #[test]
    fn unselect_repaints_only_removed_shapes() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap();
        sel.add(&mut f.cx(), id("sel.a")).unwrap();
        f.tracker.take_repaints();

        // The unit is p1, p2 and the owner; the owner was never selected.
        assert!(sel.unselect(&mut f.cx(), id("sel.p1")).unwrap());
        assert_eq!(f.tracker.take_repaints().len(), 2);
    }

    #[test]
    fn unselect_takes_the_sibling_unit() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select_aggregation(&mut f.cx(), id("sel.owner"), false).unwrap();
        sel.add(&mut f.cx(), id("sel.a")).unwrap();
        assert!(sel.unselect(&mut f.cx(), id("sel.p1")).unwrap());
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.a")]);
    }

    #[test]
    fn glued_partners_are_tracked() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select(&mut f.cx(), id("sel.wire"), false).unwrap();
        assert_eq!(sel.connected_shapes(), vec![id("sel.b")]);
        sel.clear(&mut f.cx()).unwrap();
        assert!(sel.connected_shapes().is_empty());
    }

    #[test]
    fn hidden_layer_prunes_selection_in_one_repaint() {
        let mut f = Fixture::new();
        let mut sel = SelectionSet::new();
        sel.select(&mut f.cx(), id("sel.a"), false).unwrap();
        sel.select(&mut f.cx(), id("sel.b"), true).unwrap();
        f.tracker.take_repaints();

        let mut layers = LayerVisibility::new();
        layers.set_visibility([LayerId(3)], false);
        let visible = layers.resolve(f.diagram.layers(), 100);
        let removed = sel.unselect_invisible(&mut f.cx(), &visible).unwrap();
        assert_eq!(removed, vec![id("sel.b")]);
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![id("sel.a")]);
        assert_eq!(f.tracker.take_repaints().len(), 1);
    }
}
