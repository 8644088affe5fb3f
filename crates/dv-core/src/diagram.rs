//! Shape arena for one diagram.
//!
//! Shapes live in a `StableDiGraph`; edges go from parent to child and
//! carry no data. Sibling z-order is kept in explicit order vectors so
//! that draw order never depends on petgraph's adjacency iteration.

use crate::error::CoreError;
use crate::geometry::{Rect, Size, union_all};
use crate::id::{ControlPointId, LayerId, ShapeId};
use crate::model::{Connection, ConnectionInfo, Layer, Shape};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::HashMap;

/// A shape removed from the arena, with enough context to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedShape {
    pub shape: Shape,
    pub parent: Option<ShapeId>,
    /// Position among its siblings before removal.
    pub sibling_index: usize,
}

/// A glue connection that was dropped because its target disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenConnection {
    pub owner: ShapeId,
    pub connection: Connection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removal {
    /// Removed shapes, parents before children.
    pub shapes: Vec<RemovedShape>,
    pub broken: Vec<BrokenConnection>,
}

impl Removal {
    pub fn ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.shapes.iter().map(|r| r.shape.id)
    }
}

#[derive(Debug, Clone)]
pub struct Diagram {
    pub name: String,
    /// Size of the drawing sheet in diagram units.
    pub sheet_size: Size,
    graph: StableDiGraph<Shape, ()>,
    id_index: HashMap<ShapeId, NodeIndex>,
    /// Z-order of shapes without a parent, bottom first.
    top_level: Vec<NodeIndex>,
    /// Z-order of each parent's children, bottom first.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    layers: Vec<Layer>,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new("diagram", Size::new(1000, 1000))
    }
}

impl Diagram {
    #[must_use]
    pub fn new(name: &str, sheet_size: Size) -> Self {
        Self {
            name: name.to_string(),
            sheet_size,
            graph: StableDiGraph::new(),
            id_index: HashMap::new(),
            top_level: Vec::new(),
            child_order: HashMap::new(),
            layers: Vec::new(),
        }
    }

    pub fn sheet_bounds(&self) -> Rect {
        Rect::from_origin_size(crate::geometry::Point::ORIGIN, self.sheet_size)
    }

    // ─── Layers ──────────────────────────────────────────────────────────

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Add or replace a layer definition.
    pub fn add_layer(&mut self, layer: Layer) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let pos = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(pos))
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn index_of(&self, id: ShapeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    pub fn try_get(&self, id: ShapeId) -> Result<&Shape, CoreError> {
        self.get(id).ok_or(CoreError::ShapeNotFound(id))
    }

    /// All shapes in arena order (not z-order).
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.graph.node_weights()
    }

    pub fn parent(&self, id: ShapeId) -> Option<ShapeId> {
        let idx = self.index_of(id)?;
        self.parent_index(idx).map(|p| self.graph[p].id)
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Direct children, bottom of z-order first.
    pub fn children(&self, id: ShapeId) -> Vec<ShapeId> {
        self.index_of(id)
            .and_then(|idx| self.child_order.get(&idx))
            .map(|order| order.iter().map(|c| self.graph[*c].id).collect())
            .unwrap_or_default()
    }

    /// Shapes sharing `id`'s parent, including `id` itself. Top-level
    /// shapes have no siblings for aggregation purposes.
    pub fn siblings(&self, id: ShapeId) -> Vec<ShapeId> {
        match self.parent(id) {
            Some(parent) => self.children(parent),
            None => vec![id],
        }
    }

    /// Every descendant of `id` in draw order, excluding `id`.
    pub fn descendants(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut out = Vec::new();
        if let Some(idx) = self.index_of(id) {
            self.collect_subtree(idx, &mut out);
            out.remove(0);
        }
        out
    }

    pub fn is_group(&self, id: ShapeId) -> bool {
        self.get(id).is_some_and(|s| s.kind.is_group())
    }

    /// Whether `ancestor` is a parent, grandparent, etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: ShapeId, descendant: ShapeId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = descendant;
        // The arena never holds a parent cycle, so this walk terminates.
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// The outermost ancestor of `id`, or `id` itself at top level.
    pub fn root_of(&self, id: ShapeId) -> ShapeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Insert a top-level shape on top of the z-order.
    pub fn insert(&mut self, shape: Shape) -> Result<NodeIndex, CoreError> {
        let at = self.top_level.len();
        self.insert_at(shape, None, at)
    }

    /// Insert `shape` as the topmost child of `parent`.
    pub fn insert_child(&mut self, parent: ShapeId, shape: Shape) -> Result<NodeIndex, CoreError> {
        let pidx = self.index_of(parent).ok_or(CoreError::ShapeNotFound(parent))?;
        let at = self.child_order.get(&pidx).map_or(0, Vec::len);
        self.insert_at(shape, Some(parent), at)
    }

    /// Insert at an explicit sibling position (clamped to the sibling count).
    pub fn insert_at(
        &mut self,
        shape: Shape,
        parent: Option<ShapeId>,
        sibling_index: usize,
    ) -> Result<NodeIndex, CoreError> {
        if self.contains(shape.id) {
            return Err(CoreError::DuplicateShape(shape.id));
        }
        let pidx = match parent {
            Some(p) => Some(self.index_of(p).ok_or(CoreError::ShapeNotFound(p))?),
            None => None,
        };
        let id = shape.id;
        let idx = self.graph.add_node(shape);
        self.id_index.insert(id, idx);
        if let Some(p) = pidx {
            self.graph.add_edge(p, idx, ());
        }
        let order = self.order_mut(pidx);
        let at = sibling_index.min(order.len());
        order.insert(at, idx);
        log::trace!("inserted {id} at sibling index {at}");
        Ok(idx)
    }

    /// Remove a shape together with all of its descendants. Glue
    /// connections of remaining shapes that pointed at a removed shape
    /// are dropped and reported.
    pub fn remove(&mut self, id: ShapeId) -> Result<Removal, CoreError> {
        let idx = self.index_of(id).ok_or(CoreError::ShapeNotFound(id))?;
        let mut subtree = Vec::new();
        self.collect_subtree(idx, &mut subtree);

        let mut removal = Removal::default();
        for sid in &subtree {
            let Some(sidx) = self.index_of(*sid) else {
                continue;
            };
            let parent = self.parent_index(sidx);
            let sibling_index = self
                .order(parent)
                .iter()
                .position(|c| *c == sidx)
                .unwrap_or(0);
            removal.shapes.push(RemovedShape {
                shape: self.graph[sidx].clone(),
                parent: parent.map(|p| self.graph[p].id),
                sibling_index,
            });
        }
        // Children first so each parent's order vector is still intact
        // when its own entry is removed.
        for sid in subtree.iter().rev() {
            if let Some(sidx) = self.index_of(*sid) {
                let parent = self.parent_index(sidx);
                self.order_mut(parent).retain(|c| *c != sidx);
                self.child_order.remove(&sidx);
                self.graph.remove_node(sidx);
                self.id_index.remove(sid);
            }
        }

        let removed: Vec<ShapeId> = subtree;
        for shape in self.graph.node_weights_mut() {
            let owner = shape.id;
            shape.connections.retain(|c| {
                let dangling = removed.contains(&c.other_shape);
                if dangling {
                    removal.broken.push(BrokenConnection {
                        owner,
                        connection: *c,
                    });
                }
                !dangling
            });
        }
        log::debug!(
            "removed {} shape(s), broke {} connection(s)",
            removal.shapes.len(),
            removal.broken.len()
        );
        Ok(removal)
    }

    /// Put back what [`Diagram::remove`] took out.
    pub fn restore(&mut self, removal: &Removal) -> Result<(), CoreError> {
        for r in &removal.shapes {
            self.insert_at(r.shape.clone(), r.parent, r.sibling_index)?;
        }
        for b in &removal.broken {
            if let Some(owner) = self.get_mut(b.owner) {
                owner.connections.push(b.connection);
            }
        }
        Ok(())
    }

    /// Move `child` under `new_parent` (or to top level), on top of its
    /// new siblings. Rejects moves that would create a parent cycle.
    pub fn reparent(&mut self, child: ShapeId, new_parent: Option<ShapeId>) -> Result<(), CoreError> {
        let cidx = self.index_of(child).ok_or(CoreError::ShapeNotFound(child))?;
        let pidx = match new_parent {
            Some(p) => {
                if p == child || self.is_ancestor_of(child, p) {
                    return Err(CoreError::ParentCycle(child));
                }
                Some(self.index_of(p).ok_or(CoreError::ShapeNotFound(p))?)
            }
            None => None,
        };
        let old = self.parent_index(cidx);
        if let Some(old_parent) = old
            && let Some(edge) = self.graph.find_edge(old_parent, cidx)
        {
            self.graph.remove_edge(edge);
        }
        self.order_mut(old).retain(|c| *c != cidx);
        if let Some(p) = pidx {
            self.graph.add_edge(p, cidx, ());
        }
        self.order_mut(pidx).push(cidx);
        Ok(())
    }

    /// Move a shape to the top of its sibling z-order.
    /// Returns true if the z-order changed.
    pub fn bring_to_front(&mut self, id: ShapeId) -> bool {
        self.move_in_order(id, |len| len - 1)
    }

    /// Move a shape to the bottom of its sibling z-order.
    pub fn send_to_back(&mut self, id: ShapeId) -> bool {
        self.move_in_order(id, |_| 0)
    }

    /// Position of `id` among its siblings, bottom first.
    pub fn sibling_index(&self, id: ShapeId) -> Option<usize> {
        let idx = self.index_of(id)?;
        self.order(self.parent_index(idx))
            .iter()
            .position(|c| *c == idx)
    }

    /// Move `id` to `index` among its siblings (clamped).
    pub fn set_sibling_index(&mut self, id: ShapeId, index: usize) -> bool {
        self.move_in_order(id, |len| index.min(len - 1))
    }

    fn move_in_order(&mut self, id: ShapeId, target: impl Fn(usize) -> usize) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let parent = self.parent_index(idx);
        let order = self.order_mut(parent);
        let Some(pos) = order.iter().position(|c| *c == idx) else {
            return false;
        };
        let to = target(order.len());
        if pos == to {
            return false;
        }
        let moved = order.remove(pos);
        order.insert(to, moved);
        true
    }

    fn order(&self, parent: Option<NodeIndex>) -> &[NodeIndex] {
        match parent {
            Some(p) => self.child_order.get(&p).map(Vec::as_slice).unwrap_or(&[]),
            None => &self.top_level,
        }
    }

    fn order_mut(&mut self, parent: Option<NodeIndex>) -> &mut Vec<NodeIndex> {
        match parent {
            Some(p) => self.child_order.entry(p).or_default(),
            None => &mut self.top_level,
        }
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    /// All shapes bottom to top. A parent precedes its children.
    pub fn draw_order(&self) -> Vec<ShapeId> {
        let mut out = Vec::with_capacity(self.len());
        for idx in &self.top_level {
            self.collect_subtree(*idx, &mut out);
        }
        out
    }

    /// Position of every shape in [`Diagram::draw_order`].
    pub fn z_ranks(&self) -> HashMap<ShapeId, usize> {
        self.draw_order()
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect()
    }

    fn collect_subtree(&self, idx: NodeIndex, out: &mut Vec<ShapeId>) {
        out.push(self.graph[idx].id);
        if let Some(children) = self.child_order.get(&idx) {
            for child in children {
                self.collect_subtree(*child, out);
            }
        }
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// Bounds of a shape, its control points and all of its descendants.
    pub fn total_bounds(&self, id: ShapeId) -> Option<Rect> {
        let own = self.get(id)?.bounds_with_points();
        let rest = self
            .descendants(id)
            .into_iter()
            .filter_map(|d| self.get(d).map(Shape::bounds_with_points));
        union_all(std::iter::once(own).chain(rest))
    }

    /// Union of the sheet and every shape, inflated by `margin`.
    pub fn scrollable_bounds(&self, margin: i32) -> Rect {
        let shapes = self.shapes().map(Shape::bounds_with_points);
        union_all(std::iter::once(self.sheet_bounds()).chain(shapes))
            .unwrap_or_else(|| self.sheet_bounds())
            .inflate(margin, margin)
    }

    // ─── Connections ─────────────────────────────────────────────────────

    /// Connections touching `id`, seen from `id`'s side: the ones it owns
    /// plus the ones other shapes hold on it.
    pub fn connection_infos(&self, id: ShapeId) -> Vec<ConnectionInfo> {
        let Some(shape) = self.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<ConnectionInfo> = shape
            .connections
            .iter()
            .map(|c| ConnectionInfo {
                own_point: c.own_point,
                other_shape: c.other_shape,
                other_point: c.other_point,
            })
            .collect();
        for other in self.shapes().filter(|s| s.id != id) {
            for c in other.connections.iter().filter(|c| c.other_shape == id) {
                out.push(ConnectionInfo {
                    own_point: c.other_point,
                    other_shape: other.id,
                    other_point: c.own_point,
                });
            }
        }
        out
    }

    /// Shapes holding a glue connection on `id`'s whole outline.
    pub fn glued_by_reference(&self, id: ShapeId) -> Vec<ShapeId> {
        self.shapes()
            .filter(|s| {
                s.connections
                    .iter()
                    .any(|c| c.other_shape == id && c.other_point == ControlPointId::REFERENCE)
            })
            .map(|s| s.id)
            .collect()
    }
}
