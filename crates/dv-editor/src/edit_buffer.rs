//! Cut/copy buffer.
//!
//! Holds a snapshot of the shapes that were cut or copied together with
//! their parent links. Pasting clones the snapshot under fresh ids and
//! offsets it: by one grid cell per repeated paste, or onto an explicit
//! target point.

use crate::error::ViewportError;
use dv_core::{Diagram, Point, Rect, Shape, ShapeId, union_all};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditAction {
    #[default]
    None,
    Copy,
    CopyWithModels,
    Cut,
    CutWithModels,
}

impl EditAction {
    pub fn keeps_models(self) -> bool {
        matches!(self, Self::CopyWithModels | Self::CutWithModels)
    }

    pub fn is_cut(self) -> bool {
        matches!(self, Self::Cut | Self::CutWithModels)
    }
}

/// One shape of the snapshot; `parent` refers to another entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedShape {
    pub shape: Shape,
    pub parent: Option<ShapeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditBuffer {
    action: EditAction,
    /// Parents precede their children.
    shapes: Vec<PlacedShape>,
    #[serde(skip)]
    paste_count: i32,
    #[serde(skip)]
    last_target: Option<Point>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(&self) -> EditAction {
        self.action
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn paste_count(&self) -> i32 {
        self.paste_count
    }

    /// Snapshot `roots` (and their descendants) from `diagram`.
    pub fn store(&mut self, action: EditAction, diagram: &Diagram, roots: &[ShapeId]) {
        self.shapes.clear();
        for root in roots {
            // A root nested in another root is already in the snapshot.
            if roots.iter().any(|r| diagram.is_ancestor_of(*r, *root)) {
                continue;
            }
            for id in std::iter::once(*root).chain(diagram.descendants(*root)) {
                let Some(shape) = diagram.get(id) else {
                    continue;
                };
                let parent = if id == *root { None } else { diagram.parent(id) };
                self.shapes.push(PlacedShape {
                    shape: shape.clone(),
                    parent,
                });
            }
        }
        self.action = action;
        self.paste_count = 0;
        self.last_target = None;
        log::debug!("{action:?}: buffered {} shape(s)", self.shapes.len());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Bounds of the buffered top-level shapes.
    pub fn bounds(&self) -> Option<Rect> {
        union_all(
            self.shapes
                .iter()
                .filter(|b| b.parent.is_none())
                .map(|b| b.shape.bounds),
        )
    }

    /// Clone the snapshot for pasting: fresh ids, remapped parents and
    /// internal connections, translated by the paste offset. Connections
    /// leaving the snapshot are dropped.
    pub fn prepare_paste(&mut self, target: Option<Point>, grid_size: i32) -> Vec<PlacedShape> {
        let Some(bounds) = self.bounds() else {
            return Vec::new();
        };
        if target != self.last_target {
            self.paste_count = 0;
            self.last_target = target;
        }
        let (dx, dy) = match target {
            Some(p) => (
                p.x - bounds.x + grid_size * self.paste_count,
                p.y - bounds.y + grid_size * self.paste_count,
            ),
            None => (
                grid_size * (self.paste_count + 1),
                grid_size * (self.paste_count + 1),
            ),
        };
        self.paste_count += 1;

        let ids: HashMap<ShapeId, ShapeId> = self
            .shapes
            .iter()
            .map(|b| {
                let prefix = b.shape.type_name.to_lowercase();
                (b.shape.id, ShapeId::with_prefix(&prefix))
            })
            .collect();
        let keep_models = self.action.keeps_models();
        self.shapes
            .iter()
            .filter_map(|b| {
                let mut shape = b.shape.clone();
                shape.id = *ids.get(&b.shape.id)?;
                shape.translate(dx, dy);
                shape.connections.retain(|c| ids.contains_key(&c.other_shape));
                for c in shape.connections.iter_mut() {
                    if let Some(new_id) = ids.get(&c.other_shape) {
                        c.other_shape = *new_id;
                    }
                }
                if !keep_models {
                    shape.model_object = None;
                }
                Some(PlacedShape {
                    shape,
                    parent: b.parent.and_then(|p| ids.get(&p).copied()),
                })
            })
            .collect()
    }

    /// Encode the snapshot for a host clipboard (MessagePack).
    pub fn to_bytes(&self) -> Result<Vec<u8>, ViewportError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ViewportError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::{ControlPointId, ModelObjectId};
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    fn diagram() -> Diagram {
        let mut d = Diagram::default();
        let mut a = Shape::planar_box(id("eb.a"), Rect::new(10, 10, 40, 40));
        a.model_object = Some(ModelObjectId(7));
        d.insert(a).unwrap();
        d.insert_child(id("eb.a"), Shape::planar_box(id("eb.child"), Rect::new(15, 15, 10, 10)))
            .unwrap();
        d.insert(Shape::planar_box(id("eb.far"), Rect::new(300, 300, 10, 10)))
            .unwrap();
        let mut wire = Shape::line(id("eb.wire"), Point::new(50, 30), Point::new(300, 300));
        wire.connect(ControlPointId(1), id("eb.a"), ControlPointId::REFERENCE);
        wire.connect(ControlPointId(2), id("eb.far"), ControlPointId::REFERENCE);
        d.insert(wire).unwrap();
        d
    }

    #[test]
    fn repeated_paste_steps_by_grid() {
        let d = diagram();
        let mut buf = EditBuffer::new();
        buf.store(EditAction::Copy, &d, &[id("eb.a")]);
        assert_eq!(buf.len(), 2);
        let first = buf.prepare_paste(None, 20);
        assert_eq!(first[0].shape.bounds, Rect::new(30, 30, 40, 40));
        assert_eq!(first[1].parent, Some(first[0].shape.id));
        let second = buf.prepare_paste(None, 20);
        assert_eq!(second[0].shape.bounds, Rect::new(50, 50, 40, 40));
        assert_ne!(first[0].shape.id, second[0].shape.id);
    }

    #[test]
    fn explicit_target_places_the_top_left_corner() {
        let d = diagram();
        let mut buf = EditBuffer::new();
        buf.store(EditAction::Copy, &d, &[id("eb.a")]);
        let pasted = buf.prepare_paste(Some(Point::new(100, 200)), 20);
        assert_eq!(pasted[0].shape.bounds.origin(), Point::new(100, 200));
        let again = buf.prepare_paste(Some(Point::new(100, 200)), 20);
        assert_eq!(again[0].shape.bounds.origin(), Point::new(120, 220));
    }

    #[test]
    fn models_and_external_connections() {
        let d = diagram();
        let mut buf = EditBuffer::new();
        buf.store(EditAction::Copy, &d, &[id("eb.a"), id("eb.wire")]);
        let pasted = buf.prepare_paste(None, 10);
        assert_eq!(pasted[0].shape.model_object, None);
        let wire = pasted.iter().find(|b| b.shape.type_name == "Polyline").unwrap();
        assert_eq!(wire.shape.connections.len(), 1);
        assert_eq!(wire.shape.connections[0].other_shape, pasted[0].shape.id);

        buf.store(EditAction::CutWithModels, &d, &[id("eb.a")]);
        let pasted = buf.prepare_paste(None, 10);
        assert_eq!(pasted[0].shape.model_object, Some(ModelObjectId(7)));
    }

    #[test]
    fn survives_messagepack() {
        let d = diagram();
        let mut buf = EditBuffer::new();
        buf.store(EditAction::Cut, &d, &[id("eb.a")]);
        let decoded = EditBuffer::from_bytes(&buf.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.action(), EditAction::Cut);
        assert_eq!(decoded.len(), 2);
    }
}
