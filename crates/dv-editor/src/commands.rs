//! Structural edits and the undo/redo command stack.
//!
//! Every edit is a [`DiagramCommand`]. Applying one yields its inverse and
//! the [`DiagramChange`]s the viewport reacts to, so undo and redo feed the
//! same change stream as the original edit.
//!
//! Drag gestures are **batched**: all commands between `begin_batch` and
//! the outermost `end_batch` become a single undo step.

use crate::edit_buffer::PlacedShape;
use crate::error::ViewportError;
use dv_core::{BrokenConnection, CoreError, Diagram, Rect, Removal, Shape, ShapeId};
use std::fmt;

/// User-level edit operations, used for permission checks and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOperation {
    Cut,
    Copy,
    Paste,
    Delete,
    Group,
    Ungroup,
    Aggregate,
    Disaggregate,
    Insert,
    Move,
    ZOrder,
    Undo,
    Redo,
    CaptionEdit,
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cut => "cut",
            Self::Copy => "copy",
            Self::Paste => "paste",
            Self::Delete => "delete",
            Self::Group => "group",
            Self::Ungroup => "ungroup",
            Self::Aggregate => "aggregate",
            Self::Disaggregate => "disaggregate",
            Self::Insert => "insert",
            Self::Move => "move",
            Self::ZOrder => "z-order change",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::CaptionEdit => "caption edit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagramCommand {
    /// Insert shapes; parents precede their children.
    Insert { shapes: Vec<PlacedShape> },
    /// Remove shapes with their descendants.
    Delete { ids: Vec<ShapeId> },
    /// Put back removed subtrees.
    Restore { removals: Vec<Removal> },
    Move { ids: Vec<ShapeId>, dx: i32, dy: i32 },
    /// Insert `group` where the lowest member was and move `members`
    /// under it.
    Group { group: Shape, members: Vec<ShapeId> },
    Ungroup { group: ShapeId },
    /// Make `members` children of `owner`.
    Aggregate { owner: ShapeId, members: Vec<ShapeId> },
    /// Move `members` out of `owner` to the owner's level.
    Disaggregate { owner: ShapeId, members: Vec<ShapeId> },
    ZOrder { ids: Vec<ShapeId>, to_front: bool },
    /// Explicit sibling positions.
    Reorder { positions: Vec<(ShapeId, usize)> },
    /// Put each shape under a parent at a sibling position.
    Reparent { placements: Vec<Placement> },
    Batch(Vec<DiagramCommand>),
}

/// Where a shape sits in the tree: parent and index among its siblings.
pub type Placement = (ShapeId, Option<ShapeId>, usize);

/// What a command did to the diagram.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramChange {
    ShapesInserted(Vec<ShapeId>),
    /// Changed shapes with their bounds before the change.
    ShapesUpdated(Vec<(ShapeId, Rect)>),
    /// Removed shapes with their last bounds.
    ShapesDeleted(Vec<(ShapeId, Rect)>),
    ConnectionMade(BrokenConnection),
    ConnectionBroken(BrokenConnection),
    ZOrderChanged(Vec<ShapeId>),
}

/// Executes edits on a diagram. The viewport talks to this seam only, so
/// hosts can route edits through their own repository.
pub trait CommandLayer {
    /// Whether `command` may run, with a reason when it may not.
    fn check(&self, diagram: &Diagram, command: &DiagramCommand) -> Result<(), String>;

    fn execute(
        &mut self,
        diagram: &mut Diagram,
        command: DiagramCommand,
        description: &str,
    ) -> Result<Vec<DiagramChange>, ViewportError>;

    fn begin_batch(&mut self);

    fn end_batch(&mut self);

    /// Revert everything executed since the outermost `begin_batch`.
    fn abort_batch(&mut self, diagram: &mut Diagram) -> Result<Vec<DiagramChange>, ViewportError>;

    fn undo(
        &mut self,
        diagram: &mut Diagram,
    ) -> Result<Option<(String, Vec<DiagramChange>)>, ViewportError>;

    fn redo(
        &mut self,
        diagram: &mut Diagram,
    ) -> Result<Option<(String, Vec<DiagramChange>)>, ViewportError>;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    /// Forget all history, e.g. when the diagram is replaced.
    fn clear(&mut self);
}

/// A command with its inverse.
#[derive(Debug, Clone)]
pub struct Command {
    pub forward: DiagramCommand,
    pub inverse: DiagramCommand,
    pub description: String,
}

/// Default [`CommandLayer`]: applies commands directly and keeps bounded
/// undo/redo stacks.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Maximum undo depth.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Forward/inverse pairs applied in the current batch.
    batch: Vec<(DiagramCommand, DiagramCommand)>,
    batch_description: String,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch: Vec::new(),
            batch_description: String::new(),
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    fn push(&mut self, cmd: Command) {
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // Clear redo stack on new action
        self.redo_stack.clear();
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CommandLayer for CommandStack {
    fn check(&self, diagram: &Diagram, command: &DiagramCommand) -> Result<(), String> {
        check_command(diagram, command)
    }

    fn execute(
        &mut self,
        diagram: &mut Diagram,
        command: DiagramCommand,
        description: &str,
    ) -> Result<Vec<DiagramChange>, ViewportError> {
        check_command(diagram, &command)
            .map_err(|reason| ViewportError::InvalidCommand(format!("{description}: {reason}")))?;
        let (inverse, changes) = apply(diagram, &command)?;
        log::debug!("executed {description}: {} change(s)", changes.len());
        if self.batch_depth > 0 {
            if self.batch.is_empty() {
                self.batch_description = description.to_string();
            }
            self.batch.push((command, inverse));
            return Ok(changes);
        }
        self.push(Command {
            forward: command,
            inverse,
            description: description.to_string(),
        });
        Ok(changes)
    }

    fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 && !self.batch.is_empty() {
            let (forward, mut inverse): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.batch).into_iter().unzip();
            inverse.reverse();
            let description = std::mem::take(&mut self.batch_description);
            self.push(Command {
                forward: DiagramCommand::Batch(forward),
                inverse: DiagramCommand::Batch(inverse),
                description,
            });
        }
    }

    fn abort_batch(&mut self, diagram: &mut Diagram) -> Result<Vec<DiagramChange>, ViewportError> {
        self.batch_depth = 0;
        self.batch_description.clear();
        let mut changes = Vec::new();
        for (_, inverse) in std::mem::take(&mut self.batch).into_iter().rev() {
            changes.extend(apply(diagram, &inverse)?.1);
        }
        Ok(changes)
    }

    fn undo(
        &mut self,
        diagram: &mut Diagram,
    ) -> Result<Option<(String, Vec<DiagramChange>)>, ViewportError> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(None);
        };
        let changes = match apply(diagram, &cmd.inverse) {
            Ok((_, changes)) => changes,
            Err(err) => {
                self.undo_stack.push(cmd);
                return Err(err);
            }
        };
        let description = cmd.description.clone();
        self.redo_stack.push(cmd);
        Ok(Some((description, changes)))
    }

    fn redo(
        &mut self,
        diagram: &mut Diagram,
    ) -> Result<Option<(String, Vec<DiagramChange>)>, ViewportError> {
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(None);
        };
        let changes = match apply(diagram, &cmd.forward) {
            Ok((_, changes)) => changes,
            Err(err) => {
                self.redo_stack.push(cmd);
                return Err(err);
            }
        };
        let description = cmd.description.clone();
        self.undo_stack.push(cmd);
        Ok(Some((description, changes)))
    }

    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch.clear();
        self.batch_depth = 0;
        self.batch_description.clear();
    }
}

// ─── Checks ──────────────────────────────────────────────────────────────

fn require_all(diagram: &Diagram, ids: &[ShapeId]) -> Result<(), String> {
    if ids.is_empty() {
        return Err("no shapes selected".into());
    }
    match ids.iter().find(|id| !diagram.contains(**id)) {
        Some(missing) => Err(format!("shape {missing} does not exist")),
        None => Ok(()),
    }
}

/// Validate a command against the current diagram.
pub fn check_command(diagram: &Diagram, command: &DiagramCommand) -> Result<(), String> {
    match command {
        DiagramCommand::Insert { shapes } => {
            if shapes.is_empty() {
                return Err("nothing to insert".into());
            }
            for (i, placed) in shapes.iter().enumerate() {
                if diagram.contains(placed.shape.id) {
                    return Err(format!("shape {} already exists", placed.shape.id));
                }
                if let Some(parent) = placed.parent
                    && !diagram.contains(parent)
                    && !shapes[..i].iter().any(|p| p.shape.id == parent)
                {
                    return Err(format!("parent {parent} does not exist"));
                }
            }
            Ok(())
        }
        DiagramCommand::Delete { ids }
        | DiagramCommand::Move { ids, .. }
        | DiagramCommand::ZOrder { ids, .. } => require_all(diagram, ids),
        DiagramCommand::Restore { removals } => {
            for r in removals {
                if let Some(clash) = r.ids().find(|id| diagram.contains(*id)) {
                    return Err(format!("shape {clash} already exists"));
                }
            }
            Ok(())
        }
        DiagramCommand::Group { group, members } => {
            if members.len() < 2 {
                return Err("select at least two shapes".into());
            }
            require_all(diagram, members)?;
            if diagram.contains(group.id) {
                return Err(format!("shape {} already exists", group.id));
            }
            if !group.kind.is_group() {
                return Err(format!("{} is not a group shape", group.id));
            }
            let parent = diagram.parent(members[0]);
            if members.iter().any(|m| diagram.parent(*m) != parent) {
                return Err("shapes belong to different parents".into());
            }
            Ok(())
        }
        DiagramCommand::Ungroup { group } => {
            if !diagram.contains(*group) {
                return Err(format!("shape {group} does not exist"));
            }
            if !diagram.is_group(*group) {
                return Err(format!("{group} is not a group"));
            }
            Ok(())
        }
        DiagramCommand::Aggregate { owner, members } => {
            require_all(diagram, members)?;
            if !diagram.contains(*owner) {
                return Err(format!("shape {owner} does not exist"));
            }
            if diagram.is_group(*owner) {
                return Err("a group cannot own an aggregation".into());
            }
            // Committing must not leave a cycle in the parent chain.
            if members
                .iter()
                .any(|m| *m == *owner || diagram.is_ancestor_of(*m, *owner))
            {
                return Err("aggregation would create a parent cycle".into());
            }
            Ok(())
        }
        DiagramCommand::Disaggregate { owner, members } => {
            if !diagram.contains(*owner) {
                return Err(format!("shape {owner} does not exist"));
            }
            if diagram.is_group(*owner) {
                return Err("use ungroup for groups".into());
            }
            if members.is_empty() {
                return Err("shape has no aggregated children".into());
            }
            match members.iter().find(|m| diagram.parent(**m) != Some(*owner)) {
                Some(stray) => Err(format!("{stray} is not aggregated into {owner}")),
                None => Ok(()),
            }
        }
        DiagramCommand::Reorder { positions } => {
            let ids: Vec<ShapeId> = positions.iter().map(|(id, _)| *id).collect();
            require_all(diagram, &ids)
        }
        DiagramCommand::Reparent { placements } => {
            for (id, parent, _) in placements {
                if !diagram.contains(*id) {
                    return Err(format!("shape {id} does not exist"));
                }
                if let Some(p) = parent {
                    if !diagram.contains(*p) {
                        return Err(format!("shape {p} does not exist"));
                    }
                    if p == id || diagram.is_ancestor_of(*id, *p) {
                        return Err("move would create a parent cycle".into());
                    }
                }
            }
            Ok(())
        }
        DiagramCommand::Batch(commands) => {
            // Later commands may depend on earlier ones; only the first
            // can be checked against the current state.
            match commands.first() {
                Some(first) => check_command(diagram, first),
                None => Ok(()),
            }
        }
    }
}

// ─── Application ─────────────────────────────────────────────────────────

/// `ids` without entries nested under another entry, in draw order.
fn roots_in_order(diagram: &Diagram, ids: &[ShapeId]) -> Vec<ShapeId> {
    diagram
        .draw_order()
        .into_iter()
        .filter(|id| ids.contains(id))
        .filter(|id| !ids.iter().any(|other| diagram.is_ancestor_of(*other, *id)))
        .collect()
}

fn bounds_of(diagram: &Diagram, id: ShapeId) -> Result<Rect, ViewportError> {
    diagram
        .total_bounds(id)
        .ok_or_else(|| CoreError::ShapeNotFound(id).into())
}

/// Apply `command`, returning its inverse and the resulting changes.
pub fn apply(
    diagram: &mut Diagram,
    command: &DiagramCommand,
) -> Result<(DiagramCommand, Vec<DiagramChange>), ViewportError> {
    match command {
        DiagramCommand::Insert { shapes } => {
            let mut inserted = Vec::with_capacity(shapes.len());
            for placed in shapes {
                match placed.parent {
                    Some(parent) => diagram.insert_child(parent, placed.shape.clone())?,
                    None => diagram.insert(placed.shape.clone())?,
                };
                inserted.push(placed.shape.id);
            }
            let roots = shapes
                .iter()
                .filter(|p| p.parent.is_none_or(|parent| !inserted.contains(&parent)))
                .map(|p| p.shape.id)
                .collect();
            Ok((
                DiagramCommand::Delete { ids: roots },
                vec![DiagramChange::ShapesInserted(inserted)],
            ))
        }

        DiagramCommand::Delete { ids } => {
            let mut removals = Vec::new();
            let mut deleted = Vec::new();
            let mut changes = Vec::new();
            for id in roots_in_order(diagram, ids) {
                let removal = diagram.remove(id)?;
                deleted.extend(
                    removal
                        .shapes
                        .iter()
                        .map(|r| (r.shape.id, r.shape.bounds_with_points())),
                );
                changes.extend(removal.broken.iter().copied().map(DiagramChange::ConnectionBroken));
                removals.push(removal);
            }
            changes.insert(0, DiagramChange::ShapesDeleted(deleted));
            removals.reverse();
            Ok((DiagramCommand::Restore { removals }, changes))
        }

        DiagramCommand::Restore { removals } => {
            let mut inserted = Vec::new();
            let mut changes = Vec::new();
            let mut roots = Vec::new();
            for removal in removals {
                diagram.restore(removal)?;
                inserted.extend(removal.ids());
                if let Some(first) = removal.shapes.first() {
                    roots.push(first.shape.id);
                }
                changes.extend(removal.broken.iter().copied().map(DiagramChange::ConnectionMade));
            }
            changes.insert(0, DiagramChange::ShapesInserted(inserted));
            Ok((DiagramCommand::Delete { ids: roots }, changes))
        }

        DiagramCommand::Move { ids, dx, dy } => {
            let mut updated = Vec::new();
            for id in roots_in_order(diagram, ids) {
                updated.push((id, bounds_of(diagram, id)?));
                for member in std::iter::once(id).chain(diagram.descendants(id)) {
                    if let Some(shape) = diagram.get_mut(member) {
                        shape.translate(*dx, *dy);
                    }
                }
            }
            Ok((
                DiagramCommand::Move {
                    ids: ids.clone(),
                    dx: -dx,
                    dy: -dy,
                },
                vec![DiagramChange::ShapesUpdated(updated)],
            ))
        }

        DiagramCommand::Group { group, members } => {
            let members = roots_in_order(diagram, members);
            let parent = members.first().and_then(|m| diagram.parent(*m));
            let at = members
                .iter()
                .filter_map(|m| diagram.sibling_index(*m))
                .min()
                .unwrap_or(0);
            let mut updated = Vec::with_capacity(members.len());
            for m in &members {
                updated.push((*m, bounds_of(diagram, *m)?));
            }
            diagram.insert_at(group.clone(), parent, at)?;
            for m in &members {
                diagram.reparent(*m, Some(group.id))?;
            }
            Ok((
                DiagramCommand::Ungroup { group: group.id },
                vec![
                    DiagramChange::ShapesInserted(vec![group.id]),
                    DiagramChange::ShapesUpdated(updated),
                ],
            ))
        }

        DiagramCommand::Ungroup { group } => {
            let shape = diagram.try_get(*group)?.clone();
            let parent = diagram.parent(*group);
            let at = diagram.sibling_index(*group).unwrap_or(0);
            let members = diagram.children(*group);
            let mut updated = Vec::with_capacity(members.len());
            for (i, m) in members.iter().enumerate() {
                updated.push((*m, bounds_of(diagram, *m)?));
                diagram.reparent(*m, parent)?;
                diagram.set_sibling_index(*m, at + 1 + i);
            }
            let removal = diagram.remove(*group)?;
            let mut changes = vec![
                DiagramChange::ShapesDeleted(vec![(*group, shape.bounds_with_points())]),
                DiagramChange::ShapesUpdated(updated),
            ];
            changes.extend(removal.broken.iter().copied().map(DiagramChange::ConnectionBroken));
            Ok((
                DiagramCommand::Group {
                    group: shape,
                    members,
                },
                changes,
            ))
        }

        DiagramCommand::Aggregate { owner, members } => {
            let before = placements(diagram, members);
            let mut updated = vec![(*owner, bounds_of(diagram, *owner)?)];
            for m in members {
                updated.push((*m, bounds_of(diagram, *m)?));
                diagram.reparent(*m, Some(*owner))?;
            }
            Ok((
                DiagramCommand::Reparent { placements: before },
                vec![DiagramChange::ShapesUpdated(updated)],
            ))
        }

        DiagramCommand::Disaggregate { owner, members } => {
            let before = placements(diagram, members);
            let parent = diagram.parent(*owner);
            let mut updated = vec![(*owner, bounds_of(diagram, *owner)?)];
            for m in members {
                updated.push((*m, bounds_of(diagram, *m)?));
                diagram.reparent(*m, parent)?;
            }
            Ok((
                DiagramCommand::Reparent { placements: before },
                vec![DiagramChange::ShapesUpdated(updated)],
            ))
        }

        DiagramCommand::Reparent { placements: target } => {
            let ids: Vec<ShapeId> = target.iter().map(|(id, _, _)| *id).collect();
            let before = placements(diagram, &ids);
            let mut updated: Vec<(ShapeId, Rect)> = Vec::new();
            let touched = before
                .iter()
                .flat_map(|(id, parent, _)| [Some(*id), *parent])
                .chain(target.iter().map(|(_, parent, _)| *parent))
                .flatten();
            for id in touched {
                if !updated.iter().any(|(u, _)| *u == id) {
                    updated.push((id, bounds_of(diagram, id)?));
                }
            }
            // Lower positions first, so each insert lands above the
            // siblings that were already below it.
            let mut sorted = target.clone();
            sorted.sort_by_key(|(_, _, index)| *index);
            for (id, parent, index) in &sorted {
                diagram.reparent(*id, *parent)?;
                diagram.set_sibling_index(*id, *index);
            }
            Ok((
                DiagramCommand::Reparent { placements: before },
                vec![DiagramChange::ShapesUpdated(updated)],
            ))
        }

        DiagramCommand::ZOrder { ids, to_front } => {
            let before = positions(diagram, ids);
            let mut ordered = roots_in_order(diagram, ids);
            if !to_front {
                ordered.reverse();
            }
            for id in &ordered {
                if *to_front {
                    diagram.bring_to_front(*id);
                } else {
                    diagram.send_to_back(*id);
                }
            }
            Ok((
                DiagramCommand::Reorder { positions: before },
                vec![DiagramChange::ZOrderChanged(ordered)],
            ))
        }

        DiagramCommand::Reorder { positions: target } => {
            let ids: Vec<ShapeId> = target.iter().map(|(id, _)| *id).collect();
            let before = positions(diagram, &ids);
            let mut sorted = target.clone();
            sorted.sort_by_key(|(_, index)| *index);
            for (id, index) in &sorted {
                diagram.set_sibling_index(*id, *index);
            }
            Ok((
                DiagramCommand::Reorder { positions: before },
                vec![DiagramChange::ZOrderChanged(ids)],
            ))
        }

        DiagramCommand::Batch(commands) => {
            let mut inverses = Vec::with_capacity(commands.len());
            let mut changes = Vec::new();
            for cmd in commands {
                let (inverse, more) = apply(diagram, cmd)?;
                inverses.push(inverse);
                changes.extend(more);
            }
            inverses.reverse();
            Ok((DiagramCommand::Batch(inverses), changes))
        }
    }
}

fn placements(diagram: &Diagram, ids: &[ShapeId]) -> Vec<Placement> {
    ids.iter()
        .filter_map(|id| {
            diagram
                .sibling_index(*id)
                .map(|i| (*id, diagram.parent(*id), i))
        })
        .collect()
}

fn positions(diagram: &Diagram, ids: &[ShapeId]) -> Vec<(ShapeId, usize)> {
    ids.iter()
        .filter_map(|id| diagram.sibling_index(*id).map(|i| (*id, i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::{ControlPointId, Point, ShapeKind};
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    fn diagram() -> Diagram {
        let mut d = Diagram::default();
        for (n, x) in [("cmd.a", 0), ("cmd.b", 40), ("cmd.c", 80)] {
            d.insert(Shape::planar_box(id(n), Rect::new(x, 0, 20, 20)))
                .unwrap();
        }
        d
    }

    #[test]
    fn delete_and_undo_restores_connections() {
        let mut d = diagram();
        let mut wire = Shape::line(id("cmd.wire"), Point::new(20, 10), Point::new(40, 10));
        wire.connect(ControlPointId(2), id("cmd.b"), ControlPointId::REFERENCE);
        d.insert(wire).unwrap();

        let mut stack = CommandStack::new(10);
        let changes = stack
            .execute(&mut d, DiagramCommand::Delete { ids: vec![id("cmd.b")] }, "Delete")
            .unwrap();
        assert!(matches!(changes[1], DiagramChange::ConnectionBroken(_)));
        assert!(d.get(id("cmd.wire")).unwrap().connections.is_empty());

        let (desc, changes) = stack.undo(&mut d).unwrap().unwrap();
        assert_eq!(desc, "Delete");
        assert!(matches!(changes[1], DiagramChange::ConnectionMade(_)));
        assert!(d.contains(id("cmd.b")));
        assert_eq!(d.get(id("cmd.wire")).unwrap().connections.len(), 1);
        assert!(stack.can_redo());
    }

    #[test]
    fn group_then_undo_restores_structure() {
        let mut d = diagram();
        let mut stack = CommandStack::new(10);
        let group = Shape::new(id("cmd.group"), ShapeKind::Group, "Group", Rect::new(0, 0, 60, 20));
        stack
            .execute(
                &mut d,
                DiagramCommand::Group {
                    group,
                    members: vec![id("cmd.b"), id("cmd.a")],
                },
                "Group",
            )
            .unwrap();
        assert_eq!(d.children(id("cmd.group")), vec![id("cmd.a"), id("cmd.b")]);
        assert_eq!(
            d.draw_order(),
            vec![id("cmd.group"), id("cmd.a"), id("cmd.b"), id("cmd.c")]
        );

        stack.undo(&mut d).unwrap();
        assert!(!d.contains(id("cmd.group")));
        assert_eq!(d.draw_order(), vec![id("cmd.a"), id("cmd.b"), id("cmd.c")]);

        stack.redo(&mut d).unwrap();
        assert_eq!(d.parent(id("cmd.a")), Some(id("cmd.group")));
    }

    #[test]
    fn aggregate_undo_restores_draw_order() {
        let mut d = diagram();
        let before = d.draw_order();
        let mut stack = CommandStack::new(10);
        stack
            .execute(
                &mut d,
                DiagramCommand::Aggregate {
                    owner: id("cmd.a"),
                    members: vec![id("cmd.b")],
                },
                "Aggregate",
            )
            .unwrap();
        assert_eq!(d.parent(id("cmd.b")), Some(id("cmd.a")));

        stack.undo(&mut d).unwrap();
        assert_eq!(d.parent(id("cmd.b")), None);
        assert_eq!(d.draw_order(), before);

        stack.redo(&mut d).unwrap();
        assert_eq!(d.children(id("cmd.a")), vec![id("cmd.b")]);
    }

    #[test]
    fn disaggregate_undo_restores_parent_and_position() {
        let mut d = diagram();
        d.reparent(id("cmd.b"), Some(id("cmd.a"))).unwrap();
        d.reparent(id("cmd.c"), Some(id("cmd.a"))).unwrap();
        d.insert(Shape::planar_box(id("cmd.d"), Rect::new(120, 0, 20, 20)))
            .unwrap();
        let before = d.draw_order();
        assert_eq!(before, vec![id("cmd.a"), id("cmd.b"), id("cmd.c"), id("cmd.d")]);

        let mut stack = CommandStack::new(10);
        stack
            .execute(
                &mut d,
                DiagramCommand::Disaggregate {
                    owner: id("cmd.a"),
                    members: vec![id("cmd.b")],
                },
                "Disaggregate",
            )
            .unwrap();
        assert_eq!(d.parent(id("cmd.b")), None);

        stack.undo(&mut d).unwrap();
        assert_eq!(d.children(id("cmd.a")), vec![id("cmd.b"), id("cmd.c")]);
        assert_eq!(d.draw_order(), before);
    }

    #[test]
    fn aggregate_rejects_cycles() {
        let mut d = diagram();
        d.reparent(id("cmd.b"), Some(id("cmd.a"))).unwrap();
        let err = check_command(
            &d,
            &DiagramCommand::Aggregate {
                owner: id("cmd.b"),
                members: vec![id("cmd.a")],
            },
        );
        assert_eq!(err, Err("aggregation would create a parent cycle".to_string()));
    }

    #[test]
    fn batch_is_one_undo_step() {
        let mut d = diagram();
        let mut stack = CommandStack::new(10);
        stack.begin_batch();
        for _ in 0..3 {
            stack
                .execute(
                    &mut d,
                    DiagramCommand::Move {
                        ids: vec![id("cmd.a")],
                        dx: 5,
                        dy: 0,
                    },
                    "Move",
                )
                .unwrap();
        }
        stack.end_batch();
        assert_eq!(stack.undo_len(), 1);
        assert_eq!(d.get(id("cmd.a")).unwrap().bounds.x, 15);
        stack.undo(&mut d).unwrap();
        assert_eq!(d.get(id("cmd.a")).unwrap().bounds.x, 0);
    }

    #[test]
    fn aborted_batch_leaves_no_trace() {
        let mut d = diagram();
        let mut stack = CommandStack::new(10);
        stack.begin_batch();
        stack
            .execute(
                &mut d,
                DiagramCommand::Move {
                    ids: vec![id("cmd.c")],
                    dx: 0,
                    dy: 7,
                },
                "Move",
            )
            .unwrap();
        stack.abort_batch(&mut d).unwrap();
        assert_eq!(d.get(id("cmd.c")).unwrap().bounds.y, 0);
        assert!(!stack.can_undo());
    }

    #[test]
    fn z_order_round_trips_through_undo() {
        let mut d = diagram();
        let mut stack = CommandStack::new(10);
        stack
            .execute(
                &mut d,
                DiagramCommand::ZOrder {
                    ids: vec![id("cmd.a")],
                    to_front: true,
                },
                "Bring to front",
            )
            .unwrap();
        assert_eq!(d.draw_order(), vec![id("cmd.b"), id("cmd.c"), id("cmd.a")]);
        stack.undo(&mut d).unwrap();
        assert_eq!(d.draw_order(), vec![id("cmd.a"), id("cmd.b"), id("cmd.c")]);
    }

    #[test]
    fn max_depth_drops_oldest() {
        let mut d = diagram();
        let mut stack = CommandStack::new(2);
        for dx in 1..=3 {
            stack
                .execute(
                    &mut d,
                    DiagramCommand::Move {
                        ids: vec![id("cmd.a")],
                        dx,
                        dy: 0,
                    },
                    "Move",
                )
                .unwrap();
        }
        assert_eq!(stack.undo_len(), 2);
    }
}
