//! Dirty-region bookkeeping.
//!
//! Invalidations arrive in diagram units, are converted to viewport
//! pixels and grown by the handle margin so grips are repainted with
//! their shapes. While updates are suspended the regions are unioned into
//! one pending rectangle that is issued once on the outermost resume.

use crate::error::ViewportError;
use dv_core::{ControlPointId, CoreError, Diagram, Rect, ShapeId, Transform};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct InvalidationTracker {
    depth: usize,
    pending: Option<Rect>,
    handle_margin: i32,
    repaints: Vec<Rect>,
}

impl InvalidationTracker {
    pub fn new(handle_margin: i32) -> Self {
        Self {
            handle_margin,
            ..Self::default()
        }
    }

    pub fn set_handle_margin(&mut self, margin: i32) {
        self.handle_margin = margin;
    }

    pub fn is_suspended(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn pending(&self) -> Option<Rect> {
        self.pending
    }

    pub fn suspend(&mut self) {
        self.depth += 1;
    }

    /// Leave one suspension level. The outermost resume issues the
    /// accumulated region as a single repaint request.
    pub fn resume(&mut self) -> Result<(), ViewportError> {
        if self.depth == 0 {
            return Err(ViewportError::UnbalancedResume);
        }
        self.depth -= 1;
        if self.depth == 0
            && let Some(rect) = self.pending.take()
        {
            self.repaints.push(rect);
        }
        Ok(())
    }

    /// Invalidate a diagram-space rectangle.
    pub fn invalidate(&mut self, transform: &Transform, rect: Rect) -> Result<(), ViewportError> {
        let rect = rect.validate()?;
        let m = self.handle_margin + 1;
        self.push(transform.rect_to_viewport(rect).inflate(m, m));
        Ok(())
    }

    /// Invalidate a viewport rectangle as is.
    pub fn invalidate_viewport(&mut self, rect: Rect) -> Result<(), ViewportError> {
        self.push(rect.validate()?);
        Ok(())
    }

    fn push(&mut self, rect: Rect) {
        if self.depth > 0 {
            self.pending = Some(match self.pending {
                Some(p) => p.union(&rect),
                None => rect,
            });
        } else {
            self.repaints.push(rect);
        }
    }

    /// Invalidate a shape so that its parent, its control points and
    /// every partner glued by reference are repainted too.
    pub fn invalidate_shape(
        &mut self,
        diagram: &Diagram,
        transform: &Transform,
        id: ShapeId,
    ) -> Result<(), ViewportError> {
        let mut visited = HashSet::new();
        self.invalidate_glued(diagram, transform, id, &mut visited)
    }

    fn invalidate_glued(
        &mut self,
        diagram: &Diagram,
        transform: &Transform,
        id: ShapeId,
        visited: &mut HashSet<ShapeId>,
    ) -> Result<(), ViewportError> {
        let target = outermost_parent(diagram, id)?;
        if !visited.insert(target) {
            return Ok(());
        }
        let Some(bounds) = diagram.total_bounds(target) else {
            return Ok(());
        };
        self.invalidate(transform, bounds)?;
        let mut partners: Vec<ShapeId> = Vec::new();
        for member in std::iter::once(target).chain(diagram.descendants(target)) {
            partners.extend(
                diagram
                    .connection_infos(member)
                    .into_iter()
                    .filter(|c| {
                        c.own_point == ControlPointId::REFERENCE
                            || c.other_point == ControlPointId::REFERENCE
                    })
                    .map(|c| c.other_shape),
            );
        }
        for partner in partners {
            self.invalidate_glued(diagram, transform, partner, visited)?;
        }
        Ok(())
    }

    /// Repaint requests issued since the last call, in viewport pixels.
    pub fn take_repaints(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.repaints)
    }
}

/// Walk up to the outermost parent. Child shapes are drawn by their
/// parent, so invalidation always targets the root.
fn outermost_parent(diagram: &Diagram, id: ShapeId) -> Result<ShapeId, ViewportError> {
    let mut current = id;
    for _ in 0..=diagram.len() {
        match diagram.parent(current) {
            Some(parent) => current = parent,
            None => return Ok(current),
        }
    }
    Err(CoreError::ParentCycle(id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::{Point, Shape};
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ShapeId {
        ShapeId::intern(name)
    }

    fn transform() -> Transform {
        let mut t = Transform::new();
        t.set_draw_bounds(Rect::new(0, 0, 800, 600)).unwrap();
        t
    }

    #[test]
    fn immediate_when_not_suspended() {
        let mut inv = InvalidationTracker::new(3);
        inv.invalidate(&transform(), Rect::new(10, 10, 20, 20)).unwrap();
        assert_eq!(inv.take_repaints(), vec![Rect::new(6, 6, 28, 28)]);
        assert!(inv.take_repaints().is_empty());
    }

    #[test]
    fn nested_suspension_issues_one_union() {
        let t = transform();
        let mut inv = InvalidationTracker::new(0);
        inv.suspend();
        inv.invalidate(&t, Rect::new(10, 10, 10, 10)).unwrap();
        inv.suspend();
        inv.invalidate(&t, Rect::new(100, 100, 10, 10)).unwrap();
        inv.resume().unwrap();
        assert!(inv.take_repaints().is_empty());
        inv.resume().unwrap();
        assert_eq!(inv.take_repaints(), vec![Rect::from_ltrb(9, 9, 111, 111)]);
    }

    #[test]
    fn resume_without_suspend_fails() {
        let mut inv = InvalidationTracker::new(0);
        assert_eq!(inv.resume(), Err(ViewportError::UnbalancedResume));
    }

    #[test]
    fn negative_rect_is_rejected() {
        let mut inv = InvalidationTracker::new(0);
        let err = inv.invalidate(&transform(), Rect::new(0, 0, -1, 5));
        assert!(matches!(err, Err(ViewportError::Core(CoreError::InvalidRect { .. }))));
    }

    #[test]
    fn shape_invalidation_reaches_glued_partners() {
        let t = transform();
        let mut d = Diagram::default();
        d.insert(Shape::planar_box(id("inv.box"), Rect::new(100, 100, 50, 50)))
            .unwrap();
        let mut wire = Shape::line(id("inv.wire"), Point::new(0, 0), Point::new(100, 120));
        wire.connect(ControlPointId(2), id("inv.box"), ControlPointId::REFERENCE);
        d.insert(wire).unwrap();

        let mut inv = InvalidationTracker::new(0);
        inv.invalidate_shape(&d, &t, id("inv.box")).unwrap();
        let rects = inv.take_repaints();
        assert_eq!(rects.len(), 2);
        assert!(rects[1].contains(Point::new(0, 0)));
    }
}
