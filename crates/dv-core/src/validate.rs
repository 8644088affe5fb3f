//! Structural diagnostics for diagrams.
//!
//! Reports issues without modifying the diagram. Hosts run this after
//! loading a diagram from an external repository; the editor's command
//! layer relies on [`Diagram::reparent`] to keep parent chains acyclic.

use crate::diagram::Diagram;
use crate::id::{LayerId, ShapeId};
use crate::model::ControlPointCapabilities;
use std::collections::HashSet;

// ─── Diagnostic types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The diagram cannot be displayed correctly.
    Error,
    /// Likely a mistake.
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub shape: ShapeId,
    pub message: String,
    pub severity: Severity,
    /// Short rule identifier (e.g. "dangling-connection").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all rules and return diagnostics, errors first.
#[must_use]
pub fn validate_diagram(diagram: &Diagram) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    check_parent_chains(diagram, &mut diags);
    check_connections(diagram, &mut diags);
    check_layers(diagram, &mut diags);
    check_empty_groups(diagram, &mut diags);
    diags.sort_by_key(|d| match d.severity {
        Severity::Error => 0,
        Severity::Warning => 1,
    });
    diags
}

// ─── Rules ────────────────────────────────────────────────────────────────

/// A parent walk longer than the number of shapes must revisit a shape.
fn check_parent_chains(diagram: &Diagram, diags: &mut Vec<Diagnostic>) {
    let limit = diagram.len();
    for shape in diagram.shapes() {
        let mut current = shape.id;
        let mut steps = 0;
        while let Some(parent) = diagram.parent(current) {
            steps += 1;
            if steps > limit {
                diags.push(Diagnostic {
                    shape: shape.id,
                    message: format!("Parent chain of {} loops back on itself.", shape.id),
                    severity: Severity::Error,
                    rule: "parent-cycle",
                });
                break;
            }
            current = parent;
        }
    }
}

fn check_connections(diagram: &Diagram, diags: &mut Vec<Diagnostic>) {
    for shape in diagram.shapes() {
        for c in &shape.connections {
            if !shape.has_capability(c.own_point, ControlPointCapabilities::GLUE) {
                diags.push(Diagnostic {
                    shape: shape.id,
                    message: format!(
                        "{} is connected through {}, which is not a glue point.",
                        shape.id, c.own_point
                    ),
                    severity: Severity::Warning,
                    rule: "not-a-glue-point",
                });
            }
            let Some(other) = diagram.get(c.other_shape) else {
                diags.push(Diagnostic {
                    shape: shape.id,
                    message: format!(
                        "{} is glued to {}, which does not exist.",
                        shape.id, c.other_shape
                    ),
                    severity: Severity::Error,
                    rule: "dangling-connection",
                });
                continue;
            };
            if !c.other_point.is_reference()
                && !other.has_capability(c.other_point, ControlPointCapabilities::CONNECT)
            {
                diags.push(Diagnostic {
                    shape: shape.id,
                    message: format!(
                        "{} is glued to {} of {}, which is not a connection point.",
                        shape.id, c.other_point, c.other_shape
                    ),
                    severity: Severity::Error,
                    rule: "dangling-connection",
                });
            }
        }
    }
}

fn check_layers(diagram: &Diagram, diags: &mut Vec<Diagnostic>) {
    let known: HashSet<LayerId> = diagram.layers().iter().map(|l| l.id).collect();
    for shape in diagram.shapes() {
        let unknown = std::iter::once(shape.home_layer)
            .filter(|l| !l.is_none())
            .chain(shape.supplemental_layers.iter())
            .filter(|l| !known.contains(l));
        for layer in unknown {
            diags.push(Diagnostic {
                shape: shape.id,
                message: format!("{} is assigned to undefined {layer}.", shape.id),
                severity: Severity::Warning,
                rule: "unknown-layer",
            });
        }
    }
}

fn check_empty_groups(diagram: &Diagram, diags: &mut Vec<Diagnostic>) {
    for shape in diagram.shapes().filter(|s| s.kind.is_group()) {
        if diagram.children(shape.id).is_empty() {
            diags.push(Diagnostic {
                shape: shape.id,
                message: format!("Group {} has no members.", shape.id),
                severity: Severity::Warning,
                rule: "empty-group",
            });
        }
    }
}
