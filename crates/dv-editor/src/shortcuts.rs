//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic [`ViewportAction`]s. `key` is the
//! host's key name (`"z"`, `"Delete"`, `"ArrowLeft"`), modifiers are
//! platform aware: ⌘ on macOS and Ctrl elsewhere both act as the command
//! key.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportAction {
    // ── Edit ──
    Undo,
    Redo,
    Cut,
    Copy,
    Paste,
    Delete,
    SelectAll,
    Group,
    Ungroup,
    Aggregate,
    Disaggregate,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomToFit,

    // ── Z-order ──
    BringToFront,
    SendToBack,

    // ── Selection ──
    /// Nudge the selection; `coarse` moves by one grid cell instead of
    /// one unit.
    Nudge { dx: i32, dy: i32, coarse: bool },
    /// Cancel the tool action, or unselect everything.
    Escape,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action, `None` if the combo is unbound.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ViewportAction> {
        let cmd = modifiers.command();
        let shift = modifiers.shift;
        let alt = modifiers.alt;

        // ── Modifier combos first (most specific) ──
        if cmd && alt {
            return match key {
                "g" | "G" if shift => Some(ViewportAction::Disaggregate),
                "g" | "G" => Some(ViewportAction::Aggregate),
                _ => None,
            };
        }

        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ViewportAction::Redo),
                "g" | "G" => Some(ViewportAction::Ungroup),
                "]" => Some(ViewportAction::BringToFront),
                "[" => Some(ViewportAction::SendToBack),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ViewportAction::Undo),
                "y" | "Y" => Some(ViewportAction::Redo),
                "x" | "X" => Some(ViewportAction::Cut),
                "c" | "C" => Some(ViewportAction::Copy),
                "v" | "V" => Some(ViewportAction::Paste),
                "a" | "A" => Some(ViewportAction::SelectAll),
                "g" | "G" => Some(ViewportAction::Group),
                "=" | "+" => Some(ViewportAction::ZoomIn),
                "-" => Some(ViewportAction::ZoomOut),
                "0" => Some(ViewportAction::ZoomToFit),
                _ => None,
            };
        }

        if let Some((dx, dy)) = arrow(key) {
            return Some(ViewportAction::Nudge {
                dx,
                dy,
                coarse: shift,
            });
        }

        if shift {
            return None;
        }

        // ── Single keys (no modifiers) ──
        match key {
            "Delete" | "Backspace" => Some(ViewportAction::Delete),
            "Escape" => Some(ViewportAction::Escape),
            _ => None,
        }
    }
}

fn arrow(key: &str) -> Option<(i32, i32)> {
    match key {
        "ArrowLeft" => Some((-1, 0)),
        "ArrowRight" => Some((1, 0)),
        "ArrowUp" => Some((0, -1)),
        "ArrowDown" => Some((0, 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: Modifiers = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
    const CMD_SHIFT: Modifiers = Modifiers {
        ctrl: true,
        shift: true,
        ..Modifiers::NONE
    };
    const CMD_ALT: Modifiers = Modifiers {
        ctrl: true,
        alt: true,
        ..Modifiers::NONE
    };

    #[test]
    fn resolve_undo_redo() {
        // Cmd+Z → Undo
        assert_eq!(ShortcutMap::resolve("z", META), Some(ViewportAction::Undo));
        // Ctrl+Z → Undo
        assert_eq!(
            ShortcutMap::resolve("z", Modifiers::CTRL),
            Some(ViewportAction::Undo)
        );
        // Ctrl+Shift+Z → Redo
        assert_eq!(ShortcutMap::resolve("Z", CMD_SHIFT), Some(ViewportAction::Redo));
        assert_eq!(ShortcutMap::resolve("y", META), Some(ViewportAction::Redo));
    }

    #[test]
    fn resolve_clipboard() {
        assert_eq!(ShortcutMap::resolve("x", META), Some(ViewportAction::Cut));
        assert_eq!(ShortcutMap::resolve("c", META), Some(ViewportAction::Copy));
        assert_eq!(ShortcutMap::resolve("v", META), Some(ViewportAction::Paste));
    }

    #[test]
    fn resolve_structure_edits() {
        assert_eq!(
            ShortcutMap::resolve("g", Modifiers::CTRL),
            Some(ViewportAction::Group)
        );
        assert_eq!(
            ShortcutMap::resolve("g", CMD_SHIFT),
            Some(ViewportAction::Ungroup)
        );
        assert_eq!(
            ShortcutMap::resolve("g", CMD_ALT),
            Some(ViewportAction::Aggregate)
        );
        assert_eq!(
            ShortcutMap::resolve(
                "g",
                Modifiers {
                    shift: true,
                    ..CMD_ALT
                }
            ),
            Some(ViewportAction::Disaggregate)
        );
    }

    #[test]
    fn resolve_delete_and_escape() {
        assert_eq!(
            ShortcutMap::resolve("Delete", Modifiers::NONE),
            Some(ViewportAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", Modifiers::NONE),
            Some(ViewportAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Escape", Modifiers::NONE),
            Some(ViewportAction::Escape)
        );
    }

    #[test]
    fn resolve_nudge() {
        assert_eq!(
            ShortcutMap::resolve("ArrowLeft", Modifiers::NONE),
            Some(ViewportAction::Nudge {
                dx: -1,
                dy: 0,
                coarse: false
            })
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowDown", Modifiers::SHIFT),
            Some(ViewportAction::Nudge {
                dx: 0,
                dy: 1,
                coarse: true
            })
        );
    }

    #[test]
    fn resolve_zoom() {
        assert_eq!(ShortcutMap::resolve("=", META), Some(ViewportAction::ZoomIn));
        assert_eq!(ShortcutMap::resolve("-", META), Some(ViewportAction::ZoomOut));
        assert_eq!(ShortcutMap::resolve("0", META), Some(ViewportAction::ZoomToFit));
    }

    #[test]
    fn resolve_modifier_precedence() {
        assert_eq!(ShortcutMap::resolve("z", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("q", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("Delete", Modifiers::SHIFT), None);
    }
}
