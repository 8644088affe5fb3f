//! Input abstraction layer.
//!
//! Hosts translate their native events into [`InputEvent`]s in viewport
//! pixels. The controller converts positions to diagram units before a
//! tool sees them.

use dv_core::Point;

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    /// Platform command key: ⌘ on macOS, Ctrl elsewhere.
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A normalized input event, positions in viewport pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        /// 2 for a double click.
        clicks: u8,
    },

    PointerMove {
        position: Point,
        /// Button held during the move, if any.
        button: Option<MouseButton>,
        modifiers: Modifiers,
    },

    PointerUp {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },

    /// Wheel rotation in notches; positive scrolls down or zooms in.
    Wheel {
        position: Point,
        delta: i32,
        modifiers: Modifiers,
    },

    Key { key: String, modifiers: Modifiers },

    /// The viewport lost keyboard/pointer focus.
    FocusLost,
}

impl InputEvent {
    pub fn pointer_down(x: i32, y: i32) -> Self {
        Self::PointerDown {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            clicks: 1,
        }
    }

    pub fn pointer_move(x: i32, y: i32) -> Self {
        Self::PointerMove {
            position: Point::new(x, y),
            button: Some(MouseButton::Left),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: i32, y: i32) -> Self {
        Self::PointerUp {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key(key: &str, modifiers: Modifiers) -> Self {
        Self::Key {
            key: key.to_string(),
            modifiers,
        }
    }

    /// Viewport position if this is a pointer event.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { position, .. }
            | Self::PointerMove { position, .. }
            | Self::PointerUp { position, .. }
            | Self::Wheel { position, .. } => Some(*position),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Wheel { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers,
            Self::FocusLost => Modifiers::NONE,
        }
    }

    /// Same event with its modifiers replaced.
    pub fn with_modifiers(mut self, mods: Modifiers) -> Self {
        match &mut self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Wheel { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers = mods,
            Self::FocusLost => {}
        }
        self
    }
}

/// An input event as seen by a tool: the original event plus its
/// position in diagram units.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEvent {
    pub input: InputEvent,
    pub diagram_position: Option<Point>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_modifier_is_ctrl_or_meta() {
        assert!(Modifiers::CTRL.command());
        assert!(
            Modifiers {
                meta: true,
                ..Modifiers::NONE
            }
            .command()
        );
        assert!(!Modifiers::SHIFT.command());
    }

    #[test]
    fn key_events_have_no_position() {
        assert_eq!(InputEvent::key("a", Modifiers::NONE).position(), None);
        assert_eq!(
            InputEvent::pointer_move(3, 4).position(),
            Some(Point::new(3, 4))
        );
        let shifted = InputEvent::pointer_down(0, 0).with_modifiers(Modifiers::SHIFT);
        assert!(shifted.modifiers().shift);
    }
}
