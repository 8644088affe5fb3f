//! Notifications raised by the viewport.
//!
//! State changes are queued as [`ViewportEvent`]s and drained by the host
//! after each call. User-facing messages need an answer, so they go
//! through a synchronous [`UserMessageListener`] instead.

use crate::commands::EditOperation;
use dv_core::{LayerId, Point, ShapeId};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// Selection changed; carries the new selection, bottom first.
    ShapesSelected(Vec<ShapeId>),
    ShapesInserted(Vec<ShapeId>),
    ShapesRemoved(Vec<ShapeId>),
    ShapesMoved(Vec<ShapeId>),
    ShapesResized(Vec<ShapeId>),
    ZoomChanged(u32),
    ScrollChanged(Point),
    LayerVisibilityChanged(Vec<LayerId>),
    ActiveLayersChanged(Vec<LayerId>),
    /// A new diagram is about to replace the current one.
    DiagramChanging,
    DiagramChanged,
    CaptionEditorOpened(ShapeId),
    CaptionEditorClosed(ShapeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub severity: MessageSeverity,
    pub text: String,
    /// The edit operation the message is about, if any.
    pub operation: Option<EditOperation>,
    /// Whether the listener is asked to continue or abort.
    pub needs_confirmation: bool,
}

impl UserMessage {
    pub fn rejected(operation: EditOperation, reason: &str) -> Self {
        Self {
            severity: MessageSeverity::Warning,
            text: format!("{operation} not possible: {reason}"),
            operation: Some(operation),
            needs_confirmation: false,
        }
    }

    pub fn confirm(text: String) -> Self {
        Self {
            severity: MessageSeverity::Warning,
            text,
            operation: None,
            needs_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Acknowledged,
    Continue,
    Abort,
}

pub trait UserMessageListener {
    fn show(&mut self, message: &UserMessage) -> Confirmation;
}

impl<F> UserMessageListener for F
where
    F: FnMut(&UserMessage) -> Confirmation,
{
    fn show(&mut self, message: &UserMessage) -> Confirmation {
        self(message)
    }
}
