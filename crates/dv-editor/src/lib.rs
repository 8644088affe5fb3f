pub mod commands;
pub mod controller;
pub mod edit_buffer;
pub mod error;
pub mod events;
pub mod input;
pub mod invalidation;
pub mod scroll;
pub mod selection;
pub mod shortcuts;
pub mod tools;

pub use commands::{
    CommandLayer, CommandStack, DiagramChange, DiagramCommand, EditOperation, Placement,
    check_command,
};
pub use controller::ViewportController;
pub use edit_buffer::{EditAction, EditBuffer, PlacedShape};
pub use error::ViewportError;
pub use events::{Confirmation, MessageSeverity, UserMessage, UserMessageListener, ViewportEvent};
pub use input::{InputEvent, Modifiers, MouseButton, ToolEvent};
pub use invalidation::InvalidationTracker;
pub use scroll::{ScrollDirection, ScrollTimers};
pub use selection::{SelectionCx, SelectionSet};
pub use shortcuts::{ShortcutMap, ViewportAction};
pub use tools::{Cursor, SelectionTool, TemplateTool, Tool, ToolContext, ToolKind, ToolRequest, ToolResult};
