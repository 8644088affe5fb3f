//! Errors raised by the viewport controller.

use crate::commands::EditOperation;
use dv_core::CoreError;
use dv_render::RenderError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewportError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// `resume_updates` without a matching `suspend_updates`.
    #[error("resume_updates called without a matching suspend_updates")]
    UnbalancedResume,

    /// A user-facing message was raised but nobody listens for them.
    #[error("no user message listener registered")]
    NoUserMessageListener,

    /// The command layer refused an edit operation.
    #[error("{operation} not possible: {reason}")]
    EditRejected {
        operation: EditOperation,
        reason: String,
    },

    /// A command was executed that does not fit the current diagram.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The active tool reported a failure; it has been cancelled.
    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("clipboard: {0}")]
    Clipboard(String),
}

impl From<rmp_serde::encode::Error> for ViewportError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Clipboard(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ViewportError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Clipboard(err.to_string())
    }
}
