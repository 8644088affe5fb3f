//! Error types for the core model.
//!
//! Everything here signals a contract violation by the caller or a
//! structurally invalid diagram. Ordinary inputs (zoom 0, scrolling past
//! the end) are clamped by the transform and never produce an error.

use crate::id::{LayerId, ShapeId};
use thiserror::Error;

/// Errors raised by geometry, diagram and configuration code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A rectangle with negative width or height was passed where a
    /// normalized rectangle is required.
    #[error("invalid rectangle: x={x} y={y} width={width} height={height}")]
    InvalidRect {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },

    /// A floating point coordinate was NaN or infinite.
    #[error("non-finite coordinate in {context}")]
    NonFinite { context: &'static str },

    /// A size-like property must be strictly positive.
    #[error("{name} must be greater than zero, got {value}")]
    NonPositive { name: &'static str, value: i64 },

    /// A property was set outside of its documented range.
    #[error("{name} out of range: {value} not in {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("shape {0} not found")]
    ShapeNotFound(ShapeId),

    #[error("shape {0} already exists")]
    DuplicateShape(ShapeId),

    #[error("layer {0} not found")]
    LayerNotFound(LayerId),

    /// Reparenting would make a shape its own ancestor.
    #[error("parent chain of {0} contains a cycle")]
    ParentCycle(ShapeId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn invalid_rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::InvalidRect {
            x: x.into(),
            y: y.into(),
            width: width.into(),
            height: height.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
