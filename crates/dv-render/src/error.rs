use crate::canvas::Space;
use dv_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A draw call ran while the canvas was in the other coordinate
    /// space, e.g. grips drawn before the transform was reset.
    #[error("draw call expects {expected:?} space but the canvas is in {actual:?} space")]
    WrongRenderSpace { expected: Space, actual: Space },

    /// `pop_clip` without a matching `push_clip`.
    #[error("clip stack underflow")]
    ClipUnderflow,

    #[error(transparent)]
    Core(#[from] CoreError),
}
