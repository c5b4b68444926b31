//! Error types for the generator core.
//!
//! Invariant violations carry the offending IDL location so a bad input is
//! reported against the `.idl` file, not against the generator. Failures
//! that the Web IDL algorithms handle at *runtime* (overload resolution
//! failure, wrong union arm, missing required dictionary member) never
//! surface here; they are emitted as throw statements in the generated C++.

use crate::codegen::renderer::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Unsupported or inconsistent IDL reached the generator.
    #[error("{message} (at {location})")]
    Invariant { message: String, location: String },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub fn invariant(message: impl Into<String>, location: impl std::fmt::Display) -> Self {
        GenerationError::Invariant { message: message.into(), location: location.to_string() }
    }
}
