//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Aether.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Unrecognized status, level or role label.
    #[error("Unknown {kind}: {value}")]
    UnknownLabel { kind: &'static str, value: String },
}
