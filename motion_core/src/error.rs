// Typed errors with thiserror. Only configuration and the wasm boundary are fallible;
// per-frame work logs and carries on.

use thiserror::Error;

/// Failure reported by a [`Host`](crate::host::Host) for a single element.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("failed to write {property}: {message}")]
    StyleWrite {
        property: &'static str,
        message: String,
    },

    #[error("element is no longer attached to the document")]
    Detached,
}

/// Why a controller could not be created: a bad config value or unparseable JSON.
/// Per-element host failures never surface here; they are logged where they happen.
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MotionError {
    fn from(err: serde_json::Error) -> Self {
        MotionError::Serialization(err.to_string())
    }
}
