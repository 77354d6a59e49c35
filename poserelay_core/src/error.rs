//! Error types for the relay core.

use thiserror::Error;

/// Errors that can occur in the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A filtered/renamed name's suffix did not parse as a non-negative
    /// integer id - a naming-scheme mismatch between producer and relay
    #[error("invalid entity name {name:?}: expected an integer suffix after the canonical tag")]
    InvalidEntityName {
        /// The offending (already renamed) name
        name: String,
    },
}

impl RelayError {
    /// Creates an invalid-entity-name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidEntityName { name: name.into() }
    }
}
