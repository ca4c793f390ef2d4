//! Error types for registry lookups.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by [`Registry::get`](crate::Registry::get).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Nothing is stored under the key.
    #[error("registry key not found: {key}")]
    NotFound { key: String },

    /// A value is stored under the key but it is not of the requested type.
    #[error("registry key {key} does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}
