//! Error types for models and repositories.

use modelkit_registry::RegistryError;
use modelkit_transport::TransportError;
use thiserror::Error;
use tracing::debug;

/// Result type for model and repository operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors surfaced by model and repository operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Required configuration is missing, e.g. no fetch-many target.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend rejected the credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend rejected the payload (422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other backend failure, carrying the original message.
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// Unclassified transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registry lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Props could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The context lacks a transport, schema or provider.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error code assumed when a GraphQL failure carries no usable code.
pub const FALLBACK_ERROR_CODE: u16 = 500;
/// Message used when a GraphQL failure carries no errors at all.
pub const FALLBACK_ERROR_MESSAGE: &str = "Server Error";

/// Maps a transport failure onto the error taxonomy.
///
/// GraphQL error bags are classified by the first error's
/// `extensions.errorCode`: 401 is [`ModelError::Unauthorized`], 422 is
/// [`ModelError::Validation`], anything else is [`ModelError::Unexpected`]
/// with the error's message. An empty bag counts as a 500 "Server Error".
/// Every other transport failure is returned unchanged.
pub fn classify(err: TransportError) -> ModelError {
    let TransportError::Graphql(bag) = &err else {
        return ModelError::Transport(err);
    };

    let (code, message) = match bag.first() {
        Some(first) => {
            let extensions = first.extensions.clone().unwrap_or_default();
            (
                extensions.error_code.unwrap_or(FALLBACK_ERROR_CODE),
                extensions.message.unwrap_or_else(|| first.message.clone()),
            )
        }
        None => (FALLBACK_ERROR_CODE, FALLBACK_ERROR_MESSAGE.to_string()),
    };
    debug!(code, %message, "classifying graphql error");

    match code {
        401 => ModelError::Unauthorized(message),
        422 => ModelError::Validation(message),
        _ => ModelError::Unexpected(
            bag.first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
        ),
    }
}
