//! Error types for the transport layer.

use crate::graphql::GraphqlErrorBag;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while issuing a request.
///
/// Foreign errors are captured as messages so the type stays `Clone`;
/// models and repositories keep a copy as their last error while handing
/// the original back to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The GraphQL response carried an `errors` array.
    #[error("graphql error: {0}")]
    Graphql(GraphqlErrorBag),

    /// A GraphQL document without a named operation.
    #[error("invalid graphql document: {0}")]
    InvalidDocument(String),

    /// Schema introspection failed or was malformed.
    #[error("schema error: {0}")]
    Schema(String),

    /// A body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
