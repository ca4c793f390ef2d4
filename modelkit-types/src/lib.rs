//! Core type definitions for modelkit.
//!
//! This crate defines the small, transport-agnostic vocabulary shared by
//! every other modelkit crate:
//! - [`Params`]: the insertion-ordered parameter bag used for query strings,
//!   request bodies, GraphQL variables and property projections
//! - [`HttpMethod`]: the request method a REST call is issued with
//! - [`Event`]: the record delivered to lifecycle event subscribers
//!
//! Nothing here performs I/O.

mod event;
mod method;
mod params;

pub use event::{event_names, Event};
pub use method::HttpMethod;
pub use params::{
    camel_case, camel_to_kebab, into_params, is_present, is_truthy, param_to_string, Params,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
}
