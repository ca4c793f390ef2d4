//! Request plumbing for modelkit.
//!
//! This crate turns a request description into a server call and back:
//!
//! - [`resolver`]: URL templates, query strings, deferred targets and
//!   method selection
//! - [`rest`]: the [`RestTransport`] trait and a reqwest implementation
//! - [`graphql`]: GraphQL documents, error bags and the
//!   [`GraphqlTransport`] trait
//! - [`schema`]: input-type field lookup from schema introspection
//! - [`mock`]: recording transports for tests
//!
//! Models and repositories only ever talk to the traits, so the HTTP
//! implementations can be swapped freely.

pub mod error;
pub mod graphql;
pub mod mock;
pub mod resolver;
pub mod rest;
pub mod schema;

pub use error::{TransportError, TransportResult};
pub use graphql::{
    extract_operation_data, strip_typename, ErrorExtensions, GraphqlDocument, GraphqlError,
    GraphqlErrorBag, GraphqlTransport, HttpGraphqlTransport, OperationType, SubscriptionStream,
};
pub use resolver::{
    default_method, query_params, resolve_url, with_query, DeferredOperation, Operation, RequestAction,
    RequestDescriptor, Target,
};
pub use rest::{error_message, HttpRestTransport, RestTransport};
pub use schema::{IntrospectionSchemaProvider, SchemaProvider, StaticSchema};
