//! Request resolution.
//!
//! A [`Target`] names what a request goes to: a URL template, a GraphQL
//! document, or a callback that produces either one when the request is
//! issued. Resolving a URL template consumes the parameters it
//! substitutes, so whatever is left in the bag travels as the query string
//! or body.

use crate::graphql::GraphqlDocument;
use futures::future::{BoxFuture, FutureExt};
use modelkit_types::{camel_to_kebab, is_present, param_to_string, HttpMethod, Params};
use regex::{Captures, Regex};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};

static URL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([^\s/?&]+)").expect("static regex is valid"));

/// A resolved request destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// A REST URL, absolute or relative to the transport's base URL.
    Url(String),
    /// A GraphQL document.
    Document(GraphqlDocument),
}

impl Operation {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&GraphqlDocument> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Url(_) => None,
        }
    }

    /// Short label for logs: the URL or the GraphQL operation name.
    pub fn label(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Document(doc) => doc.name(),
        }
    }
}

/// Callback producing an operation at request time.
pub type DeferredOperation = Arc<dyn Fn() -> BoxFuture<'static, Operation> + Send + Sync>;

/// Where a request goes.
#[derive(Clone)]
pub enum Target {
    /// Known up front. URL templates are substituted from the params.
    Fixed(Operation),
    /// Produced by a callback when the request is issued. The result is
    /// used as-is, without template substitution.
    Deferred(DeferredOperation),
}

impl Target {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Fixed(Operation::Url(url.into()))
    }

    pub fn document(document: GraphqlDocument) -> Self {
        Self::Fixed(Operation::Document(document))
    }

    /// Wraps an async callback as a deferred target.
    pub fn deferred<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Operation> + Send + 'static,
    {
        Self::Deferred(Arc::new(move || callback().boxed()))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Produces the operation for one request.
    ///
    /// Fixed URL templates have their `:token` placeholders filled from
    /// `params`, and the consumed entries are removed.
    pub async fn resolve(&self, params: &mut Params) -> Operation {
        match self {
            Self::Fixed(Operation::Url(template)) => Operation::Url(resolve_url(template, params)),
            Self::Fixed(operation) => operation.clone(),
            Self::Deferred(callback) => callback().await,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(operation) => f.debug_tuple("Fixed").field(operation).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Self::url(url)
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Self::url(url)
    }
}

impl From<GraphqlDocument> for Target {
    fn from(document: GraphqlDocument) -> Self {
        Self::document(document)
    }
}

impl From<Operation> for Target {
    fn from(operation: Operation) -> Self {
        Self::Fixed(operation)
    }
}

/// Substitutes `:token` placeholders from `params`.
///
/// A token is a run of characters other than whitespace, `/`, `?` and `&`.
/// Each substituted parameter is removed from the bag. Tokens with no
/// matching parameter are left in the URL untouched.
pub fn resolve_url(template: &str, params: &mut Params) -> String {
    URL_TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            match params.shift_remove(&caps[1]) {
                Some(value) => param_to_string(&value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Builds a query string (without the leading `?`) from `params`.
///
/// Only present values are included: `null`, `false` and `""` are skipped,
/// numeric zero is kept. Keys and values are percent-encoded. With `kebab`
/// set, camel-case keys are rewritten (`pageSize` → `page-size`).
pub fn query_params(params: &Params, kebab: bool) -> String {
    params
        .iter()
        .filter(|(_, value)| is_present(value))
        .map(|(key, value)| {
            let key = urlencoding::encode(key);
            let key = if kebab {
                camel_to_kebab(&key)
            } else {
                key.into_owned()
            };
            format!("{key}={}", urlencoding::encode(&param_to_string(value)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Appends a query string to `url`, respecting an existing `?`.
pub fn with_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// Whether a request reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Query,
    Mutation,
}

/// The method a request is issued with when no hook overrides it: `post`
/// for mutations and GraphQL documents, `get` for REST reads.
pub fn default_method(action: RequestAction, operation: &Operation) -> HttpMethod {
    match (action, operation) {
        (RequestAction::Mutation, _) | (_, Operation::Document(_)) => HttpMethod::Post,
        (RequestAction::Query, Operation::Url(_)) => HttpMethod::Get,
    }
}

/// What a method-override hook gets to see about a pending request.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor<'a> {
    pub action: RequestAction,
    pub operation: &'a Operation,
    pub params: &'a Params,
    /// The method the caller asked for.
    pub method: HttpMethod,
}

impl<'a> RequestDescriptor<'a> {
    pub fn new(
        action: RequestAction,
        operation: &'a Operation,
        params: &'a Params,
        method: HttpMethod,
    ) -> Self {
        Self {
            action,
            operation,
            params,
            method,
        }
    }

    /// Asks `hook` for an override and falls back to the caller's method.
    pub fn resolve_method<F>(&self, hook: F) -> HttpMethod
    where
        F: FnOnce(&RequestDescriptor<'_>) -> Option<HttpMethod>,
    {
        hook(self).unwrap_or(self.method)
    }
}
