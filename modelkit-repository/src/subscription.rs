//! Push updates through GraphQL subscriptions.
//!
//! A repository lists subscription descriptors and registers one handler
//! per subscription under the `on<OperationName>` convention (`userAdded`
//! is handled by `onUserAdded`). [`SubscriptionFeed`] merges the streams
//! and hands each payload to its handler as the caller drives it.

use convert_case::{Case, Casing};
use futures::stream::{BoxStream, SelectAll, StreamExt};
use modelkit_transport::{GraphqlDocument, TransportResult};
use modelkit_types::Params;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Callback receiving each pushed payload.
pub type SubscriptionHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// A long-lived subscription a repository opens.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionDescriptor {
    pub document: GraphqlDocument,
    pub variables: Params,
}

impl SubscriptionDescriptor {
    pub fn new(document: GraphqlDocument, variables: Params) -> Self {
        Self {
            document,
            variables,
        }
    }

    /// Name of the handler this subscription is delivered to.
    pub fn handler_name(&self) -> String {
        handler_name(self.document.name())
    }
}

/// `userAdded` → `onUserAdded`.
pub fn handler_name(operation_name: &str) -> String {
    format!("on{}", operation_name.to_case(Case::Pascal))
}

pub(crate) type Delivery = (String, SubscriptionHandler, TransportResult<Value>);

/// Merged payload streams of every subscription a repository opened.
///
/// Payloads of one subscription arrive in the order the transport
/// delivered them. Dropping the feed closes every stream.
pub struct SubscriptionFeed {
    inner: SelectAll<BoxStream<'static, Delivery>>,
}

impl SubscriptionFeed {
    pub(crate) fn new(streams: Vec<BoxStream<'static, Delivery>>) -> Self {
        Self {
            inner: futures::stream::select_all(streams),
        }
    }

    /// Number of subscriptions that have not ended yet.
    pub fn active(&self) -> usize {
        self.inner.len()
    }

    /// Waits for the next payload, delivers it to its handler and returns
    /// it. `None` once every subscription has ended. Errors are returned
    /// without calling the handler.
    pub async fn next(&mut self) -> Option<TransportResult<Value>> {
        let (handler_name, handler, item) = self.inner.next().await?;
        if let Ok(payload) = &item {
            trace!(handler = %handler_name, "delivering subscription payload");
            handler(payload);
        }
        Some(item)
    }

    /// Delivers payloads until every subscription ends. Returns how many
    /// payloads were delivered, or the first error.
    pub async fn run(mut self) -> TransportResult<usize> {
        let mut delivered = 0;
        while let Some(item) = self.next().await {
            item?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl fmt::Debug for SubscriptionFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionFeed")
            .field("active", &self.active())
            .finish()
    }
}
