//! Recording transports for tests.
//!
//! Both mocks record every call and answer from a queue of canned results.
//! An empty queue answers with `Value::Null`.

use crate::error::TransportResult;
use crate::graphql::{
    strip_typename, GraphqlDocument, GraphqlTransport, OperationType, SubscriptionStream,
};
use crate::rest::RestTransport;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use modelkit_types::{HttpMethod, Params};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A recorded REST call.
#[derive(Debug, Clone, PartialEq)]
pub struct RestCall {
    pub url: String,
    pub params: Params,
    pub method: HttpMethod,
}

/// A recorded GraphQL call.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlCall {
    pub operation_name: String,
    pub operation: OperationType,
    pub variables: Params,
}

/// REST mock. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MockRestTransport {
    calls: Arc<Mutex<Vec<RestCall>>>,
    responses: Arc<Mutex<VecDeque<TransportResult<Value>>>>,
}

impl MockRestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next unanswered call.
    pub fn push_response(&self, response: TransportResult<Value>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<RestCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<RestCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RestTransport for MockRestTransport {
    async fn request(
        &self,
        url: &str,
        params: Params,
        method: HttpMethod,
    ) -> TransportResult<Value> {
        self.calls.lock().unwrap().push(RestCall {
            url: url.to_string(),
            params,
            method,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }
}

/// GraphQL mock. Clones share the same queues.
#[derive(Clone, Default)]
pub struct MockGraphqlTransport {
    calls: Arc<Mutex<Vec<GraphqlCall>>>,
    responses: Arc<Mutex<VecDeque<TransportResult<Value>>>>,
    subscriptions: Arc<Mutex<VecDeque<Vec<TransportResult<Value>>>>>,
}

impl MockGraphqlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: TransportResult<Value>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Queues the payloads of the next subscription, delivered in order.
    pub fn push_subscription(&self, payloads: Vec<TransportResult<Value>>) {
        self.subscriptions.lock().unwrap().push_back(payloads);
    }

    pub fn calls(&self) -> Vec<GraphqlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<GraphqlCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn record(&self, document: &GraphqlDocument, variables: Params) {
        let variables = match strip_typename(Value::Object(variables)) {
            Value::Object(map) => map,
            _ => Params::new(),
        };
        self.calls.lock().unwrap().push(GraphqlCall {
            operation_name: document.name().to_string(),
            operation: document.operation(),
            variables,
        });
    }
}

#[async_trait]
impl GraphqlTransport for MockGraphqlTransport {
    async fn execute(
        &self,
        document: &GraphqlDocument,
        variables: Params,
    ) -> TransportResult<Value> {
        self.record(document, variables);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }

    async fn subscribe(
        &self,
        document: &GraphqlDocument,
        variables: Params,
    ) -> TransportResult<SubscriptionStream> {
        self.record(document, variables);
        let payloads = self
            .subscriptions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(stream::iter(payloads).boxed())
    }
}
