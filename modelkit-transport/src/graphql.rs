//! GraphQL documents and transport.

use crate::error::{TransportError, TransportResult};
use crate::rest::error_message;
use async_trait::async_trait;
use futures::stream::BoxStream;
use modelkit_types::Params;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use regex::Regex;
use tracing::{debug, warn};

static OPERATION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(query|mutation|subscription)\s+([_A-Za-z][_0-9A-Za-z]*)")
        .expect("static regex is valid")
});

/// Stream of subscription payloads.
pub type SubscriptionStream = BoxStream<'static, TransportResult<Value>>;

/// The kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

/// A GraphQL document with a single named operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlDocument {
    source: String,
    operation: OperationType,
    name: String,
}

impl GraphqlDocument {
    /// Parses the operation header (`query Name`, `mutation Name`, ...) of
    /// `source`. Anonymous operations are rejected.
    pub fn parse(source: impl Into<String>) -> TransportResult<Self> {
        let source = source.into();
        let caps = OPERATION_HEADER.captures(&source).ok_or_else(|| {
            TransportError::InvalidDocument("no named operation found".to_string())
        })?;
        let operation = match &caps[1] {
            "query" => OperationType::Query,
            "mutation" => OperationType::Mutation,
            _ => OperationType::Subscription,
        };
        let name = caps[2].to_string();
        Ok(Self {
            source,
            operation,
            name,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// The operation name, which is also the key of the result under `data`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mutation(&self) -> bool {
        self.operation == OperationType::Mutation
    }
}

impl FromStr for GraphqlDocument {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Extension fields attached to a GraphQL error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

/// The errors returned by a GraphQL call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorBag {
    #[serde(rename = "graphQLErrors", default)]
    pub graphql_errors: Vec<GraphqlError>,
}

impl GraphqlErrorBag {
    pub fn new(graphql_errors: Vec<GraphqlError>) -> Self {
        Self { graphql_errors }
    }

    pub fn first(&self) -> Option<&GraphqlError> {
        self.graphql_errors.first()
    }

    /// `extensions.errorCode` of the first error.
    pub fn first_error_code(&self) -> Option<u16> {
        self.first()
            .and_then(|e| e.extensions.as_ref())
            .and_then(|ext| ext.error_code)
    }

    pub fn is_empty(&self) -> bool {
        self.graphql_errors.is_empty()
    }
}

impl fmt::Display for GraphqlErrorBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some(error) => f.write_str(&error.message),
            None => f.write_str("unknown error"),
        }
    }
}

/// Removes every `__typename` key, at any depth.
pub fn strip_typename(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "__typename")
                .map(|(key, value)| (key, strip_typename(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_typename).collect()),
        other => other,
    }
}

/// Picks the operation's result out of a `data` object.
///
/// Falls back to the only field when the operation name does not match a
/// key (aliased root fields).
pub fn extract_operation_data(data: Value, operation_name: &str) -> Value {
    match data {
        Value::Object(mut map) => {
            if let Some(value) = map.shift_remove(operation_name) {
                return value;
            }
            if map.len() == 1 {
                return map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
            }
            Value::Null
        }
        _ => Value::Null,
    }
}

/// A GraphQL client.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Runs a query or mutation and returns `data[operation name]`.
    async fn execute(&self, document: &GraphqlDocument, variables: Params)
        -> TransportResult<Value>;

    /// Starts a subscription. Each item is one `data[operation name]` payload.
    async fn subscribe(
        &self,
        document: &GraphqlDocument,
        variables: Params,
    ) -> TransportResult<SubscriptionStream>;
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

/// GraphQL over HTTP POST.
pub struct HttpGraphqlTransport {
    client: Client,
    endpoint: String,
}

impl HttpGraphqlTransport {
    /// Creates a transport posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GraphqlTransport for HttpGraphqlTransport {
    async fn execute(
        &self,
        document: &GraphqlDocument,
        variables: Params,
    ) -> TransportResult<Value> {
        debug!(operation = document.name(), endpoint = %self.endpoint, "graphql request");

        let body = json!({
            "query": document.source(),
            "variables": strip_typename(Value::Object(variables)),
            "operationName": document.name(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("graphql request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message: error_message(&Value::Null, status),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let parsed: GraphqlResponse = match serde_json::from_value(body.clone()) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => GraphqlResponse::default(),
            Err(e) => return Err(e.into()),
        };

        if !parsed.errors.is_empty() {
            warn!(
                operation = document.name(),
                errors = parsed.errors.len(),
                "graphql response carried errors"
            );
            return Err(TransportError::Graphql(GraphqlErrorBag::new(parsed.errors)));
        }

        // A failed status without a GraphQL error bag is still a failure.
        if !status.is_success() {
            warn!(operation = document.name(), status = status.as_u16(), "graphql request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        Ok(extract_operation_data(
            parsed.data.unwrap_or(Value::Null),
            document.name(),
        ))
    }

    async fn subscribe(
        &self,
        document: &GraphqlDocument,
        _variables: Params,
    ) -> TransportResult<SubscriptionStream> {
        Err(TransportError::Unsupported(format!(
            "subscription {} requires a streaming transport",
            document.name()
        )))
    }
}
