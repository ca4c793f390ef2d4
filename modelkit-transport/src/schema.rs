//! Input-type field lookup.
//!
//! Update variables are projected onto the fields of a backend input type
//! (`UserInput` for a `User` model). The field list comes from a
//! [`SchemaProvider`], usually backed by the server's introspection result.

use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Introspection query sent to a schema URL. Only type and field names are
/// needed.
pub const INTROSPECTION_QUERY: &str = "query IntrospectionQuery { __schema { types { kind name fields(includeDeprecated: true) { name } inputFields { name } } } }";

/// Resolves the field names of a named schema type.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Field names of `type_name`, or `None` if the schema lacks the type.
    async fn input_field_names(&self, type_name: &str) -> TransportResult<Option<Vec<String>>>;
}

/// An in-memory schema: type name to field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSchema {
    types: HashMap<String, Vec<String>>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a type.
    pub fn with_type<I, S>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types
            .insert(name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Builds a schema from an introspection result.
    ///
    /// Accepts either `{"__schema": ...}` or the full response
    /// `{"data": {"__schema": ...}}`. Input types contribute their
    /// `inputFields`, other types their `fields`.
    pub fn from_introspection(document: &Value) -> TransportResult<Self> {
        let schema = document
            .get("__schema")
            .or_else(|| document.pointer("/data/__schema"))
            .ok_or_else(|| TransportError::Schema("missing __schema".to_string()))?;
        let types = schema
            .get("types")
            .and_then(Value::as_array)
            .ok_or_else(|| TransportError::Schema("missing __schema.types".to_string()))?;

        let mut out = HashMap::new();
        for ty in types {
            let Some(name) = ty.get("name").and_then(Value::as_str) else {
                continue;
            };
            let fields = ty
                .get("inputFields")
                .and_then(Value::as_array)
                .or_else(|| ty.get("fields").and_then(Value::as_array));
            let Some(fields) = fields else {
                continue;
            };
            let names = fields
                .iter()
                .filter_map(|f| f.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            out.insert(name.to_string(), names);
        }
        Ok(Self { types: out })
    }

    pub fn fields(&self, type_name: &str) -> Option<&[String]> {
        self.types.get(type_name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[async_trait]
impl SchemaProvider for StaticSchema {
    async fn input_field_names(&self, type_name: &str) -> TransportResult<Option<Vec<String>>> {
        Ok(self.fields(type_name).map(<[String]>::to_vec))
    }
}

/// Posts the introspection query to a URL on first use and keeps the result.
pub struct IntrospectionSchemaProvider {
    name: String,
    schema_url: String,
    client: Client,
    cache: RwLock<Option<Arc<StaticSchema>>>,
}

impl IntrospectionSchemaProvider {
    /// Creates a provider named `name` (the provider key from configuration).
    pub fn new(
        name: impl Into<String>,
        schema_url: impl Into<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            schema_url: schema_url.into(),
            client,
            cache: RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_url(&self) -> &str {
        &self.schema_url
    }

    /// The cached schema, fetching it if this is the first call.
    pub async fn schema(&self) -> TransportResult<Arc<StaticSchema>> {
        if let Some(schema) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(schema));
        }

        let mut guard = self.cache.write().await;
        // Another task may have filled the cache while we waited.
        if let Some(schema) = guard.as_ref() {
            return Ok(Arc::clone(schema));
        }

        debug!(provider = %self.name, url = %self.schema_url, "fetching schema introspection");
        let response = self
            .client
            .post(&self.schema_url)
            .json(&json!({ "query": INTROSPECTION_QUERY }))
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("schema fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TransportError::Schema(format!(
                "schema fetch returned {}",
                response.status()
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Schema(format!("failed to parse schema: {e}")))?;
        let schema = Arc::new(StaticSchema::from_introspection(&document)?);
        info!(provider = %self.name, types = schema.len(), "schema loaded");

        *guard = Some(Arc::clone(&schema));
        Ok(schema)
    }
}

#[async_trait]
impl SchemaProvider for IntrospectionSchemaProvider {
    async fn input_field_names(&self, type_name: &str) -> TransportResult<Option<Vec<String>>> {
        let schema = self.schema().await?;
        Ok(schema.fields(type_name).map(<[String]>::to_vec))
    }
}
