//! The bundle of shared state every model and repository is built with.

use crate::config::{Config, CONFIG_KEY};
use crate::error::{ModelError, ModelResult};
use modelkit_registry::Registry;
use modelkit_transport::{
    GraphqlTransport, HttpGraphqlTransport, HttpRestTransport, IntrospectionSchemaProvider,
    RestTransport, SchemaProvider,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the provider configured by the top-level GraphQL settings.
pub const DEFAULT_PROVIDER: &str = "default";

/// GraphQL client and schema of one named provider.
#[derive(Clone, Default)]
pub struct ProviderHandles {
    pub graphql: Option<Arc<dyn GraphqlTransport>>,
    pub schema: Option<Arc<dyn SchemaProvider>>,
}

/// Configuration, registry and transports shared by models and repositories.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct Context {
    config: Arc<Config>,
    registry: Arc<Registry>,
    rest: Option<Arc<dyn RestTransport>>,
    graphql: Option<Arc<dyn GraphqlTransport>>,
    schema: Option<Arc<dyn SchemaProvider>>,
    providers: HashMap<String, ProviderHandles>,
}

impl Context {
    /// A context with its own registry and no transports attached.
    ///
    /// The configuration is published into the registry under
    /// [`CONFIG_KEY`].
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Arc::new(Registry::new()))
    }

    /// A context on top of an existing registry.
    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        let config = Arc::new(config);
        registry.set_entry(CONFIG_KEY, config.clone());
        Self {
            config,
            registry,
            rest: None,
            graphql: None,
            schema: None,
            providers: HashMap::new(),
        }
    }

    /// Builds the HTTP transports described by `config` on the process-wide
    /// registry.
    pub fn from_config(config: Config) -> ModelResult<Self> {
        Self::from_config_in(config, Registry::global())
    }

    /// Builds the HTTP transports described by `config` on `registry`.
    pub fn from_config_in(config: Config, registry: Arc<Registry>) -> ModelResult<Self> {
        let timeout = config.timeout();

        let rest = HttpRestTransport::new(config.base_url.clone(), timeout)?
            .with_kebab_case_query(config.kebab_case_query);

        let mut ctx = Self::with_registry(config, registry).with_rest(rest);
        let config = Arc::clone(&ctx.config);

        if let Some(endpoint) = &config.graphql_endpoint {
            ctx = ctx.with_graphql(HttpGraphqlTransport::new(endpoint.as_str(), timeout)?);
        }
        if let Some(url) = &config.schema_url {
            ctx = ctx.with_schema(IntrospectionSchemaProvider::new(
                DEFAULT_PROVIDER,
                url.as_str(),
                timeout,
            )?);
        }

        for (name, provider) in &config.providers {
            let mut handles = ProviderHandles::default();
            if let Some(endpoint) = &provider.endpoint {
                handles.graphql = Some(Arc::new(HttpGraphqlTransport::new(
                    endpoint.as_str(),
                    timeout,
                )?));
            }
            if let Some(url) = &provider.schema_url {
                handles.schema = Some(Arc::new(IntrospectionSchemaProvider::new(
                    name.as_str(),
                    url.as_str(),
                    timeout,
                )?));
            }
            debug!(provider = %name, "registered graphql provider");
            ctx.providers.insert(name.clone(), handles);
        }

        info!(
            mode = ?config.mode,
            providers = config.providers.len(),
            "modelkit context ready"
        );
        Ok(ctx)
    }

    pub fn with_rest(mut self, transport: impl RestTransport + 'static) -> Self {
        self.rest = Some(Arc::new(transport));
        self
    }

    pub fn with_graphql(mut self, transport: impl GraphqlTransport + 'static) -> Self {
        self.graphql = Some(Arc::new(transport));
        self
    }

    pub fn with_schema(mut self, schema: impl SchemaProvider + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Registers a named provider.
    pub fn with_provider(mut self, name: impl Into<String>, handles: ProviderHandles) -> Self {
        self.providers.insert(name.into(), handles);
        self
    }

    /// A copy of this context talking to the named provider instead of the
    /// default one. `"default"` returns an unchanged copy.
    pub fn for_provider(&self, name: &str) -> ModelResult<Self> {
        if name == DEFAULT_PROVIDER {
            return Ok(self.clone());
        }
        let handles = self
            .providers
            .get(name)
            .ok_or_else(|| ModelError::Config(format!("unknown provider: {name}")))?;

        let mut ctx = self.clone();
        ctx.graphql = handles.graphql.clone();
        ctx.schema = handles.schema.clone();
        Ok(ctx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_graphql(&self) -> bool {
        self.config.is_graphql()
    }

    pub fn rest(&self) -> ModelResult<&Arc<dyn RestTransport>> {
        self.rest
            .as_ref()
            .ok_or_else(|| ModelError::Config("no REST transport configured".to_string()))
    }

    pub fn graphql(&self) -> ModelResult<&Arc<dyn GraphqlTransport>> {
        self.graphql
            .as_ref()
            .ok_or_else(|| ModelError::Config("no GraphQL transport configured".to_string()))
    }

    pub fn schema(&self) -> ModelResult<&Arc<dyn SchemaProvider>> {
        self.schema
            .as_ref()
            .ok_or_else(|| ModelError::Config("no schema provider configured".to_string()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("rest", &self.rest.is_some())
            .field("graphql", &self.graphql.is_some())
            .field("schema", &self.schema.is_some())
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
