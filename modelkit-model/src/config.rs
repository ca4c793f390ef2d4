//! Library configuration.
//!
//! Configuration is usually read from a TOML file:
//!
//! ```toml
//! mode = "graphql"
//! debug = true
//! graphql_endpoint = "https://api.example.com/graphql"
//! schema_url = "https://api.example.com/graphql"
//!
//! [providers.billing]
//! endpoint = "https://billing.example.com/graphql"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Registry key the active configuration is published under.
pub const CONFIG_KEY: &str = "Config";

/// Which backend style models and repositories talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Rest,
    Graphql,
}

/// A named GraphQL backend besides the default one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// GraphQL endpoint of this provider.
    pub endpoint: Option<String>,
    /// Where to fetch this provider's introspection schema.
    pub schema_url: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: ApiMode,
    /// Enables verbose logging of registry misses and requests.
    pub debug: bool,
    /// Base URL relative REST targets are joined onto.
    pub base_url: Option<String>,
    /// Endpoint of the default GraphQL provider.
    pub graphql_endpoint: Option<String>,
    /// Introspection endpoint of the default GraphQL provider.
    pub schema_url: Option<String>,
    /// Rewrite camel-case query-string keys to kebab case.
    pub kebab_case_query: bool,
    /// Per-request timeout of the HTTP transports, in seconds.
    pub timeout_secs: u64,
    /// Additional GraphQL providers by name.
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ApiMode::Rest,
            debug: false,
            base_url: None,
            graphql_endpoint: None,
            schema_url: None,
            kebab_case_query: true,
            timeout_secs: 30,
            providers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// REST configuration rooted at `base_url`.
    pub fn rest(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// GraphQL configuration posting to `endpoint`.
    pub fn graphql(endpoint: impl Into<String>) -> Self {
        Self {
            mode: ApiMode::Graphql,
            graphql_endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn is_graphql(&self) -> bool {
        self.mode == ApiMode::Graphql
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> ModelResult<Self> {
        toml::from_str(contents).map_err(|e| ModelError::Config(format!("invalid config: {e}")))
    }

    /// Reads and parses a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModelError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), mode = ?config.mode, "loaded config");
        Ok(config)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
