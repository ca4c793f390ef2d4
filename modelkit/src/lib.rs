//! modelkit: typed models and repositories over REST and GraphQL backends.
//!
//! This crate re-exports the workspace crates under one roof:
//!
//! - [`events`]: per-instance lifecycle event emitter
//! - [`registry`]: process-wide key/value registry
//! - [`transport`]: URL templates, REST and GraphQL transports, schemas
//! - [`model`]: configuration, context, errors, collections and models
//! - [`repository`]: repositories, response shaping and subscriptions
//!
//! ```ignore
//! use modelkit::prelude::*;
//!
//! let config = Config::load_from("modelkit.toml")?;
//! modelkit::init_tracing(config.debug);
//! let ctx = Context::from_config(config)?;
//!
//! let mut users = Repository::<User>::builder(ctx).fetch_many("/users").build()?;
//! for user in users.many(None).await? {
//!     println!("{}", user.name);
//! }
//! ```

pub use modelkit_events as events;
pub use modelkit_model as model;
pub use modelkit_registry as registry;
pub use modelkit_repository as repository;
pub use modelkit_transport as transport;
pub use modelkit_types as types;

pub use modelkit_events::{EventEmitter, SubscribeOptions};
pub use modelkit_model::{
    classify, ApiMode, Collection, Config, Context, Model, ModelError, ModelProps, ModelResult,
    ProviderConfig,
};
pub use modelkit_registry::{Registry, RegistryError};
pub use modelkit_repository::{
    ModelFactory, QueryOutput, Repository, RepositoryBuilder, ResponseShape, SubscriptionFeed,
};
pub use modelkit_transport::{GraphqlDocument, Operation, RequestDescriptor, Target, TransportError};
pub use modelkit_types::{event_names, Event, HttpMethod, Params};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Items most applications need.
pub mod prelude {
    pub use crate::{
        Collection, Config, Context, GraphqlDocument, HttpMethod, Model, ModelError,
        ModelFactory, ModelProps, ModelResult, Params, Repository, ResponseShape,
        SubscribeOptions, Target,
    };
}

/// Installs a compact `tracing` subscriber for the library's logs.
///
/// `RUST_LOG` wins when set. Otherwise `debug` selects the `debug` level
/// and anything else `info`. Returns `false` when a global subscriber was
/// already installed.
pub fn init_tracing(debug: bool) -> bool {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
