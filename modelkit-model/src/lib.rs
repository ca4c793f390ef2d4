//! Models, collections and the context they run in.
//!
//! - [`Config`] and [`Context`]: what a model talks to and how
//! - [`Model`] and [`ModelProps`]: typed properties with backend operations
//! - [`Collection`]: the ordered container repositories fill
//! - [`ModelError`]: the error taxonomy shared with repositories

pub mod collection;
pub mod config;
pub mod context;
pub mod error;
pub mod model;

pub use collection::Collection;
pub use config::{ApiMode, Config, ProviderConfig, CONFIG_KEY};
pub use context::{Context, ProviderHandles, DEFAULT_PROVIDER};
pub use error::{classify, ModelError, ModelResult};
pub use model::{Model, ModelProps, ID_KEY, TYPENAME_KEY, UUID_KEY};
