//! Repositories of modelkit models.
//!
//! ```ignore
//! let mut users = Repository::<User>::builder(ctx)
//!     .fetch_many("/users")
//!     .fetch_one("/users/:id")
//!     .build()?;
//!
//! users.many(None).await?;
//! let ann = users.one(1).await?;
//! ```

pub mod factory;
pub mod repository;
pub mod shape;
pub mod subscription;

pub use factory::{Hydrator, ModelFactory, Selector};
pub use repository::{MethodHook, Repository, RepositoryBuilder};
pub use shape::{extract_connection, Connection, PageInfo, QueryOutput, ResponseShape};
pub use subscription::{handler_name, SubscriptionDescriptor, SubscriptionFeed, SubscriptionHandler};
