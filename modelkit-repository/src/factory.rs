//! How raw items become models.

use modelkit_model::{Context, Model, ModelProps, ModelResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Turns one raw item into props.
pub type Hydrator<P> = fn(Value) -> ModelResult<P>;

/// Picks a [`Hydrator`] by looking at the raw item.
pub type Selector<P> = Arc<dyn Fn(&Value) -> Hydrator<P> + Send + Sync>;

/// Hydration strategy of a repository.
pub enum ModelFactory<P: ModelProps> {
    /// Deserialize every item straight into `P`.
    Fixed,
    /// Let a selector choose how each item is built, e.g. by `__typename`
    /// when `P` is an enum of variants.
    Selector(Selector<P>),
}

impl<P: ModelProps> ModelFactory<P> {
    pub fn selector<F>(select: F) -> Self
    where
        F: Fn(&Value) -> Hydrator<P> + Send + Sync + 'static,
    {
        Self::Selector(Arc::new(select))
    }

    /// Hydrates one item.
    pub fn build(&self, context: &Context, data: Value) -> ModelResult<Model<P>> {
        match self {
            Self::Fixed => Model::hydrate(context.clone(), data),
            Self::Selector(select) => {
                let hydrator = select(&data);
                Model::hydrate_with(context.clone(), data, hydrator)
            }
        }
    }
}

impl<P: ModelProps> Default for ModelFactory<P> {
    fn default() -> Self {
        Self::Fixed
    }
}

impl<P: ModelProps> Clone for ModelFactory<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed => Self::Fixed,
            Self::Selector(select) => Self::Selector(Arc::clone(select)),
        }
    }
}

impl<P: ModelProps> fmt::Debug for ModelFactory<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("Fixed"),
            Self::Selector(_) => f.write_str("Selector(..)"),
        }
    }
}
