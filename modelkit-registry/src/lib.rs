//! Shared key/value registry.
//!
//! The registry holds the values that outlive individual models and
//! repositories: the active configuration, transport clients, schema
//! providers. Values are stored type-erased behind `Arc` and recovered with
//! a typed lookup.
//!
//! One process-wide instance is reachable through [`Registry::global`].
//! Independent instances can be created with [`Registry::new`] and passed
//! around explicitly, which is what tests and multi-tenant callers do.

mod error;

pub use error::{RegistryError, RegistryResult};

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// A type-erased registry value.
pub type Entry = Arc<dyn Any + Send + Sync>;

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Wraps a value for [`Registry::set_many`].
pub fn entry<T: Any + Send + Sync>(key: impl Into<String>, value: T) -> (String, Entry) {
    (key.into(), Arc::new(value))
}

/// String-keyed store of shared values.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    /// Creates an empty, independent registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first access.
    pub fn global() -> Arc<Registry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    // A panic while holding the lock leaves the map itself intact, so the
    // poisoned guard is used as-is.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.set_entry(key, Arc::new(value));
    }

    /// Stores an already shared value under `key`.
    pub fn set_entry(&self, key: impl Into<String>, value: Entry) {
        let key = key.into();
        debug!(%key, "registry set");
        self.write().insert(key, value);
    }

    /// Applies several entries in order. Later entries win on duplicate keys.
    pub fn set_many<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Entry)>,
    {
        let mut map = self.write();
        for (key, value) in entries {
            map.insert(key, value);
        }
    }

    /// Typed lookup.
    ///
    /// Fails with [`RegistryError::NotFound`] when the key is absent and
    /// [`RegistryError::TypeMismatch`] when it holds another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> RegistryResult<Arc<T>> {
        let Some(value) = self.read().get(key).cloned() else {
            debug!(key, "registry miss");
            return Err(RegistryError::NotFound {
                key: key.to_string(),
            });
        };
        value
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Lenient lookup: `None` on a missing key or a type mismatch.
    pub fn try_get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.read()
            .get(key)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Untyped lookup of the shared entry.
    pub fn get_entry(&self, key: &str) -> Option<Entry> {
        self.read().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("keys", &self.keys()).finish()
    }
}
