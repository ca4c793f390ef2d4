//! Ordered container of models or plain values.

use modelkit_types::{is_truthy, Params};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::ops::Index;

/// An owned, ordered list with the handful of operations models and
/// repositories need.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn all(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn map<U, F>(&self, f: F) -> Collection<U>
    where
        F: FnMut(&T) -> U,
    {
        self.items.iter().map(f).collect()
    }

    /// Keeps the items matching `predicate`.
    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.items.into_iter().filter(|item| predicate(item)).collect()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// First item matching `predicate`.
    pub fn first_where<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Whether any item matches `predicate`.
    pub fn some<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().any(predicate)
    }
}

impl Collection<Value> {
    /// Wraps raw values, dropping falsy ones when `skip_empty` is set.
    pub fn from_values(values: Vec<Value>, skip_empty: bool) -> Self {
        values
            .into_iter()
            .filter(|value| !skip_empty || is_truthy(value))
            .collect()
    }
}

impl Collection<Params> {
    /// Projects every map onto `keys`, keeping each map's own key order.
    pub fn only(&self, keys: &[&str]) -> Self {
        self.map(|params| {
            params
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
