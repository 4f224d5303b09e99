//! Typed per-call attribute store.
//!
//! [`Attributes`] lets interceptors pass ad-hoc typed data (timers, computed
//! values, decoded principals) to each other without widening the call's
//! static shape. Keys carry both a name and a type tag, so two keys with the
//! same name but different value types never collide.
//!
//! # Example
//!
//! ```
//! use conveyor_core::{AttributeKey, Attributes};
//! use std::time::Instant;
//!
//! static STARTED: AttributeKey<Instant> = AttributeKey::new("started");
//!
//! let mut attributes = Attributes::new();
//! attributes.put(&STARTED, Instant::now());
//! assert!(attributes.contains(&STARTED));
//!
//! let started = attributes.take(&STARTED).unwrap();
//! assert!(started.elapsed().as_secs() < 60);
//! assert!(attributes.get_or_none(&STARTED).is_none());
//! ```

use crate::error::{PipelineError, PipelineResult};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed key into [`Attributes`].
///
/// Keys are usually declared as `static` items next to the plugin that owns
/// them.
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Creates a new key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

type Slot = (&'static str, TypeId);

/// Typed key/value map owned by a single call.
///
/// The store is accessed through `&`/`&mut` by the one traversal that owns
/// the call, so it needs no locking.
#[derive(Default)]
pub struct Attributes {
    values: HashMap<Slot, Box<dyn Any + Send + Sync>>,
}

impl Attributes {
    /// Creates an empty attribute store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot<T: 'static>(key: &AttributeKey<T>) -> Slot {
        (key.name, TypeId::of::<T>())
    }

    /// Stores a value, replacing any previous value under the same key.
    pub fn put<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>, value: T) {
        self.values.insert(Self::slot(key), Box::new(value));
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AttributeNotFound`] if the key is absent.
    pub fn get<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> PipelineResult<&T> {
        self.get_or_none(key)
            .ok_or_else(|| PipelineError::attribute_not_found(key.name))
    }

    /// Returns the value for `key`, or `None` if absent.
    #[must_use]
    pub fn get_or_none<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<&T> {
        self.values
            .get(&Self::slot(key))
            .and_then(|v| v.downcast_ref())
    }

    /// Returns a mutable reference to the value for `key`, or `None` if absent.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> Option<&mut T> {
        self.values
            .get_mut(&Self::slot(key))
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AttributeNotFound`] if the key is absent.
    pub fn take<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> PipelineResult<T> {
        self.take_or_none(key)
            .ok_or_else(|| PipelineError::attribute_not_found(key.name))
    }

    /// Removes and returns the value for `key`, or `None` if absent.
    pub fn take_or_none<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> Option<T> {
        self.values
            .remove(&Self::slot(key))
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Removes the value for `key`, returning whether it was present.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> bool {
        self.values.remove(&Self::slot(key)).is_some()
    }

    /// Returns the value for `key`, inserting the result of `init` first if
    /// the key is absent.
    pub fn compute_if_absent<T, F>(&mut self, key: &AttributeKey<T>, init: F) -> PipelineResult<&mut T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.values
            .entry(Self::slot(key))
            .or_insert_with(|| Box::new(init()) as Box<dyn Any + Send + Sync>)
            .downcast_mut()
            .ok_or_else(|| PipelineError::attribute_not_found(key.name))
    }

    /// Checks whether a value is stored under `key`.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> bool {
        self.values.contains_key(&Self::slot(key))
    }

    /// Returns the names of all stored keys, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.values.keys().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("keys", &self.names())
            .finish()
    }
}
