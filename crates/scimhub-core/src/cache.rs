//! In-memory entity cache.
//!
//! Feeds and subscribers live in an [`EntityCache`]: a concurrent map from a
//! stable identifier to a per-entity mutex. Handles are cloned out of the map
//! before locking, so a map shard is never held while waiting on an entity.
//! Lock order is always entity first, then map shard.
//!
//! Removing an entity retires its handle. A caller that cloned the handle
//! before the removal notices after locking that the handle is no longer
//! current and resolves the identifier again.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::feed::Feed;
use crate::subscription::Subscriber;

/// Shared handle to one cached entity.
pub type Handle<T> = Arc<Mutex<T>>;

/// Exclusive access to one cached entity.
pub type Guard<T> = ArcMutexGuard<RawMutex, T>;

/// Cache of feeds keyed by feed URI.
pub type FeedCache = EntityCache<Feed>;

/// Cache of subscribers keyed by identifier.
pub type SubscriberCache = EntityCache<Subscriber>;

/// Concurrent map of identifier to lockable entity.
pub struct EntityCache<T> {
    entries: DashMap<String, Handle<T>>,
}

impl<T> EntityCache<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the handle for a key.
    pub fn get(&self, key: &str) -> Option<Handle<T>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Get the handle for a key, creating the entity if absent.
    ///
    /// Returns the handle and whether it was created by this call.
    pub fn get_or_insert_with(&self, key: &str, create: impl FnOnce() -> T) -> (Handle<T>, bool) {
        if let Some(handle) = self.get(key) {
            return (handle, false);
        }
        let mut created = false;
        let handle = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(create()))
            })
            .value()
            .clone();
        (handle, created)
    }

    /// Load an entity into an absent key. Existing entries win.
    ///
    /// `load` runs while the key's map shard is held, so the key cannot be
    /// inserted or removed concurrently; a `None` from `load` leaves the key
    /// absent. Returns true if the entity was inserted.
    pub fn try_insert_missing<E>(
        &self,
        key: &str,
        load: impl FnOnce() -> Result<Option<T>, E>,
    ) -> Result<bool, E> {
        if self.entries.contains_key(key) {
            return Ok(false);
        }
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => match load()? {
                Some(value) => {
                    vacant.insert(Arc::new(Mutex::new(value)));
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Lock the entity for a key.
    ///
    /// Returns `None` if the key is absent.
    pub fn lock(&self, key: &str) -> Option<Guard<T>> {
        loop {
            let handle = self.get(key)?;
            let guard = handle.lock_arc();
            if self.is_current(key, &handle) {
                return Some(guard);
            }
        }
    }

    /// Lock the entity for a key, creating it if absent.
    ///
    /// Retries when the locked handle was retired concurrently. Returns the
    /// guard and whether the entity was created by this call.
    pub fn lock_or_insert_with(&self, key: &str, create: impl Fn() -> T) -> (Guard<T>, bool) {
        loop {
            let (handle, created) = self.get_or_insert_with(key, &create);
            let guard = handle.lock_arc();
            if self.is_current(key, &handle) {
                return (guard, created);
            }
        }
    }

    /// Whether `handle` is still the cached entity for `key`.
    pub fn is_current(&self, key: &str, handle: &Handle<T>) -> bool {
        self.entries
            .get(key)
            .map(|entry| Arc::ptr_eq(entry.value(), handle))
            .unwrap_or(false)
    }

    /// Remove an entity. Call while holding its lock so no one else sees it retired half-way.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All cached identifiers.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
