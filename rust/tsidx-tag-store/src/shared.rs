//! A [`TagStore`] guarded by a single reader/writer lock.
//!
//! Use this when a store must accept inserts while queries are running.
//! Every `put` takes the write lock; `get_cloned` and `read` take the read
//! lock. No I/O happens while a lock is held.

use std::sync::{Arc, RwLock};

use roaring::RoaringBitmap;
use tsidx_common::{Result, error::Error};
use tsidx_presence::{PresenceIndex, RoaringPresence};

use crate::TagStore;

/// Cloneable handle to a lock-guarded [`TagStore`].
pub struct SharedTagStore<V = RoaringBitmap, P = RoaringPresence> {
    inner: Arc<RwLock<TagStore<V, P>>>,
}

impl<V> SharedTagStore<V, RoaringPresence> {
    pub fn new() -> Self {
        SharedTagStore::from_store(TagStore::new())
    }
}

impl<V, P: PresenceIndex> SharedTagStore<V, P> {
    pub fn from_store(store: TagStore<V, P>) -> Self {
        SharedTagStore {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Inserts under the write lock. See [`TagStore::put`].
    pub fn put(&self, key: u32, value: V) -> bool {
        self.inner.write().unwrap().put(key, value)
    }

    /// Returns a clone of the value stored for `key`.
    ///
    /// Store `Arc`-wrapped posting lists to keep the clone cheap.
    pub fn get_cloned(&self, key: u32) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().unwrap().get(key).cloned()
    }

    /// Runs `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&TagStore<V, P>) -> R) -> R {
        f(&self.inner.read().unwrap())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Takes the store back out once this is the only handle left.
    pub fn into_inner(self) -> Result<TagStore<V, P>> {
        let lock = Arc::try_unwrap(self.inner)
            .map_err(|_| Error::invalid_operation("into_inner on a shared tag store"))?;
        Ok(lock.into_inner().unwrap())
    }
}

impl<V, P> Clone for SharedTagStore<V, P> {
    fn clone(&self) -> Self {
        SharedTagStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, P: Default> Default for SharedTagStore<V, P> {
    fn default() -> Self {
        SharedTagStore {
            inner: Arc::new(RwLock::new(TagStore::default())),
        }
    }
}

impl<V, P: PresenceIndex> std::fmt::Debug for SharedTagStore<V, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTagStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
