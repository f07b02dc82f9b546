use std::borrow::Borrow;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use super::PersistentMap;

/// A [`PersistentMap`] published through an atomic root.
///
/// Reads load the current version without locking. Writes build a new
/// version off the loaded root and install it with compare-and-swap,
/// retrying against the fresh root when another writer won the race.
pub struct AtomicMap<K, V> {
    root: ArcSwap<PersistentMap<K, V>>,
}

impl<K, V> AtomicMap<K, V> {
    pub fn new() -> Self {
        Self::from_map(PersistentMap::new())
    }

    pub fn from_map(map: PersistentMap<K, V>) -> Self {
        Self {
            root: ArcSwap::from_pointee(map),
        }
    }

    /// The current version. Later writes do not affect the returned map.
    pub fn snapshot(&self) -> Arc<PersistentMap<K, V>> {
        self.root.load_full()
    }

    pub fn len(&self) -> usize {
        self.root.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.load().is_empty()
    }

    /// Replaces the whole map.
    pub fn store(&self, map: PersistentMap<K, V>) {
        self.root.store(Arc::new(map));
    }

    pub fn clear(&self) {
        self.store(PersistentMap::new());
    }
}

impl<K: Ord, V: Clone> AtomicMap<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.root.load().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.root.load().contains_key(key)
    }
}

impl<K: Ord + Clone, V: Clone> AtomicMap<K, V> {
    /// Inserts `key`, letting `resolver(existing, new)` decide duplicates.
    /// Returns the value stored for `key` in the version this call installed.
    pub fn thread_safe_insert<F>(&self, key: K, value: V, resolver: F) -> V
    where
        F: Fn(&V, V) -> V,
    {
        let mut current = self.root.load_full();
        loop {
            let updated = Arc::new(current.insert_with(key.clone(), value.clone(), &resolver));
            let stored = updated.get(&key).cloned();
            let previous = self.root.compare_and_swap(&current, updated);
            if Arc::ptr_eq(&*previous, &current) {
                // The freshly built map always contains the key.
                return stored.unwrap_or(value);
            }
            current = Guard::into_inner(previous);
        }
    }

    /// Inserts or replaces `key`.
    pub fn insert(&self, key: K, value: V) {
        self.thread_safe_insert(key, value, |_, new| new);
    }

    /// Returns the existing value for `key`, or installs `create()`.
    ///
    /// Under contention `create` may run on several threads, but exactly one
    /// value is retained and every caller gets that one back.
    pub fn get_or_insert_with<F>(&self, key: K, create: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        self.thread_safe_insert(key, create(), |existing, _| existing.clone())
    }
}

impl<K, V> Default for AtomicMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
