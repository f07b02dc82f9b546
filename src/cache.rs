//! Lock-free cache of compiled activation delegates.
//!
//! The cache is an array of [`AtomicMap`] shards indexed by the hash of the
//! requested type. Keyed delegates live in a second shard array that is
//! only allocated on the first keyed request. Invalidation swaps in a new
//! [`CacheGeneration`]; a compile that started against the old generation
//! stores into the old generation and never pollutes the new one.

use std::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;

use crate::compiler::ActivationDelegate;
use crate::key::{LocateKey, TypeKey};
use crate::persistent::AtomicMap;

type Shards<K> = Box<[AtomicMap<K, ActivationDelegate>]>;

fn shards<K>(count: usize) -> Shards<K> {
    (0..count).map(|_| AtomicMap::new()).collect()
}

/// One generation of cached delegates.
pub(crate) struct CacheGeneration {
    hasher: RandomState,
    mask: usize,
    unkeyed: Shards<TypeKey>,
    keyed: OnceCell<Shards<(TypeKey, LocateKey)>>,
}

impl CacheGeneration {
    fn new(shard_count: usize) -> Self {
        debug_assert!(shard_count.is_power_of_two());
        Self {
            hasher: RandomState::new(),
            mask: shard_count - 1,
            unkeyed: shards(shard_count),
            keyed: OnceCell::new(),
        }
    }

    #[inline]
    fn shard_index(&self, type_key: &TypeKey) -> usize {
        BuildHasher::hash_one(&self.hasher, type_key) as usize & self.mask
    }

    fn get(&self, type_key: &TypeKey) -> Option<ActivationDelegate> {
        self.unkeyed[self.shard_index(type_key)].get(type_key)
    }

    fn get_keyed(&self, type_key: &TypeKey, key: &LocateKey) -> Option<ActivationDelegate> {
        let keyed = self.keyed.get()?;
        keyed[self.shard_index(type_key)].get(&(type_key.clone(), key.clone()))
    }

    /// Stores `delegate` unless another thread got there first. Returns the
    /// delegate retained in the slot.
    pub(crate) fn add(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        delegate: ActivationDelegate,
    ) -> ActivationDelegate {
        let index = self.shard_index(type_key);
        match key {
            None => self.unkeyed[index].get_or_insert_with(type_key.clone(), || delegate),
            Some(key) => {
                let keyed = self.keyed.get_or_init(|| shards(self.mask + 1));
                keyed[index].get_or_insert_with((type_key.clone(), key.clone()), || delegate)
            }
        }
    }

    fn len(&self) -> usize {
        let unkeyed: usize = self.unkeyed.iter().map(AtomicMap::len).sum();
        let keyed: usize = self
            .keyed
            .get()
            .map(|keyed| keyed.iter().map(AtomicMap::len).sum())
            .unwrap_or(0);
        unkeyed + keyed
    }
}

/// Counters describing cache effectiveness since the container was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    /// Delegates compiled on a miss, including ones discarded because a
    /// concurrent compile was retained first.
    pub compiled: u64,
    /// Delegates currently cached.
    pub entries: usize,
    /// Times the cache was cleared.
    pub generations: u64,
}

impl CacheStatistics {
    /// Fraction of lookups answered from the cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Sharded delegate cache owned by one injection scope.
pub(crate) struct DelegateCache {
    shard_count: usize,
    generation: ArcSwap<CacheGeneration>,
    hits: AtomicU64,
    misses: AtomicU64,
    compiled: AtomicU64,
    cleared: AtomicU64,
}

impl DelegateCache {
    pub(crate) fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1).next_power_of_two();
        Self {
            shard_count,
            generation: ArcSwap::from_pointee(CacheGeneration::new(shard_count)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compiled: AtomicU64::new(0),
            cleared: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, type_key: &TypeKey) -> Option<ActivationDelegate> {
        self.record(self.generation.load().get(type_key))
    }

    pub(crate) fn get_keyed(&self, type_key: &TypeKey, key: &LocateKey) -> Option<ActivationDelegate> {
        self.record(self.generation.load().get_keyed(type_key, key))
    }

    #[inline]
    fn record(&self, found: Option<ActivationDelegate>) -> Option<ActivationDelegate> {
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// The generation to store a compile into. Capture it before compiling.
    pub(crate) fn generation(&self) -> Arc<CacheGeneration> {
        self.generation.load_full()
    }

    pub(crate) fn record_compile(&self) {
        self.compiled.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops every cached delegate.
    pub(crate) fn clear(&self) {
        self.generation.store(Arc::new(CacheGeneration::new(self.shard_count)));
        self.cleared.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(shards = self.shard_count, "cleared delegate cache");
    }

    pub(crate) fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiled: self.compiled.load(Ordering::Relaxed),
            entries: self.generation.load().len(),
            generations: self.cleared.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for DelegateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateCache")
            .field("shards", &self.shard_count)
            .field("statistics", &self.statistics())
            .finish()
    }
}
