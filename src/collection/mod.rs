//! Strategy indexes.
//!
//! A [`StrategyCollection`] holds every strategy exported as one type; a
//! [`StrategyCollectionContainer`] maps exported types and names to their
//! collections. [`Registration`] is the block handed to
//! [`Container::configure`](crate::Container::configure).

mod container;
mod registration;

pub use container::{StrategyCollectionContainer, StrategyInspector};
pub use registration::Registration;

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::key::{LocateKey, TypeKey};
use crate::persistent::AtomicMap;
use crate::strategy::Strategy;

struct Ordered<S> {
    strategies: Arc<[Arc<S>]>,
    primary: Option<Arc<S>>,
}

impl<S: Strategy> Ordered<S> {
    fn from_strategies(strategies: Vec<Arc<S>>) -> Self {
        let primary = if strategies.iter().any(|strategy| strategy.has_conditions()) {
            None
        } else {
            strategies.first().cloned()
        };
        Self {
            strategies: strategies.into(),
            primary,
        }
    }
}

/// Every strategy exported as one type.
///
/// Unkeyed strategies are kept in a stable order: priority descending, then
/// registration order. When none of them has conditions the first is cached
/// as the primary strategy, so the common unfiltered request is O(1).
/// Keyed strategies live in a separate key index.
pub struct StrategyCollection<S> {
    export_type: TypeKey,
    ordered: ArcSwap<Ordered<S>>,
    keyed: AtomicMap<LocateKey, Arc<[Arc<S>]>>,
}

impl<S: Strategy> StrategyCollection<S> {
    pub fn new(export_type: TypeKey) -> Self {
        Self {
            export_type,
            ordered: ArcSwap::from_pointee(Ordered::from_strategies(Vec::new())),
            keyed: AtomicMap::new(),
        }
    }

    pub fn export_type(&self) -> &TypeKey {
        &self.export_type
    }

    /// Adds an unkeyed strategy, or a keyed one when `key` is set.
    pub fn add_strategy(&self, strategy: Arc<S>, key: Option<LocateKey>) {
        match key {
            Some(key) => {
                let single: Arc<[Arc<S>]> = Arc::from(vec![strategy]);
                self.keyed.thread_safe_insert(key, single, |existing, new| {
                    existing.iter().chain(new.iter()).cloned().collect::<Vec<_>>().into()
                });
            }
            None => {
                self.ordered.rcu(|current| {
                    let mut strategies = current.strategies.to_vec();
                    let position = strategies
                        .iter()
                        .position(|existing| existing.priority() < strategy.priority())
                        .unwrap_or(strategies.len());
                    strategies.insert(position, strategy.clone());
                    Ordered::from_strategies(strategies)
                });
            }
        }
    }

    /// The cached primary strategy; `None` when empty or when any strategy
    /// has conditions.
    pub fn primary(&self) -> Option<Arc<S>> {
        self.ordered.load().primary.clone()
    }

    /// Unkeyed strategies in selection order.
    pub fn strategies(&self) -> Arc<[Arc<S>]> {
        self.ordered.load().strategies.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.load().strategies.is_empty() && self.keyed.is_empty()
    }

    /// The strategy for `key`: the most recent exact match, else the most
    /// recent wildcard ([`LocateKey::Any`]) export.
    pub fn keyed_strategy(&self, key: &LocateKey) -> Option<Arc<S>> {
        self.keyed
            .get(key)
            .and_then(|exact| exact.last().cloned())
            .or_else(|| self.keyed.get(&LocateKey::Any).and_then(|any| any.last().cloned()))
    }

    /// Exact matches for `key` followed by wildcard exports.
    pub fn keyed_strategies(&self, key: &LocateKey) -> Vec<Arc<S>> {
        let mut strategies: Vec<Arc<S>> = self.keyed.get(key).map(|exact| exact.to_vec()).unwrap_or_default();
        if !key.is_any() {
            if let Some(any) = self.keyed.get(&LocateKey::Any) {
                strategies.extend(any.iter().cloned());
            }
        }
        strategies
    }

    /// Every keyed strategy with its key.
    pub fn all_keyed(&self) -> Vec<(LocateKey, Arc<S>)> {
        self.keyed
            .snapshot()
            .iter()
            .flat_map(|(key, strategies)| strategies.iter().map(move |s| (key.clone(), s.clone())))
            .collect()
    }
}

impl<S> Clone for StrategyCollection<S> {
    /// A copy sharing every strategy and the persistent key index; later
    /// additions to either copy are invisible to the other.
    fn clone(&self) -> Self {
        let ordered = self.ordered.load_full();
        Self {
            export_type: self.export_type.clone(),
            ordered: ArcSwap::new(ordered),
            keyed: AtomicMap::from_map((*self.keyed.snapshot()).clone()),
        }
    }
}

impl<S> fmt::Debug for StrategyCollection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ordered = self.ordered.load();
        f.debug_struct("StrategyCollection")
            .field("export_type", &self.export_type)
            .field("strategies", &ordered.strategies.len())
            .field("has_primary", &ordered.primary.is_some())
            .field("keys", &self.keyed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ActivationStrategy, WhenTargetNamed};

    fn strategy(priority: i32) -> Arc<ActivationStrategy> {
        Arc::new(
            ActivationStrategy::build::<u32>()
                .instance(priority as u32)
                .priority(priority)
                .finish(),
        )
    }

    #[test]
    fn orders_by_priority_then_registration() {
        let collection = StrategyCollection::new(TypeKey::of::<u32>());
        let low = strategy(0);
        let high = strategy(5);
        let low_again = strategy(0);
        collection.add_strategy(low.clone(), None);
        collection.add_strategy(high.clone(), None);
        collection.add_strategy(low_again.clone(), None);

        let ids: Vec<u64> = collection.strategies().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![high.id(), low.id(), low_again.id()]);
        assert_eq!(collection.primary().unwrap().id(), high.id());
    }

    #[test]
    fn conditions_clear_the_primary() {
        let collection = StrategyCollection::new(TypeKey::of::<u32>());
        collection.add_strategy(strategy(0), None);
        assert!(collection.primary().is_some());

        let conditioned = ActivationStrategy::build::<u32>()
            .instance(1)
            .when(WhenTargetNamed::new("port"))
            .finish();
        collection.add_strategy(Arc::new(conditioned), None);

        assert!(collection.primary().is_none());
        assert_eq!(collection.strategies().len(), 2);
    }

    #[test]
    fn exact_key_wins_over_wildcard() {
        let collection = StrategyCollection::new(TypeKey::of::<u32>());
        let wildcard = strategy(0);
        let exact = strategy(0);
        collection.add_strategy(wildcard.clone(), Some(LocateKey::Any));
        collection.add_strategy(exact.clone(), Some("primary".into()));

        assert_eq!(collection.keyed_strategy(&"primary".into()).unwrap().id(), exact.id());
        assert_eq!(collection.keyed_strategy(&"other".into()).unwrap().id(), wildcard.id());
        assert_eq!(collection.keyed_strategies(&"primary".into()).len(), 2);
    }

    #[test]
    fn clones_diverge() {
        let original = StrategyCollection::new(TypeKey::of::<u32>());
        original.add_strategy(strategy(0), None);
        let copy = original.clone();
        copy.add_strategy(strategy(1), None);
        copy.add_strategy(strategy(1), Some(LocateKey::Number(1)));

        assert_eq!(original.strategies().len(), 1);
        assert_eq!(copy.strategies().len(), 2);
        assert!(original.keyed_strategy(&LocateKey::Number(1)).is_none());
    }
}
