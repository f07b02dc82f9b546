use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::StrategyCollection;
use crate::key::TypeKey;
use crate::persistent::{AtomicMap, PersistentMap};
use crate::strategy::Strategy;

/// Adjusts strategies as they are registered.
///
/// Inspectors see every strategy before it is indexed, including the ones
/// registered before the inspector was added.
pub trait StrategyInspector<S>: Send + Sync {
    fn inspect(&self, strategy: &mut S);
}

impl<S, F> StrategyInspector<S> for F
where
    F: Fn(&mut S) + Send + Sync,
{
    fn inspect(&self, strategy: &mut S) {
        self(strategy)
    }
}

/// Maps exported types and names to [`StrategyCollection`]s.
///
/// A strategy is indexed under each of its export types, keyed exports and
/// names; a strategy that declares none of those is indexed under its
/// activation type. Declared base types are indexed too when the container
/// exports as base types.
pub struct StrategyCollectionContainer<S> {
    export_as_base: bool,
    types: AtomicMap<TypeKey, Arc<StrategyCollection<S>>>,
    names: AtomicMap<Cow<'static, str>, Arc<StrategyCollection<S>>>,
    registered: ArcSwap<Vec<Arc<S>>>,
    inspectors: ArcSwap<Vec<Arc<dyn StrategyInspector<S>>>>,
}

impl<S: Strategy + Clone> StrategyCollectionContainer<S> {
    pub fn new(export_as_base: bool) -> Self {
        Self {
            export_as_base,
            types: AtomicMap::new(),
            names: AtomicMap::new(),
            registered: ArcSwap::from_pointee(Vec::new()),
            inspectors: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Inspects, stores and indexes a strategy. Returns the stored strategy.
    pub fn add_strategy(&self, mut strategy: S) -> Arc<S> {
        for inspector in self.inspectors.load().iter() {
            inspector.inspect(&mut strategy);
        }
        let strategy = Arc::new(strategy);
        self.registered.rcu(|registered| {
            let mut registered = Vec::clone(registered);
            registered.push(strategy.clone());
            registered
        });
        self.index(&strategy);
        strategy
    }

    fn index(&self, strategy: &Arc<S>) {
        let mut types = strategy.export_types();
        if self.export_as_base {
            types.extend(strategy.base_types());
        }
        let keyed = strategy.keyed_exports();
        let names = strategy.export_names();
        if types.is_empty() && keyed.is_empty() && names.is_empty() {
            types.push(strategy.activation_type().clone());
        }

        let mut seen: Vec<&TypeKey> = Vec::with_capacity(types.len());
        for export_type in &types {
            if seen.contains(&export_type) {
                continue;
            }
            seen.push(export_type);
            self.collection_for(export_type).add_strategy(strategy.clone(), None);
        }
        for (export_type, key) in keyed {
            self.collection_for(&export_type).add_strategy(strategy.clone(), Some(key));
        }
        for name in names {
            self.names
                .get_or_insert_with(name.clone(), || Arc::new(StrategyCollection::new(strategy.activation_type().clone())))
                .add_strategy(strategy.clone(), None);
        }
    }

    fn collection_for(&self, export_type: &TypeKey) -> Arc<StrategyCollection<S>> {
        self.types
            .get_or_insert_with(export_type.clone(), || Arc::new(StrategyCollection::new(export_type.clone())))
    }

    /// The collection for an exported type or open generic definition.
    pub fn collection(&self, export_type: &TypeKey) -> Option<Arc<StrategyCollection<S>>> {
        self.types.get(export_type)
    }

    pub fn collection_by_name(&self, name: &str) -> Option<Arc<StrategyCollection<S>>> {
        self.names.get(name)
    }

    /// Every registered strategy in registration order.
    pub fn strategies(&self) -> Arc<Vec<Arc<S>>> {
        self.registered.load_full()
    }

    /// Exported types with at least one strategy.
    pub fn export_types(&self) -> Vec<TypeKey> {
        self.types.snapshot().keys().cloned().collect()
    }

    /// Adds an inspector and replays it over every registered strategy.
    ///
    /// The indexes are rebuilt from scratch in registration order and
    /// published once complete. Callers serialize registration, so no
    /// strategy is added while the rebuild runs.
    pub fn add_inspector(&self, inspector: Arc<dyn StrategyInspector<S>>) {
        self.inspectors.rcu(|inspectors| {
            let mut inspectors = Vec::clone(inspectors);
            inspectors.push(inspector.clone());
            inspectors
        });

        let rebuilt = Self::new(self.export_as_base);
        for existing in self.registered.load().iter() {
            let mut strategy = S::clone(existing);
            inspector.inspect(&mut strategy);
            let strategy = Arc::new(strategy);
            rebuilt.registered.rcu(|registered| {
                let mut registered = Vec::clone(registered);
                registered.push(strategy.clone());
                registered
            });
            rebuilt.index(&strategy);
        }

        self.types.store(PersistentMap::clone(&rebuilt.types.snapshot()));
        self.names.store(PersistentMap::clone(&rebuilt.names.snapshot()));
        self.registered.store(rebuilt.registered.load_full());
        tracing::debug!(replayed = self.registered.load().len(), "replayed strategy inspector");
    }

    /// Disposes every registered strategy exactly once.
    pub fn dispose(&self) {
        self.dispose_where(|_| true);
    }

    /// Disposes the registered strategies accepted by `owned`.
    pub fn dispose_where<F>(&self, owned: F)
    where
        F: Fn(&S) -> bool,
    {
        for strategy in self.registered.load().iter().filter(|strategy| owned(strategy)) {
            strategy.dispose_strategy();
        }
    }
}

impl<S> Clone for StrategyCollectionContainer<S> {
    /// An independent container sharing every strategy with `self`.
    fn clone(&self) -> Self {
        let types = self
            .types
            .snapshot()
            .iter()
            .fold(PersistentMap::new(), |map, (key, collection)| {
                map.insert(key.clone(), Arc::new(StrategyCollection::clone(collection)))
            });
        let names = self
            .names
            .snapshot()
            .iter()
            .fold(PersistentMap::new(), |map, (name, collection)| {
                map.insert(name.clone(), Arc::new(StrategyCollection::clone(collection)))
            });
        Self {
            export_as_base: self.export_as_base,
            types: AtomicMap::from_map(types),
            names: AtomicMap::from_map(names),
            registered: ArcSwap::new(self.registered.load_full()),
            inspectors: ArcSwap::new(self.inspectors.load_full()),
        }
    }
}

impl<S> fmt::Debug for StrategyCollectionContainer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyCollectionContainer")
            .field("export_as_base", &self.export_as_base)
            .field("types", &self.types.len())
            .field("names", &self.names.len())
            .field("registered", &self.registered.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ActivationStrategy;

    trait Shape: Send + Sync {}
    struct Square;
    impl Shape for Square {}

    #[test]
    fn strategies_without_exports_use_activation_type() {
        let container = StrategyCollectionContainer::new(false);
        container.add_strategy(ActivationStrategy::build::<Square>().instance(Square).finish());

        assert!(container.collection(&TypeKey::of::<Square>()).is_some());
        assert!(container.collection(&TypeKey::of::<dyn Shape>()).is_none());
    }

    #[test]
    fn base_types_only_indexed_when_enabled() {
        let build = || {
            ActivationStrategy::build::<Square>()
                .instance(Square)
                .export_as_self()
                .base_type::<dyn Shape, _>(|s| s as Arc<dyn Shape>)
                .finish()
        };
        let plain = StrategyCollectionContainer::new(false);
        let with_base = StrategyCollectionContainer::new(true);
        plain.add_strategy(build());
        with_base.add_strategy(build());

        assert!(plain.collection(&TypeKey::of::<dyn Shape>()).is_none());
        assert!(with_base.collection(&TypeKey::of::<dyn Shape>()).is_some());
    }

    #[test]
    fn names_index_separately() {
        let container = StrategyCollectionContainer::new(false);
        container.add_strategy(ActivationStrategy::build::<Square>().instance(Square).export_name("square").finish());

        assert!(container.collection_by_name("square").is_some());
        assert!(container.collection(&TypeKey::of::<Square>()).is_none());
    }

    #[test]
    fn inspectors_replay_and_apply_later() {
        let container = StrategyCollectionContainer::new(false);
        container.add_strategy(ActivationStrategy::build::<Square>().instance(Square).finish());
        container.add_inspector(Arc::new(|s: &mut ActivationStrategy| s.set_priority(7)));
        container.add_strategy(ActivationStrategy::build::<Square>().instance(Square).finish());

        let strategies = container.collection(&TypeKey::of::<Square>()).unwrap().strategies();
        assert_eq!(strategies.len(), 2);
        assert!(strategies.iter().all(|s| s.priority() == 7));
    }

    #[test]
    fn dispose_visits_each_strategy_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DISPOSED: AtomicUsize = AtomicUsize::new(0);

        let container = StrategyCollectionContainer::new(false);
        container.add_strategy(
            ActivationStrategy::build::<Square>()
                .instance(Square)
                .export_as_self()
                .export_keyed("a")
                .export_name("square")
                .dispose_with(|_| {
                    DISPOSED.fetch_add(1, Ordering::SeqCst);
                })
                .finish(),
        );
        container.dispose();

        assert_eq!(DISPOSED.load(Ordering::SeqCst), 1);
    }
}
