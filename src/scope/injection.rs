use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cache::{CacheStatistics, DelegateCache};
use crate::collection::{Registration, StrategyCollectionContainer};
use crate::compiler::{
    ActivationCompiler, ActivationDelegate, MissingStrategyProvider, ProvidedStrategy, STRATEGY_ADD_LOCK,
};
use crate::config::{ContainerConfiguration, LateRegistration};
use crate::error::{DiError, DiResult};
use crate::key::{LocateKey, TypeKey};
use crate::observer::Observers;
use crate::strategy::{ActivationStrategy, DecoratorStrategy, Strategy, StrategyFilter};
use crate::wrappers::WrapperKind;

use super::locks::LockTable;
use super::LifetimeScope;

static NEXT_INJECTION_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Registrations and compiled delegates shared by a container and all of
/// its lifetime scopes.
///
/// Holds the export, wrapper and decorator containers, the missing-strategy
/// providers, the delegate cache and the registration lock. Child
/// containers get an independent copy of everything. Strategies copied
/// from the parent stay owned by the parent: their singletons live in the
/// parent's root scope and the child never disposes them.
pub struct InjectionScope {
    id: u64,
    configuration: ContainerConfiguration,
    exports: StrategyCollectionContainer<ActivationStrategy>,
    wrappers: StrategyCollectionContainer<ActivationStrategy>,
    decorators: StrategyCollectionContainer<DecoratorStrategy>,
    providers: ArcSwap<Vec<Arc<dyn MissingStrategyProvider>>>,
    observers: Observers,
    cache: DelegateCache,
    compiler: ActivationCompiler,
    locks: LockTable,
    resolved: AtomicBool,
    inherited: Arc<[u64]>,
    parent_root: Option<LifetimeScope>,
}

impl InjectionScope {
    pub(crate) fn new(configuration: ContainerConfiguration) -> Self {
        let scope = Self::empty(configuration);
        for kind in WrapperKind::ALL {
            scope.wrappers.add_strategy(ActivationStrategy::wrapper(kind));
        }
        scope
    }

    fn empty(configuration: ContainerConfiguration) -> Self {
        Self {
            id: NEXT_INJECTION_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            exports: StrategyCollectionContainer::new(configuration.export_as_base),
            wrappers: StrategyCollectionContainer::new(false),
            decorators: StrategyCollectionContainer::new(false),
            providers: ArcSwap::from_pointee(Vec::new()),
            observers: Observers::new(),
            cache: DelegateCache::new(configuration.shard_count()),
            compiler: ActivationCompiler::new(),
            locks: LockTable::new(),
            resolved: AtomicBool::new(false),
            inherited: Arc::from(Vec::<u64>::new()),
            parent_root: None,
            configuration,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn configuration(&self) -> &ContainerConfiguration {
        &self.configuration
    }

    pub fn exports(&self) -> &StrategyCollectionContainer<ActivationStrategy> {
        &self.exports
    }

    pub fn wrappers(&self) -> &StrategyCollectionContainer<ActivationStrategy> {
        &self.wrappers
    }

    pub fn decorators(&self) -> &StrategyCollectionContainer<DecoratorStrategy> {
        &self.decorators
    }

    pub fn compiler(&self) -> &ActivationCompiler {
        &self.compiler
    }

    pub(crate) fn providers(&self) -> Arc<Vec<Arc<dyn MissingStrategyProvider>>> {
        self.providers.load_full()
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    pub(crate) fn cache(&self) -> &DelegateCache {
        &self.cache
    }

    pub(crate) fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    /// True when strategy `id` was copied from the parent container.
    pub fn inherits(&self, id: u64) -> bool {
        self.inherited.binary_search(&id).is_ok()
    }

    /// Root scope of the parent container, for child containers.
    pub fn parent_root(&self) -> Option<&LifetimeScope> {
        self.parent_root.as_ref()
    }

    /// True once anything has been located through this scope.
    pub fn has_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// The delegate for a root request.
    pub fn delegate_for(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        allow_missing: bool,
    ) -> DiResult<Option<ActivationDelegate>> {
        if !self.resolved.load(Ordering::Relaxed) {
            self.resolved.store(true, Ordering::Release);
        }
        self.compiler
            .find_delegate(self, type_key, filter, key, allow_missing)
    }

    /// Adds everything in `registration`, serialized with other
    /// registrations and with missing-strategy providers.
    ///
    /// Inspectors are installed first so they see this block's strategies.
    /// After the first locate, the late registration policy decides whether
    /// the cache is dropped or the registration is refused.
    pub(crate) fn apply(&self, registration: Registration) -> DiResult<()> {
        let lock = self.locks.get(STRATEGY_ADD_LOCK);
        let _guard = lock.lock();

        let late = self.has_resolved();
        if late && self.configuration.late_registration == LateRegistration::Reject {
            return Err(DiError::ConfigurationLocked(
                "strategies cannot be added after the first locate",
            ));
        }

        let Registration {
            exports,
            wrappers,
            decorators,
            providers,
            inspectors,
            observers,
        } = registration;

        let counts = (exports.len(), wrappers.len(), decorators.len(), providers.len());
        for inspector in inspectors {
            self.exports.add_inspector(inspector);
        }
        for strategy in exports {
            self.exports.add_strategy(strategy);
        }
        for strategy in wrappers {
            self.wrappers.add_strategy(strategy);
        }
        for decorator in decorators {
            self.decorators.add_strategy(decorator);
        }
        if !providers.is_empty() {
            self.providers.rcu(|current| {
                let mut current = Vec::clone(current);
                current.extend(providers.iter().cloned());
                current
            });
        }
        for observer in observers {
            self.observers.add(observer);
        }

        if late {
            self.cache.clear();
        }
        tracing::debug!(
            scope = self.id,
            exports = counts.0,
            wrappers = counts.1,
            decorators = counts.2,
            providers = counts.3,
            late,
            "applied registration"
        );
        Ok(())
    }

    /// Registers a strategy produced by a missing-strategy provider.
    ///
    /// Delegates compiled before the strategy existed may depend on its
    /// absence, so the cache is dropped once anything has been located.
    pub(crate) fn add_provided(&self, provided: ProvidedStrategy) {
        match provided {
            ProvidedStrategy::Export(strategy) => {
                self.exports.add_strategy(strategy);
            }
            ProvidedStrategy::Wrapper(strategy) => {
                self.wrappers.add_strategy(strategy);
            }
            ProvidedStrategy::Decorator(decorator) => {
                self.decorators.add_strategy(decorator);
            }
        }
        if self.has_resolved() {
            self.cache.clear();
        }
    }

    /// An independent copy for a child container: same strategies,
    /// providers and observers; empty cache and lock table.
    ///
    /// `parent_root` is the root scope of the container owning `self`.
    pub(crate) fn create_child(&self, parent_root: &LifetimeScope) -> Self {
        let mut child = Self::empty(self.configuration.clone());
        child.exports = self.exports.clone();
        child.wrappers = self.wrappers.clone();
        child.decorators = self.decorators.clone();
        child.providers = ArcSwap::new(self.providers.load_full());
        child.observers = self.observers.snapshot();

        let mut inherited: Vec<u64> = child
            .exports
            .strategies()
            .iter()
            .chain(child.wrappers.strategies().iter())
            .map(|strategy| strategy.id())
            .collect();
        inherited.sort_unstable();
        inherited.dedup();
        child.inherited = Arc::from(inherited);
        child.parent_root = Some(parent_root.clone());
        child
    }

    /// Disposes resources owned by this scope's strategies: owned instances
    /// and closed generic strategies. Strategies inherited from a parent
    /// container are left to the parent.
    pub(crate) fn dispose_strategies(&self) {
        let owned = |strategy: &ActivationStrategy| !self.inherits(strategy.id());
        self.exports.dispose_where(owned);
        self.wrappers.dispose_where(owned);
    }
}

impl fmt::Debug for InjectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionScope")
            .field("id", &self.id)
            .field("exports", &self.exports)
            .field("decorators", &self.decorators)
            .field("cache", &self.cache)
            .field("inherited", &self.inherited.len())
            .finish()
    }
}
