use std::sync::Arc;

use crate::collection::StrategyInspector;
use crate::compiler::MissingStrategyProvider;
use crate::error::DiResult;
use crate::key::{LocateKey, TypeKey};
use crate::lifetime::Lifetime;
use crate::observer::ResolutionObserver;
use crate::scope::ActivationFrame;
use crate::strategy::{Activation, ActivationStrategy, DecoratorStrategy, ExportType};
use crate::value::erase;

/// Registrations collected by [`Container::configure`](crate::Container::configure).
///
/// Strategies are added to the container in the order they were
/// registered here, after any new inspectors have been installed.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { url: String }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_singleton(Config { url: "postgres://localhost".into() });
///     r.add_scoped_factory::<Database, _>(|frame| {
///         let config = frame.locate::<Config>()?;
///         Ok(Database { url: config.url.clone() })
///     });
/// }).unwrap();
///
/// let scope = container.begin_lifetime_scope(None);
/// assert_eq!(scope.locate::<Database>().unwrap().url, "postgres://localhost");
/// ```
#[derive(Default)]
pub struct Registration {
    pub(crate) exports: Vec<ActivationStrategy>,
    pub(crate) wrappers: Vec<ActivationStrategy>,
    pub(crate) decorators: Vec<DecoratorStrategy>,
    pub(crate) providers: Vec<Arc<dyn MissingStrategyProvider>>,
    pub(crate) inspectors: Vec<Arc<dyn StrategyInspector<ActivationStrategy>>>,
    pub(crate) observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an export strategy.
    pub fn export(&mut self, strategy: ActivationStrategy) -> &mut Self {
        self.exports.push(strategy);
        self
    }

    /// Registers a strategy built by [`OpenGenericStrategy`](crate::OpenGenericStrategy).
    pub fn open_generic(&mut self, strategy: ActivationStrategy) -> &mut Self {
        self.export(strategy)
    }

    pub fn decorator(&mut self, decorator: DecoratorStrategy) -> &mut Self {
        self.decorators.push(decorator);
        self
    }

    /// Registers a strategy in the wrapper container, consulted after the
    /// exports for every request.
    pub fn wrapper(&mut self, strategy: ActivationStrategy) -> &mut Self {
        self.wrappers.push(strategy);
        self
    }

    pub fn missing_strategy_provider<P>(&mut self, provider: P) -> &mut Self
    where
        P: MissingStrategyProvider + 'static,
    {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn inspector<I>(&mut self, inspector: I) -> &mut Self
    where
        I: StrategyInspector<ActivationStrategy> + 'static,
    {
        self.inspectors.push(Arc::new(inspector));
        self
    }

    pub fn observer(&mut self, observer: Arc<dyn ResolutionObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    // ----- Shorthand registrations -----

    /// Registers a singleton instance.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.export(ActivationStrategy::build::<T>().instance(value).finish())
    }

    /// Registers a singleton instance under a key.
    pub fn add_keyed_singleton<T: Send + Sync + 'static>(&mut self, key: impl Into<LocateKey>, value: T) -> &mut Self {
        self.export(ActivationStrategy::build::<T>().instance(value).export_keyed(key).finish())
    }

    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ActivationFrame<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ActivationFrame<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ActivationFrame<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ActivationFrame<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.export(
            ActivationStrategy::build::<T>()
                .factory(factory)
                .lifetime(lifetime)
                .finish(),
        )
    }

    /// Registers an existing trait object as a singleton.
    pub fn add_singleton_trait<I: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<I>) -> &mut Self {
        let mut strategy = ActivationStrategy::new(TypeKey::of::<I>(), Activation::Instance(erase(value)));
        strategy.exports.push(ExportType::identity(TypeKey::of::<I>()));
        self.export(strategy)
    }

    /// Registers a factory producing a trait object.
    pub fn add_trait_factory<I, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&ActivationFrame<'_>) -> DiResult<Arc<I>> + Send + Sync + 'static,
    {
        let activation = Activation::Factory(Arc::new(move |frame: &ActivationFrame<'_>| factory(frame).map(erase)));
        let mut strategy = ActivationStrategy::new(TypeKey::of::<I>(), activation);
        strategy.exports.push(ExportType::identity(TypeKey::of::<I>()));
        strategy.lifestyle = lifetime.lifestyle();
        self.export(strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
            && self.wrappers.is_empty()
            && self.decorators.is_empty()
            && self.providers.is_empty()
            && self.inspectors.is_empty()
            && self.observers.is_empty()
    }
}
