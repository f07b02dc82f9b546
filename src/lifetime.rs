//! Shorthand for the built-in lifestyles.

use std::sync::Arc;

use crate::lifestyle::{Lifestyle, Singleton, SingletonPerObjectGraph, SingletonPerScope};

/// Built-in lifestyles controlling instance reuse
///
/// Each variant maps to a [`Lifestyle`] implementation; use
/// [`StrategyBuilder::lifestyle`](crate::StrategyBuilder::lifestyle) directly
/// for custom lifestyles or named scopes.
///
/// # Lifetime Characteristics
///
/// - **Singleton**: Highest performance (cached), highest memory usage
/// - **Scoped**: Medium performance (scoped cache), medium memory usage
/// - **ObjectGraph**: Shared inside one resolution only
/// - **Transient**: Lowest performance (always creates), lowest memory usage
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ActivationStrategy, Container, Lifetime, Locator};
/// use std::sync::Arc;
///
/// struct Database;
/// struct Repository;
/// struct RequestModel;
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.export(ActivationStrategy::build::<Database>()
///         .construct(|_| Ok(Database)).lifetime(Lifetime::Singleton).finish());
///     r.export(ActivationStrategy::build::<Repository>()
///         .construct(|_| Ok(Repository)).lifetime(Lifetime::Scoped).finish());
///     r.export(ActivationStrategy::build::<RequestModel>()
///         .construct(|_| Ok(RequestModel)).finish());
/// }).unwrap();
///
/// // Singleton: same instance across scopes
/// let scope1 = container.begin_lifetime_scope(None);
/// let db1 = container.locate::<Database>().unwrap();
/// let db2 = scope1.locate::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within scope, different across scopes
/// let repo1a = scope1.locate::<Repository>().unwrap();
/// let repo1b = scope1.locate::<Repository>().unwrap();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
/// let scope2 = container.begin_lifetime_scope(None);
/// let repo2 = scope2.locate::<Repository>().unwrap();
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// // Transient: always different instances
/// let model1 = scope1.locate::<RequestModel>().unwrap();
/// let model2 = scope1.locate::<RequestModel>().unwrap();
/// assert!(!Arc::ptr_eq(&model1, &model2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Single instance per container, built in the root scope
    Singleton,
    /// Single instance per lifetime scope
    Scoped,
    /// Single instance per root resolution
    ObjectGraph,
    /// New instance per resolution, never cached
    Transient,
}

impl Lifetime {
    /// A new lifestyle instance for this lifetime, `None` for transient.
    pub fn lifestyle(self) -> Option<Arc<dyn Lifestyle>> {
        match self {
            Lifetime::Singleton => Some(Arc::new(Singleton::new())),
            Lifetime::Scoped => Some(Arc::new(SingletonPerScope::new())),
            Lifetime::ObjectGraph => Some(Arc::new(SingletonPerObjectGraph)),
            Lifetime::Transient => None,
        }
    }
}
