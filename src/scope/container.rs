use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{InjectionScope, LifetimeScope};
use crate::cache::CacheStatistics;
use crate::collection::Registration;
use crate::config::ContainerConfiguration;
use crate::context::InjectionContext;
use crate::error::DiResult;
use crate::key::{LocateKey, TypeKey};
use crate::strategy::StrategyFilter;
use crate::traits::LocatorCore;
use crate::value::AnyArc;

/// The root of an object graph.
///
/// Owns an [`InjectionScope`] with every registration and compiled
/// delegate, and the root [`LifetimeScope`] where singletons live.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_singleton_trait::<dyn Greeter>(Arc::new(English));
/// }).unwrap();
///
/// let greeter = container.locate::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
///
/// # Ownership
///
/// Singletons are held by the container, so a singleton that keeps a
/// [`LifetimeScope`], [`TypedLocator`](crate::TypedLocator),
/// [`Func`](crate::Func) or [`Lazy`](crate::Lazy) of its own container
/// forms a reference cycle: dropping the last `Container` handle then
/// neither disposes nor frees it. Call [`dispose`](Container::dispose) to
/// run disposal and release the singletons, which breaks the cycle.
pub struct Container {
    root: LifetimeScope,
    disposed: AtomicBool,
}

impl Container {
    pub fn new() -> Self {
        Self::with_configuration(ContainerConfiguration::default())
    }

    pub fn with_configuration(configuration: ContainerConfiguration) -> Self {
        Self::from_injection(InjectionScope::new(configuration))
    }

    fn from_injection(injection: InjectionScope) -> Self {
        tracing::debug!(scope = injection.id(), "created container");
        Self {
            root: LifetimeScope::new_root(Arc::new(injection)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn configuration(&self) -> &ContainerConfiguration {
        self.injection_scope().configuration()
    }

    pub fn injection_scope(&self) -> &InjectionScope {
        self.root.injection_scope()
    }

    pub fn root_scope(&self) -> &LifetimeScope {
        &self.root
    }

    /// Adds registrations.
    ///
    /// Blocks are applied atomically with respect to other `configure`
    /// calls. Locates running concurrently see either none or all of a
    /// block's strategies once it is published.
    pub fn configure<F>(&self, configure: F) -> DiResult<()>
    where
        F: FnOnce(&mut Registration),
    {
        let mut registration = Registration::new();
        configure(&mut registration);
        if registration.is_empty() {
            return Ok(());
        }
        self.injection_scope().apply(registration)
    }

    /// Opens a lifetime scope below the root.
    pub fn begin_lifetime_scope(&self, name: Option<&str>) -> LifetimeScope {
        self.root.begin_lifetime_scope(name)
    }

    /// A container starting from a copy of this one's registrations, with
    /// more added by `configure`.
    ///
    /// The child compiles its own delegates. Strategies registered on
    /// either side afterwards are not visible to the other. Strategies
    /// copied from `self` stay owned by `self`: their singletons live in
    /// this container's root scope and disposing the child leaves them
    /// alone.
    pub fn create_child_container<F>(&self, configure: F) -> DiResult<Container>
    where
        F: FnOnce(&mut Registration),
    {
        let child = Container::from_injection(self.injection_scope().create_child(&self.root));
        child.configure(configure)?;
        Ok(child)
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.injection_scope().cache_statistics()
    }

    /// Disposes the root scope, then strategy-owned resources, and releases
    /// the singletons this container owns. Later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.root.dispose();
        self.injection_scope().dispose_strategies();
        tracing::debug!(scope = self.injection_scope().id(), "disposed container");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorCore for Container {
    fn locate_value(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        context: Option<&InjectionContext>,
    ) -> DiResult<Option<AnyArc>> {
        self.root.locate_value(type_key, key, filter, context)
    }

    fn can_locate(&self, type_key: &TypeKey, key: Option<&LocateKey>) -> bool {
        self.root.can_locate(type_key, key)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("injection", self.injection_scope())
            .field("root", &self.root)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Locator;
    use crate::ErrorKind;

    #[test]
    fn empty_configure_is_a_no_op() {
        let container = Container::new();
        container.configure(|_| {}).unwrap();
        assert_eq!(container.injection_scope().exports().strategies().len(), 0);
    }

    #[test]
    fn child_sees_parent_registrations_but_not_the_reverse() {
        let parent = Container::new();
        parent.configure(|r| {
            r.add_singleton(1_u32);
        })
        .unwrap();

        let child = parent
            .create_child_container(|r| {
                r.add_singleton(String::from("child"));
            })
            .unwrap();

        assert_eq!(*child.locate::<u32>().unwrap(), 1);
        assert_eq!(&*child.locate::<String>().unwrap(), "child");
        assert_eq!(parent.locate::<String>().unwrap_err().kind(), ErrorKind::MissingDependency);
    }

    #[test]
    fn dispose_runs_once() {
        let container = Container::new();
        container.dispose();
        container.dispose();
        assert!(container.is_disposed());
    }
}
