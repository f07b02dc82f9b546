//! Locator traits for instance resolution.

use std::sync::Arc;

use crate::context::InjectionContext;
use crate::error::{DiError, DiResult};
use crate::key::{GenericType, LocateKey, TypeKey};
use crate::strategy::{ActivationStrategy, StrategyFilter};
use crate::value::{unerase, AnyArc};
use crate::wrappers::Resolvable;

/// Object-safe core of every locator.
///
/// Implemented by [`Container`](crate::Container),
/// [`LifetimeScope`](crate::LifetimeScope), the
/// [`ActivationFrame`](crate::ActivationFrame) handed to factories and
/// [`TypedLocator`](crate::TypedLocator). Most callers use the typed helpers
/// on [`Locator`] instead.
pub trait LocatorCore: Send + Sync {
    /// Locates an erased instance of `type_key`.
    ///
    /// `Ok(None)` means no strategy can satisfy the request. Errors raised
    /// while activating are returned as they are.
    fn locate_value(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        context: Option<&InjectionContext>,
    ) -> DiResult<Option<AnyArc>>;

    /// True when a locate of `type_key` would find a strategy. Never runs
    /// missing-strategy providers.
    fn can_locate(&self, type_key: &TypeKey, key: Option<&LocateKey>) -> bool;
}

/// Typed locate helpers, available on every [`LocatorCore`].
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator, Func, Lazy};
/// use std::sync::Arc;
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_singleton(5_u8);
///     r.add_keyed_singleton("primary", String::from("db-1"));
///     r.add_keyed_singleton("replica", String::from("db-2"));
/// }).unwrap();
///
/// assert_eq!(*container.locate::<u8>().unwrap(), 5);
/// assert_eq!(&*container.locate_keyed::<String>("replica").unwrap(), "db-2");
/// assert!(container.try_locate::<u64>().unwrap().is_none());
///
/// let factory = container.resolve::<Func<u8>>().unwrap();
/// assert_eq!(*factory.call().unwrap(), 5);
/// let lazy = container.resolve::<Lazy<u8>>().unwrap();
/// assert!(!lazy.is_created());
/// ```
pub trait Locator: LocatorCore {
    /// Resolves any [`Resolvable`] shape: `Arc<T>`, `Vec<Arc<T>>` or a
    /// wrapper such as [`Func`](crate::Func).
    fn resolve<R: Resolvable>(&self) -> DiResult<R> {
        let type_key = R::type_key();
        let instance = self
            .locate_value(&type_key, None, None, None)?
            .ok_or_else(|| DiError::missing(&type_key))?;
        R::from_instance(&instance)
    }

    fn try_resolve<R: Resolvable>(&self) -> DiResult<Option<R>> {
        match self.locate_value(&R::type_key(), None, None, None)? {
            Some(instance) => R::from_instance(&instance).map(Some),
            None => Ok(None),
        }
    }

    fn locate<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve::<Arc<T>>()
    }

    /// Like [`locate`](Self::locate) but `Ok(None)` when nothing is
    /// registered for `T`.
    fn try_locate<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve::<Arc<T>>()
    }

    /// Locates the strategy exported under `key`, falling back to one
    /// exported under [`LocateKey::Any`].
    fn locate_keyed<T: ?Sized + Send + Sync + 'static>(&self, key: impl Into<LocateKey>) -> DiResult<Arc<T>> {
        let type_key = TypeKey::of::<T>();
        let instance = self
            .locate_value(&type_key, Some(&key.into()), None, None)?
            .ok_or_else(|| DiError::missing(&type_key))?;
        typed(&instance)
    }

    fn try_locate_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<LocateKey>,
    ) -> DiResult<Option<Arc<T>>> {
        self.locate_value(&TypeKey::of::<T>(), Some(&key.into()), None, None)?
            .map(|instance| typed(&instance))
            .transpose()
    }

    /// Locates with extra values that satisfy otherwise missing dependencies.
    fn locate_with<T: ?Sized + Send + Sync + 'static>(&self, context: &InjectionContext) -> DiResult<Arc<T>> {
        let type_key = TypeKey::of::<T>();
        let instance = self
            .locate_value(&type_key, None, None, Some(context))?
            .ok_or_else(|| DiError::missing(&type_key))?;
        typed(&instance)
    }

    /// Locates through the highest-priority strategy accepted by `filter`.
    /// Filtered delegates are compiled for each call.
    fn locate_filtered<T, F>(&self, filter: F) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ActivationStrategy) -> bool + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<T>();
        let filter: StrategyFilter = Arc::new(filter);
        let instance = self
            .locate_value(&type_key, None, Some(&filter), None)?
            .ok_or_else(|| DiError::missing(&type_key))?;
        typed(&instance)
    }

    /// Every instance exported as `T`, highest priority first. Empty when
    /// nothing is registered.
    fn locate_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve::<Vec<Arc<T>>>()
    }

    /// Locates a closed generic type, matching open generic strategies by
    /// its [`GenericShape`](crate::GenericShape).
    fn locate_generic<T: GenericType + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let type_key = TypeKey::of_generic::<T>();
        let instance = self
            .locate_value(&type_key, None, None, None)?
            .ok_or_else(|| DiError::missing(&type_key))?;
        typed(&instance)
    }

    /// Locates an erased instance for a runtime key.
    fn locate_type(&self, type_key: &TypeKey) -> DiResult<AnyArc> {
        self.locate_value(type_key, None, None, None)?
            .ok_or_else(|| DiError::missing(type_key))
    }
}

impl<L: LocatorCore + ?Sized> Locator for L {}

fn typed<T: ?Sized + Send + Sync + 'static>(instance: &AnyArc) -> DiResult<Arc<T>> {
    unerase::<T>(instance).ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))
}
