//! Containers, lifetime scopes and the frames activations run in.
//!
//! A [`Container`] owns the root [`LifetimeScope`]. Every lifetime scope
//! shares its container's [`InjectionScope`], which holds registrations and
//! compiled delegates, and owns a [`DisposalScope`] plus the instances
//! cached by scoped lifestyles.

mod container;
mod frame;
mod injection;
mod locks;

pub use container::Container;
pub use frame::ActivationFrame;
pub use injection::InjectionScope;

pub(crate) use locks::LockTable;

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::context::InjectionContext;
use crate::disposal::DisposalScope;
use crate::error::{DiError, DiResult};
use crate::key::{LocateKey, TypeKey};
use crate::lifestyle::InstanceKey;
use crate::persistent::AtomicMap;
use crate::strategy::StrategyFilter;
use crate::traits::LocatorCore;
use crate::value::AnyArc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeInner {
    id: u64,
    name: Option<Cow<'static, str>>,
    injection: Arc<InjectionScope>,
    parent: Option<LifetimeScope>,
    disposal: DisposalScope,
    scoped: AtomicMap<InstanceKey, AnyArc>,
    locks: LockTable,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.disposal.dispose();
    }
}

/// A unit of instance ownership.
///
/// Scoped lifestyles cache one instance per lifetime scope, and disposable
/// instances created in a scope are disposed with it. Cloning a scope is
/// cheap and yields a handle to the same scope.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator};
/// use std::sync::Arc;
///
/// struct Session;
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_scoped_factory::<Session, _>(|_| Ok(Session));
/// }).unwrap();
///
/// let request = container.begin_lifetime_scope(Some("request"));
/// let a = request.locate::<Session>().unwrap();
/// let b = request.locate::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = container.begin_lifetime_scope(None);
/// assert!(!Arc::ptr_eq(&a, &other.locate::<Session>().unwrap()));
/// ```
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

impl LifetimeScope {
    pub(crate) fn new_root(injection: Arc<InjectionScope>) -> Self {
        Self::create(injection, None, None)
    }

    fn create(injection: Arc<InjectionScope>, parent: Option<LifetimeScope>, name: Option<Cow<'static, str>>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                name,
                injection,
                parent,
                disposal: DisposalScope::new(),
                scoped: AtomicMap::new(),
                locks: LockTable::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn parent(&self) -> Option<&LifetimeScope> {
        self.inner.parent.as_ref()
    }

    /// The outermost scope, owned by the container.
    pub fn root(&self) -> LifetimeScope {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// The root scope that owns singletons of the strategy `owner`.
    ///
    /// Strategies a child container inherited from its parent keep their
    /// instances in the parent's root.
    pub fn singleton_root(&self, owner: u64) -> LifetimeScope {
        let mut root = self.root();
        loop {
            let parent_root = match root.injection_scope().parent_root() {
                Some(parent_root) if root.injection_scope().inherits(owner) => parent_root.clone(),
                _ => return root,
            };
            root = parent_root;
        }
    }

    pub fn disposal_scope(&self) -> &DisposalScope {
        &self.inner.disposal
    }

    pub fn injection_scope(&self) -> &InjectionScope {
        &self.inner.injection
    }

    /// This scope or the nearest ancestor named `name`.
    pub fn find_named(&self, name: &str) -> Option<LifetimeScope> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if scope.name() == Some(name) {
                return Some(scope.clone());
            }
            current = scope.parent();
        }
        None
    }

    /// Opens a nested scope sharing this scope's registrations.
    pub fn begin_lifetime_scope(&self, name: Option<&str>) -> LifetimeScope {
        let scope = Self::create(
            self.inner.injection.clone(),
            Some(self.clone()),
            name.map(|name| Cow::Owned(name.to_owned())),
        );
        tracing::trace!(parent = self.id(), scope = scope.id(), name = ?scope.name(), "began lifetime scope");
        scope
    }

    /// The instance this scope holds for `key`, created once.
    ///
    /// Creation for one key is serialized; concurrent callers wait and
    /// then observe the instance the first caller stored.
    pub fn scoped_instance<F>(&self, key: &InstanceKey, create: F) -> DiResult<AnyArc>
    where
        F: FnOnce(&LifetimeScope) -> DiResult<AnyArc>,
    {
        if let Some(existing) = self.inner.scoped.get(key) {
            return Ok(existing);
        }

        let lock = self.inner.locks.get(format!("scoped-{key}"));
        let _guard = lock.lock();
        if let Some(existing) = self.inner.scoped.get(key) {
            return Ok(existing);
        }
        let created = create(self)?;
        self.inner.scoped.insert(key.clone(), created.clone());
        Ok(created)
    }

    /// Disposes everything tracked by this scope, most recent first.
    ///
    /// Scoped instances are forgotten, so later locates build new ones.
    pub fn dispose(&self) {
        self.inner.scoped.clear();
        self.inner.disposal.dispose();
        tracing::trace!(scope = self.id(), "disposed lifetime scope");
    }

    /// Runs the delegate for a request in this scope.
    ///
    /// `Ok(None)` means nothing can satisfy the request.
    pub(crate) fn activate(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        disposal: Option<&DisposalScope>,
        context: &InjectionContext,
    ) -> DiResult<Option<AnyArc>> {
        match self.inner.injection.delegate_for(type_key, key, filter, true)? {
            Some(delegate) => delegate(self, disposal, context).map(Some),
            None => Ok(None),
        }
    }
}

impl LocatorCore for LifetimeScope {
    fn locate_value(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        context: Option<&InjectionContext>,
    ) -> DiResult<Option<AnyArc>> {
        let context = context.map(InjectionContext::for_object_graph).unwrap_or_default();
        let observers = self.injection_scope().observers();
        if !observers.has_observers() {
            return self.activate(type_key, key, filter, Some(self.disposal_scope()), &context);
        }

        observers.resolving(type_key);
        let started = Instant::now();
        let result = self.activate(type_key, key, filter, Some(self.disposal_scope()), &context);
        match &result {
            Ok(Some(_)) => observers.resolved(type_key, started.elapsed()),
            Ok(None) => observers.failed(type_key, &DiError::missing(type_key)),
            Err(error) => observers.failed(type_key, error),
        }
        result
    }

    fn can_locate(&self, type_key: &TypeKey, key: Option<&LocateKey>) -> bool {
        matches!(self.injection_scope().delegate_for(type_key, key, None, false), Ok(Some(_)))
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("scoped", &self.inner.scoped.len())
            .field("disposal", &self.inner.disposal)
            .finish()
    }
}
