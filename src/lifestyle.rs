//! Lifestyles: how long an activated instance is reused.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::persistent::AtomicMap;
use crate::scope::ActivationFrame;
use crate::value::AnyArc;

/// Creates a new instance for a lifestyle, given the frame to build it in.
pub type CreateInstance<'c> = &'c dyn Fn(&ActivationFrame<'_>) -> DiResult<AnyArc>;

/// Identifies one memoized instance.
///
/// `strategy` is the strategy that activates it and `owner` the registered
/// strategy it came from (the open generic for closed strategies). `view`
/// is set when an exported view is memoized separately because decorators
/// for that view run inside the lifestyle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    strategy: u64,
    owner: u64,
    view: Option<TypeKey>,
}

impl InstanceKey {
    pub fn new(strategy: u64) -> Self {
        Self {
            strategy,
            owner: strategy,
            view: None,
        }
    }

    pub(crate) fn owned_by(mut self, owner: u64) -> Self {
        self.owner = owner;
        self
    }

    pub(crate) fn for_view(mut self, view: TypeKey) -> Self {
        self.view = Some(view);
        self
    }

    pub fn strategy(&self) -> u64 {
        self.strategy
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn view(&self) -> Option<&TypeKey> {
        self.view.as_ref()
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            Some(view) => write!(f, "{}/{}", self.strategy, view),
            None => write!(f, "{}", self.strategy),
        }
    }
}

thread_local! {
    static INITIALIZING: RefCell<Vec<InstanceKey>> = const { RefCell::new(Vec::new()) };
}

/// Marks a singleton as being built on this thread. Building it again
/// before the first build returns would block on its own cell.
struct InitializationGuard {
    key: InstanceKey,
}

impl InitializationGuard {
    fn enter(key: &InstanceKey) -> DiResult<Self> {
        let reentered = INITIALIZING.with(|initializing| {
            let mut initializing = initializing.borrow_mut();
            if initializing.contains(key) {
                return true;
            }
            initializing.push(key.clone());
            false
        });
        if reentered {
            return Err(DiError::general(format!(
                "singleton {key} depends on itself while it is being created"
            )));
        }
        Ok(Self { key: key.clone() })
    }
}

impl Drop for InitializationGuard {
    fn drop(&mut self) {
        INITIALIZING.with(|initializing| {
            let mut initializing = initializing.borrow_mut();
            if let Some(position) = initializing.iter().rposition(|key| *key == self.key) {
                initializing.remove(position);
            }
        });
    }
}

/// Memoization policy wrapped around a strategy's activation.
///
/// A strategy without a lifestyle is transient: every request activates a
/// new instance.
pub trait Lifestyle: Send + Sync + 'static {
    /// Short name used in diagnostics.
    fn description(&self) -> &'static str;

    /// True when instances must be built against the root scope, so they
    /// never capture a shorter-lived scope.
    fn root_request(&self) -> bool {
        false
    }

    /// An independent lifestyle of the same kind, used for each closed type
    /// of an open generic strategy.
    fn fresh(&self) -> Arc<dyn Lifestyle>;

    /// Returns the memoized instance for `key`, calling `create` when there
    /// is none yet.
    fn activate(&self, frame: &ActivationFrame<'_>, key: &InstanceKey, create: CreateInstance<'_>) -> DiResult<AnyArc>;

    /// Drops instances the lifestyle holds itself. Called when the owning
    /// container is disposed.
    fn release(&self) {}
}

/// One instance for the lifetime of the container.
///
/// The instance is built in the root scope of the container that
/// registered the strategy: its dependencies come from that root and it is
/// tracked by that root's disposal scope, even when a child container asks
/// for it first.
#[derive(Default)]
pub struct Singleton {
    instances: AtomicMap<InstanceKey, Arc<OnceCell<AnyArc>>>,
}

impl Singleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_created(&self) -> bool {
        self.instances.snapshot().values().any(|cell| cell.get().is_some())
    }
}

impl Lifestyle for Singleton {
    fn description(&self) -> &'static str {
        "singleton"
    }

    fn root_request(&self) -> bool {
        true
    }

    fn fresh(&self) -> Arc<dyn Lifestyle> {
        Arc::new(Singleton::new())
    }

    fn activate(&self, frame: &ActivationFrame<'_>, key: &InstanceKey, create: CreateInstance<'_>) -> DiResult<AnyArc> {
        let cell = match self.instances.get(key) {
            Some(cell) => cell,
            None => self
                .instances
                .get_or_insert_with(key.clone(), || Arc::new(OnceCell::new())),
        };
        if let Some(instance) = cell.get() {
            return Ok(instance.clone());
        }

        let _guard = InitializationGuard::enter(key)?;
        let root = frame.scope().singleton_root(key.owner());
        let root_frame = ActivationFrame::new(&root, Some(root.disposal_scope()), frame.context());
        cell.get_or_try_init(|| create(&root_frame)).cloned()
    }

    fn release(&self) {
        self.instances.clear();
    }
}

impl fmt::Debug for Singleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton").field("created", &self.is_created()).finish()
    }
}

/// One instance per lifetime scope.
///
/// With a scope name, the instance is shared by everything below the
/// nearest enclosing scope carrying that name.
#[derive(Debug, Clone, Default)]
pub struct SingletonPerScope {
    scope_name: Option<Cow<'static, str>>,
}

impl SingletonPerScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scope_name: Some(name.into()),
        }
    }
}

impl Lifestyle for SingletonPerScope {
    fn description(&self) -> &'static str {
        "singleton per scope"
    }

    fn fresh(&self) -> Arc<dyn Lifestyle> {
        Arc::new(self.clone())
    }

    fn activate(&self, frame: &ActivationFrame<'_>, key: &InstanceKey, create: CreateInstance<'_>) -> DiResult<AnyArc> {
        let target = match &self.scope_name {
            Some(name) => frame
                .scope()
                .find_named(name)
                .ok_or_else(|| DiError::general(format!("no enclosing lifetime scope is named '{name}'")))?,
            None => frame.scope().clone(),
        };
        target.scoped_instance(key, |scope| {
            let scoped_frame = ActivationFrame::new(scope, Some(scope.disposal_scope()), frame.context());
            create(&scoped_frame)
        })
    }
}

/// One instance per root resolution: every dependency in one object graph
/// shares it, the next locate gets a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingletonPerObjectGraph;

impl Lifestyle for SingletonPerObjectGraph {
    fn description(&self) -> &'static str {
        "singleton per object graph"
    }

    fn fresh(&self) -> Arc<dyn Lifestyle> {
        Arc::new(SingletonPerObjectGraph)
    }

    fn activate(&self, frame: &ActivationFrame<'_>, key: &InstanceKey, create: CreateInstance<'_>) -> DiResult<AnyArc> {
        frame.context().graph_instance(key, || create(frame))
    }
}
