//! Activation strategies: the registered rules describing how to build a type.
//!
//! An [`ActivationStrategy`] names its activation type, the types (and
//! keys and names) it is exported as, how it is constructed, and what
//! happens around construction: lifestyle, enrichment, disposal. Strategies
//! are immutable once registered; the only mutable state they own is
//! lifestyle memoization and the closed forms of open generic strategies.

mod builder;
mod condition;
mod decorator;
mod dependency;
mod generic;

pub use builder::StrategyBuilder;
pub use condition::{Condition, WhenInjectedBelow, WhenInjectedInto, WhenTargetNamed};
pub use decorator::{DecorateFn, DecoratorBuilder, DecoratorStrategy};
pub use dependency::{Arguments, Dependency, InstanceComparer, StrategyFilter};
pub use generic::{GenericActivation, OpenGenericStrategy, TypeConstraint};

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::compiler::StaticInjectionContext;
use crate::disposal::{CleanupFn, DisposeFn};
use crate::error::DiResult;
use crate::key::{LocateKey, TypeKey};
use crate::lifestyle::Lifestyle;
use crate::scope::ActivationFrame;
use crate::value::AnyArc;
use crate::wrappers::WrapperKind;

static NEXT_STRATEGY_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a strategy id. Ids increase with registration order.
pub(crate) fn next_strategy_id() -> u64 {
    NEXT_STRATEGY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Converts an erased activation-type instance into an erased export-type instance.
pub type Caster = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;
/// Creates the raw instance from resolved constructor arguments.
pub type Activator = Arc<dyn Fn(&Arguments) -> DiResult<Box<dyn Any + Send + Sync>> + Send + Sync>;
/// Seals a raw, fully injected instance into a shared erased value.
pub type Finisher = Arc<dyn Fn(Box<dyn Any + Send + Sync>) -> DiResult<AnyArc> + Send + Sync>;
/// Assigns one resolved member on a raw instance.
pub type MemberSetter = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &AnyArc) -> DiResult<()> + Send + Sync>;
/// Calls one injection method on a raw instance.
pub type MethodInvoker = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Arguments) -> DiResult<()> + Send + Sync>;
/// Builds an instance with runtime access to the resolving scope.
pub type FactoryFn = Arc<dyn Fn(&ActivationFrame<'_>) -> DiResult<AnyArc> + Send + Sync>;
/// Maps an instance to an instance of the same type.
pub type EnrichFn = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;
/// Observes a freshly activated instance.
pub type ActivationAction = Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>;

/// Common surface of everything stored in a
/// [`StrategyCollectionContainer`](crate::StrategyCollectionContainer).
pub trait Strategy: Send + Sync + 'static {
    /// Unique id; ids increase with registration order.
    fn id(&self) -> u64;

    fn activation_type(&self) -> &TypeKey;

    /// Higher wins.
    fn priority(&self) -> i32;

    fn conditions(&self) -> &[Arc<dyn Condition>];

    fn has_conditions(&self) -> bool {
        !self.conditions().is_empty()
    }

    /// Types the strategy is explicitly exported as.
    fn export_types(&self) -> Vec<TypeKey>;

    /// Types indexed only when the container exports as base types.
    fn base_types(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    fn keyed_exports(&self) -> Vec<(TypeKey, LocateKey)> {
        Vec::new()
    }

    fn export_names(&self) -> Vec<Cow<'static, str>> {
        Vec::new()
    }

    /// Releases resources owned by the strategy itself.
    fn dispose_strategy(&self) {}
}

/// True when every condition of `strategy` passes for `context`.
pub fn meets_conditions(strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool {
    strategy
        .conditions()
        .iter()
        .all(|condition| condition.meets_condition(strategy, context))
}

/// One type a strategy is exported as, with the cast from the activation type.
#[derive(Clone)]
pub struct ExportType {
    pub(crate) key: TypeKey,
    pub(crate) cast: Option<Caster>,
}

impl ExportType {
    pub(crate) fn identity(key: TypeKey) -> Self {
        Self { key, cast: None }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }
}

/// A member assigned after construction.
#[derive(Clone)]
pub struct MemberInjection {
    pub(crate) name: Cow<'static, str>,
    pub(crate) dependency: Dependency,
    pub(crate) setter: MemberSetter,
}

/// A method called after construction with resolved arguments.
#[derive(Clone)]
pub struct MethodInjection {
    pub(crate) name: Cow<'static, str>,
    pub(crate) parameters: Vec<Dependency>,
    pub(crate) invoke: MethodInvoker,
}

/// Constructor plus injections for a constructed strategy.
pub struct ConstructionPlan {
    pub(crate) parameters: Vec<Dependency>,
    pub(crate) activator: Activator,
    pub(crate) finisher: Finisher,
    pub(crate) members: Vec<MemberInjection>,
    pub(crate) methods: Vec<MethodInjection>,
}

#[derive(Clone)]
pub(crate) struct Enrichment {
    pub(crate) function: EnrichFn,
    pub(crate) after_lifestyle: bool,
}

/// How a strategy produces its instance.
#[derive(Clone)]
pub(crate) enum Activation {
    Construct(Arc<ConstructionPlan>),
    Factory(FactoryFn),
    Instance(AnyArc),
    OpenGeneric(Arc<GenericActivation>),
    Wrapper(WrapperKind),
}

/// A registered rule for building one activation type.
///
/// Build one with [`ActivationStrategy::build`].
#[derive(Clone)]
pub struct ActivationStrategy {
    pub(crate) id: u64,
    pub(crate) origin: u64,
    pub(crate) activation_type: TypeKey,
    pub(crate) exports: Vec<ExportType>,
    pub(crate) keyed_exports: Vec<(ExportType, LocateKey)>,
    pub(crate) names: Vec<Cow<'static, str>>,
    pub(crate) base_types: Vec<ExportType>,
    pub(crate) priority: i32,
    pub(crate) conditions: Vec<Arc<dyn Condition>>,
    pub(crate) lifestyle: Option<Arc<dyn Lifestyle>>,
    pub(crate) activation: Activation,
    pub(crate) enrichments: Vec<Enrichment>,
    pub(crate) actions: Vec<ActivationAction>,
    pub(crate) disposer: Option<DisposeFn>,
    pub(crate) cleanup: Option<CleanupFn>,
    pub(crate) disposal_required: bool,
    pub(crate) externally_owned: bool,
}

impl ActivationStrategy {
    pub(crate) fn new(activation_type: TypeKey, activation: Activation) -> Self {
        Self::with_id(next_strategy_id(), activation_type, activation)
    }

    pub(crate) fn with_id(id: u64, activation_type: TypeKey, activation: Activation) -> Self {
        Self {
            id,
            origin: id,
            activation_type,
            exports: Vec::new(),
            keyed_exports: Vec::new(),
            names: Vec::new(),
            base_types: Vec::new(),
            priority: 0,
            conditions: Vec::new(),
            lifestyle: None,
            activation,
            enrichments: Vec::new(),
            actions: Vec::new(),
            disposer: None,
            cleanup: None,
            disposal_required: false,
            externally_owned: false,
        }
    }

    /// The strategy answering requests for a built-in wrapper definition.
    pub(crate) fn wrapper(kind: WrapperKind) -> Self {
        let definition = kind.definition_key();
        let mut strategy = Self::new(definition.clone(), Activation::Wrapper(kind));
        strategy.exports.push(ExportType::identity(definition));
        strategy
    }

    /// The registered strategy this one came from: the open generic
    /// strategy for a closed one, otherwise its own id.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn add_condition(&mut self, condition: Arc<dyn Condition>) {
        self.conditions.push(condition);
    }

    pub fn lifestyle(&self) -> Option<&Arc<dyn Lifestyle>> {
        self.lifestyle.as_ref()
    }

    pub fn set_lifestyle(&mut self, lifestyle: Option<Arc<dyn Lifestyle>>) {
        self.lifestyle = lifestyle;
    }

    pub fn names(&self) -> &[Cow<'static, str>] {
        &self.names
    }

    pub fn is_externally_owned(&self) -> bool {
        self.externally_owned
    }

    pub fn is_open_generic(&self) -> bool {
        matches!(self.activation, Activation::OpenGeneric(_))
    }

    /// The memoized closed forms of an open generic strategy.
    pub fn generic_activation(&self) -> Option<&Arc<GenericActivation>> {
        match &self.activation {
            Activation::OpenGeneric(generic) => Some(generic),
            _ => None,
        }
    }

    /// Cast from the activation type to `requested`, `None` for identity.
    pub(crate) fn cast_for(&self, requested: &TypeKey) -> Option<Caster> {
        if *requested == self.activation_type {
            return None;
        }
        self.exports
            .iter()
            .chain(self.keyed_exports.iter().map(|(export, _)| export))
            .chain(self.base_types.iter())
            .find(|export| export.key == *requested)
            .and_then(|export| export.cast.clone())
    }
}

impl Strategy for ActivationStrategy {
    fn id(&self) -> u64 {
        self.id
    }

    fn activation_type(&self) -> &TypeKey {
        &self.activation_type
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    fn export_types(&self) -> Vec<TypeKey> {
        self.exports.iter().map(|export| export.key.clone()).collect()
    }

    fn base_types(&self) -> Vec<TypeKey> {
        self.base_types.iter().map(|export| export.key.clone()).collect()
    }

    fn keyed_exports(&self) -> Vec<(TypeKey, LocateKey)> {
        self.keyed_exports
            .iter()
            .map(|(export, key)| (export.key.clone(), key.clone()))
            .collect()
    }

    fn export_names(&self) -> Vec<Cow<'static, str>> {
        self.names.clone()
    }

    fn dispose_strategy(&self) {
        match &self.activation {
            Activation::Instance(instance) if !self.externally_owned => {
                if let Some(dispose) = &self.disposer {
                    if let Some(cleanup) = &self.cleanup {
                        cleanup(instance);
                    }
                    dispose(instance);
                }
            }
            Activation::OpenGeneric(generic) => generic.dispose_closed(),
            _ => {}
        }
        if let Some(lifestyle) = &self.lifestyle {
            lifestyle.release();
        }
    }
}

impl fmt::Debug for ActivationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activation = match &self.activation {
            Activation::Construct(_) => "construct",
            Activation::Factory(_) => "factory",
            Activation::Instance(_) => "instance",
            Activation::OpenGeneric(_) => "open generic",
            Activation::Wrapper(_) => "wrapper",
        };
        f.debug_struct("ActivationStrategy")
            .field("id", &self.id)
            .field("activation_type", &self.activation_type)
            .field("exports", &self.export_types())
            .field("priority", &self.priority)
            .field("conditions", &self.conditions.len())
            .field("lifestyle", &self.lifestyle.as_ref().map(|l| l.description()))
            .field("activation", &activation)
            .finish()
    }
}
