use std::fmt;
use std::sync::Arc;

use super::{next_strategy_id, Activation, ActivationStrategy, Condition, ExportType, Strategy};
use crate::key::{GenericShape, LocateKey, TypeKey};
use crate::lifestyle::Lifestyle;
use crate::persistent::AtomicMap;

/// Predicate over one closed type argument.
pub type TypeConstraint = Arc<dyn Fn(&TypeKey) -> bool + Send + Sync>;

type Closer = Arc<dyn Fn(&GenericShape) -> Option<ActivationStrategy> + Send + Sync>;

/// The closing side of an open generic strategy.
///
/// Closed strategies are produced on demand from a requested closed type
/// and memoized per closed type, including the negative answer when a
/// constraint rejects the arguments.
pub struct GenericActivation {
    owner: u64,
    definition: TypeKey,
    constraints: Vec<Option<TypeConstraint>>,
    lifestyle: Option<Arc<dyn Lifestyle>>,
    closer: Closer,
    closed: AtomicMap<TypeKey, Option<Arc<ActivationStrategy>>>,
}

impl GenericActivation {
    pub fn definition(&self) -> &TypeKey {
        &self.definition
    }

    /// The closed strategy for `requested`, if its shape matches the
    /// definition and satisfies every constraint.
    pub fn close(&self, requested: &TypeKey) -> Option<Arc<ActivationStrategy>> {
        if let Some(memoized) = self.closed.get(requested) {
            return memoized;
        }

        let closed = requested
            .shape()
            .filter(|shape| shape.definition_key() == self.definition)
            .filter(|shape| self.satisfies_constraints(shape))
            .and_then(|shape| (self.closer)(shape))
            .map(|mut strategy| {
                strategy.origin = self.owner;
                if strategy.lifestyle.is_none() {
                    strategy.lifestyle = self.lifestyle.as_ref().map(|template| template.fresh());
                }
                Arc::new(strategy)
            });

        if closed.is_some() {
            tracing::trace!(definition = %self.definition, closed = %requested, "closed open generic strategy");
        }
        self.closed
            .thread_safe_insert(requested.clone(), closed, |existing, _| existing.clone())
    }

    fn satisfies_constraints(&self, shape: &GenericShape) -> bool {
        self.constraints
            .iter()
            .zip(shape.arguments())
            .all(|(constraint, argument)| constraint.as_ref().map_or(true, |check| check(argument)))
    }

    /// Number of closed types seen so far, including rejected ones.
    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    pub(crate) fn dispose_closed(&self) {
        for closed in self.closed.snapshot().values().flatten() {
            closed.dispose_strategy();
        }
    }
}

impl fmt::Debug for GenericActivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericActivation")
            .field("definition", &self.definition)
            .field("closed", &self.closed.len())
            .finish()
    }
}

/// Builder for a strategy exported as an open generic definition.
///
/// Rust has no runtime generic instantiation, so the closing function maps
/// a requested [`GenericShape`] to a concrete strategy, typically by
/// matching on the type arguments.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{
///     ActivationStrategy, Container, GenericShape, GenericType, Lifetime, Locator,
///     OpenGenericStrategy, TypeKey,
/// };
/// use std::marker::PhantomData;
///
/// struct Repository<T>(PhantomData<T>);
///
/// impl<T: Send + Sync + 'static> GenericType for Repository<T> {
///     fn generic_shape() -> GenericShape {
///         GenericShape::new("Repository", vec![TypeKey::of::<T>()])
///     }
/// }
///
/// fn repository<T: Send + Sync + 'static>() -> ActivationStrategy {
///     ActivationStrategy::build::<Repository<T>>()
///         .construct(|_| Ok(Repository(PhantomData)))
///         .export_generic_as_self()
///         .finish()
/// }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.open_generic(
///         OpenGenericStrategy::new("Repository", 1)
///             .lifetime(Lifetime::Singleton)
///             .close_with(|shape| {
///                 let argument = &shape.arguments()[0];
///                 if *argument == TypeKey::of::<u32>() {
///                     Some(repository::<u32>())
///                 } else {
///                     None
///                 }
///             }),
///     );
/// }).unwrap();
///
/// assert!(container.locate_generic::<Repository<u32>>().is_ok());
/// assert!(container.locate_generic::<Repository<String>>().is_err());
/// ```
pub struct OpenGenericStrategy {
    definition: TypeKey,
    constraints: Vec<Option<TypeConstraint>>,
    priority: i32,
    conditions: Vec<Arc<dyn Condition>>,
    lifestyle: Option<Arc<dyn Lifestyle>>,
    keys: Vec<LocateKey>,
}

impl OpenGenericStrategy {
    pub fn new(definition: &'static str, arity: usize) -> Self {
        Self {
            definition: TypeKey::definition(definition, arity),
            constraints: vec![None; arity],
            priority: 0,
            conditions: Vec::new(),
            lifestyle: None,
            keys: Vec::new(),
        }
    }

    /// Restricts type argument `index`. Out-of-range indexes are ignored.
    pub fn constrain<F>(mut self, index: usize, constraint: F) -> Self
    where
        F: Fn(&TypeKey) -> bool + Send + Sync + 'static,
    {
        if let Some(slot) = self.constraints.get_mut(index) {
            *slot = Some(Arc::new(constraint));
        }
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn when<C: Condition + 'static>(mut self, condition: C) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Lifestyle template; every closed type gets a fresh copy unless the
    /// closed strategy sets its own.
    pub fn lifestyle(mut self, lifestyle: Arc<dyn Lifestyle>) -> Self {
        self.lifestyle = Some(lifestyle);
        self
    }

    pub fn lifetime(mut self, lifetime: crate::Lifetime) -> Self {
        self.lifestyle = lifetime.lifestyle();
        self
    }

    pub fn export_keyed(mut self, key: impl Into<LocateKey>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn close_with<F>(self, closer: F) -> ActivationStrategy
    where
        F: Fn(&GenericShape) -> Option<ActivationStrategy> + Send + Sync + 'static,
    {
        let id = next_strategy_id();
        let generic = GenericActivation {
            owner: id,
            definition: self.definition.clone(),
            constraints: self.constraints,
            lifestyle: self.lifestyle,
            closer: Arc::new(closer),
            closed: AtomicMap::new(),
        };
        let mut strategy =
            ActivationStrategy::with_id(id, self.definition.clone(), Activation::OpenGeneric(Arc::new(generic)));
        strategy.priority = self.priority;
        strategy.conditions = self.conditions;
        if self.keys.is_empty() {
            strategy.exports.push(ExportType::identity(self.definition));
        } else {
            strategy.keyed_exports = self
                .keys
                .into_iter()
                .map(|key| (ExportType::identity(self.definition.clone()), key))
                .collect();
        }
        tracing::trace!(definition = %strategy.activation_type(), "built open generic strategy");
        strategy
    }
}
