use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{next_strategy_id, Arguments, Condition, Dependency, Strategy};
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::value::{erase, unerase, AnyArc};

/// Wraps an instance of the decorated type, with resolved dependencies.
pub type DecorateFn = Arc<dyn Fn(AnyArc, &Arguments) -> DiResult<AnyArc> + Send + Sync>;

/// A rule wrapping every instance of a type in another implementation.
///
/// Decorators with a higher priority end up outermost; equal priorities
/// nest in registration order. By default a decorator is applied to each
/// activation before the lifestyle memoizes it; decorators marked
/// [`apply_after_lifestyle`](DecoratorBuilder::apply_after_lifestyle) wrap
/// the value every time it is handed out instead.
#[derive(Clone)]
pub struct DecoratorStrategy {
    pub(crate) id: u64,
    pub(crate) decorated: TypeKey,
    pub(crate) priority: i32,
    pub(crate) conditions: Vec<Arc<dyn Condition>>,
    pub(crate) apply_after_lifestyle: bool,
    pub(crate) parameters: Vec<Dependency>,
    pub(crate) decorate: DecorateFn,
}

impl DecoratorStrategy {
    /// Starts a decorator for `I`.
    pub fn build<I: ?Sized + Send + Sync + 'static>() -> DecoratorBuilder<I> {
        DecoratorBuilder {
            decorated: TypeKey::of::<I>(),
            priority: 0,
            conditions: Vec::new(),
            apply_after_lifestyle: false,
            parameters: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// A decorator for an arbitrary key, e.g. an open generic definition.
    pub fn for_type(decorated: TypeKey, decorate: DecorateFn) -> Self {
        Self {
            id: next_strategy_id(),
            decorated,
            priority: 0,
            conditions: Vec::new(),
            apply_after_lifestyle: false,
            parameters: Vec::new(),
            decorate,
        }
    }

    pub fn decorated_type(&self) -> &TypeKey {
        &self.decorated
    }

    pub fn applies_after_lifestyle(&self) -> bool {
        self.apply_after_lifestyle
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }
}

impl Strategy for DecoratorStrategy {
    fn id(&self) -> u64 {
        self.id
    }

    fn activation_type(&self) -> &TypeKey {
        &self.decorated
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    fn export_types(&self) -> Vec<TypeKey> {
        vec![self.decorated.clone()]
    }
}

impl fmt::Debug for DecoratorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorStrategy")
            .field("id", &self.id)
            .field("decorated", &self.decorated)
            .field("priority", &self.priority)
            .field("apply_after_lifestyle", &self.apply_after_lifestyle)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Typed builder for a [`DecoratorStrategy`] over `I`.
pub struct DecoratorBuilder<I: ?Sized> {
    decorated: TypeKey,
    priority: i32,
    conditions: Vec<Arc<dyn Condition>>,
    apply_after_lifestyle: bool,
    parameters: Vec<Dependency>,
    _marker: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized + Send + Sync + 'static> DecoratorBuilder<I> {
    /// Appends a dependency handed to the decorate closure.
    pub fn import(mut self, dependency: Dependency) -> Self {
        self.parameters.push(dependency);
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

    pub fn apply_after_lifestyle(mut self) -> Self {
        self.apply_after_lifestyle = true;
        self
    }

    pub fn decorate<F>(self, decorate: F) -> DecoratorStrategy
    where
        F: Fn(Arc<I>, &Arguments) -> DiResult<Arc<I>> + Send + Sync + 'static,
    {
        let decorate: DecorateFn = Arc::new(move |instance: AnyArc, args: &Arguments| {
            let inner = unerase::<I>(&instance).ok_or_else(|| DiError::type_mismatch(std::any::type_name::<I>()))?;
            decorate(inner, args).map(erase)
        });
        DecoratorStrategy {
            id: next_strategy_id(),
            decorated: self.decorated,
            priority: self.priority,
            conditions: self.conditions,
            apply_after_lifestyle: self.apply_after_lifestyle,
            parameters: self.parameters,
            decorate,
        }
    }
}
