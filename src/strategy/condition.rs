use std::borrow::Cow;

use super::Strategy;
use crate::compiler::StaticInjectionContext;
use crate::key::TypeKey;

/// Decides whether a strategy may be used at a particular call site.
///
/// Any closure `Fn(&dyn Strategy, &StaticInjectionContext) -> bool` is a
/// condition.
pub trait Condition: Send + Sync {
    fn meets_condition(&self, strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&dyn Strategy, &StaticInjectionContext) -> bool + Send + Sync,
{
    fn meets_condition(&self, strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool {
        self(strategy, context)
    }
}

/// Passes when the value is injected directly into one of the given types.
#[derive(Debug, Clone)]
pub struct WhenInjectedInto {
    types: Vec<TypeKey>,
}

impl WhenInjectedInto {
    pub fn new(types: Vec<TypeKey>) -> Self {
        Self { types }
    }

    pub fn type_of<T: ?Sized + 'static>() -> Self {
        Self::new(vec![TypeKey::of::<T>()])
    }
}

impl Condition for WhenInjectedInto {
    fn meets_condition(&self, _strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool {
        context
            .injected_into()
            .first()
            .is_some_and(|parent| self.types.contains(parent))
    }
}

/// Passes when the value is injected anywhere below one of the given types.
#[derive(Debug, Clone)]
pub struct WhenInjectedBelow {
    types: Vec<TypeKey>,
}

impl WhenInjectedBelow {
    pub fn new(types: Vec<TypeKey>) -> Self {
        Self { types }
    }
}

impl Condition for WhenInjectedBelow {
    fn meets_condition(&self, _strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool {
        context
            .injected_into()
            .iter()
            .any(|ancestor| self.types.contains(ancestor))
    }
}

/// Passes when the injection site carries the given target name.
#[derive(Debug, Clone)]
pub struct WhenTargetNamed {
    name: Cow<'static, str>,
}

impl WhenTargetNamed {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }
}

impl Condition for WhenTargetNamed {
    fn meets_condition(&self, _strategy: &dyn Strategy, context: &StaticInjectionContext) -> bool {
        context
            .target()
            .and_then(|target| target.name.as_deref())
            .is_some_and(|name| name == self.name)
    }
}
