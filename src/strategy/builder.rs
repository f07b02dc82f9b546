use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    Activation, ActivationAction, ActivationStrategy, Activator, Arguments, Caster, Condition, ConstructionPlan,
    Dependency, Enrichment, ExportType, Finisher, MemberInjection, MethodInjection,
};
use crate::disposal::{dispose_fn, CleanupFn, DisposeFn};
use crate::error::{DiError, DiResult};
use crate::key::{GenericType, LocateKey, TypeKey};
use crate::lifestyle::Lifestyle;
use crate::lifetime::Lifetime;
use crate::scope::ActivationFrame;
use crate::traits::Dispose;
use crate::value::{erase, unerase, AnyArc};
use crate::wrappers::Resolvable;

/// Typed builder for an [`ActivationStrategy`] whose activation type is `T`.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ActivationStrategy, Container, Dependency, Lifetime, Locator};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock(u64);
///
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         self.0
///     }
/// }
///
/// struct Scheduler {
///     clock: Arc<dyn Clock>,
/// }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.export(
///         ActivationStrategy::build::<FixedClock>()
///             .construct(|_| Ok(FixedClock(42)))
///             .export_as::<dyn Clock, _>(|clock| clock as Arc<dyn Clock>)
///             .lifetime(Lifetime::Singleton)
///             .finish(),
///     );
///     r.export(
///         ActivationStrategy::build::<Scheduler>()
///             .import(Dependency::on::<Arc<dyn Clock>>().named("clock"))
///             .construct(|args| Ok(Scheduler { clock: args.get(0)? }))
///             .finish(),
///     );
/// }).unwrap();
///
/// let scheduler = container.locate::<Scheduler>().unwrap();
/// assert_eq!(scheduler.clock.now(), 42);
/// ```
pub struct StrategyBuilder<T> {
    strategy: ActivationStrategy,
    parameters: Vec<Dependency>,
    members: Vec<MemberInjection>,
    methods: Vec<MethodInjection>,
    activator: Option<Activator>,
    configured: bool,
    _marker: PhantomData<fn() -> T>,
}

impl ActivationStrategy {
    /// Starts a strategy activating `T`.
    pub fn build<T: Send + Sync + 'static>() -> StrategyBuilder<T> {
        let unconfigured: Activation = Activation::Factory(Arc::new(|_: &ActivationFrame<'_>| {
            Err(DiError::general(format!(
                "no activation configured for {}",
                std::any::type_name::<T>()
            )))
        }));
        StrategyBuilder {
            strategy: ActivationStrategy::new(TypeKey::of::<T>(), unconfigured),
            parameters: Vec::new(),
            members: Vec::new(),
            methods: Vec::new(),
            activator: None,
            configured: false,
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> StrategyBuilder<T> {
    /// Activates `T` from the resolved [`import`](Self::import)ed arguments.
    pub fn construct<F>(mut self, activator: F) -> Self
    where
        F: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        self.activator = Some(Arc::new(move |args: &Arguments| {
            activator(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        }));
        self.configured = true;
        self
    }

    /// Activates `T` with a closure that locates its own dependencies at
    /// run time through the frame.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ActivationFrame<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.activator = None;
        self.strategy.activation =
            Activation::Factory(Arc::new(move |frame: &ActivationFrame<'_>| factory(frame).map(|v| erase(Arc::new(v)))));
        self.configured = true;
        self
    }

    /// Always returns the given instance.
    pub fn instance(self, value: T) -> Self {
        self.instance_arc(Arc::new(value))
    }

    pub fn instance_arc(mut self, value: Arc<T>) -> Self {
        self.activator = None;
        self.strategy.activation = Activation::Instance(erase(value));
        self.configured = true;
        self
    }

    /// Appends a constructor parameter.
    pub fn import(mut self, dependency: Dependency) -> Self {
        self.parameters.push(dependency);
        self
    }

    /// Assigns member `name` after construction.
    pub fn inject_member<R, F>(self, name: &'static str, set: F) -> Self
    where
        R: Resolvable,
        F: Fn(&mut T, R) + Send + Sync + 'static,
    {
        self.inject_member_with(Dependency::on::<R>().named(name), set)
    }

    /// Assigns a member described by an explicit dependency.
    pub fn inject_member_with<R, F>(mut self, dependency: Dependency, set: F) -> Self
    where
        R: Resolvable,
        F: Fn(&mut T, R) + Send + Sync + 'static,
    {
        let name = dependency
            .target_name()
            .cloned()
            .unwrap_or(Cow::Borrowed(std::any::type_name::<R>()));
        self.members.push(MemberInjection {
            name,
            dependency,
            setter: Arc::new(move |instance: &mut (dyn Any + Send + Sync), value: &AnyArc| {
                let target = instance
                    .downcast_mut::<T>()
                    .ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))?;
                set(target, R::from_instance(value)?);
                Ok(())
            }),
        });
        self
    }

    /// Calls method `name` after construction and member injection.
    pub fn inject_method<F>(mut self, name: &'static str, parameters: Vec<Dependency>, call: F) -> Self
    where
        F: Fn(&mut T, &Arguments) -> DiResult<()> + Send + Sync + 'static,
    {
        self.methods.push(MethodInjection {
            name: Cow::Borrowed(name),
            parameters,
            invoke: Arc::new(move |instance: &mut (dyn Any + Send + Sync), args: &Arguments| {
                let target = instance
                    .downcast_mut::<T>()
                    .ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))?;
                call(target, args)
            }),
        });
        self
    }

    pub fn export_as_self(mut self) -> Self {
        self.strategy.exports.push(ExportType::identity(TypeKey::of::<T>()));
        self
    }

    /// Exports `T` as its generic shape so open-generic requests can match it.
    pub fn export_generic_as_self(mut self) -> Self
    where
        T: GenericType,
    {
        self.strategy.activation_type = TypeKey::of_generic::<T>();
        self.strategy.exports.push(ExportType::identity(TypeKey::of_generic::<T>()));
        self
    }

    /// Exports as `I`, typically a trait object.
    pub fn export_as<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.strategy.exports.push(export_type::<T, I, F>(cast));
        self
    }

    /// Exports as `T` under a key.
    pub fn export_keyed(mut self, key: impl Into<LocateKey>) -> Self {
        self.strategy
            .keyed_exports
            .push((ExportType::identity(TypeKey::of::<T>()), key.into()));
        self
    }

    /// Exports as `I` under a key.
    pub fn export_keyed_as<I, F>(mut self, key: impl Into<LocateKey>, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.strategy.keyed_exports.push((export_type::<T, I, F>(cast), key.into()));
        self
    }

    pub fn export_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.strategy.names.push(name.into());
        self
    }

    /// Declares `I` as a base type, indexed when the container exports as base types.
    pub fn base_type<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.strategy.base_types.push(export_type::<T, I, F>(cast));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.strategy.priority = priority;
        self
    }

    pub fn when<C: Condition + 'static>(mut self, condition: C) -> Self {
        self.strategy.conditions.push(Arc::new(condition));
        self
    }

    pub fn lifestyle(mut self, lifestyle: Arc<dyn Lifestyle>) -> Self {
        self.strategy.lifestyle = Some(lifestyle);
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.strategy.lifestyle = lifetime.lifestyle();
        self
    }

    /// Replaces every activated instance, before the lifestyle memoizes it.
    pub fn enrich_with<F>(mut self, enrich: F) -> Self
    where
        F: Fn(Arc<T>) -> Arc<T> + Send + Sync + 'static,
    {
        self.strategy.enrichments.push(Enrichment {
            function: enrich_fn::<T, F>(enrich),
            after_lifestyle: false,
        });
        self
    }

    /// Replaces every returned instance, including memoized ones.
    pub fn enrich_after_lifestyle<F>(mut self, enrich: F) -> Self
    where
        F: Fn(Arc<T>) -> Arc<T> + Send + Sync + 'static,
    {
        self.strategy.enrichments.push(Enrichment {
            function: enrich_fn::<T, F>(enrich),
            after_lifestyle: true,
        });
        self
    }

    /// Runs `action` on every freshly activated instance.
    pub fn apply<F>(mut self, action: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let action: ActivationAction = Arc::new(move |instance: &AnyArc| {
            let value = unerase::<T>(instance).ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))?;
            action(&value);
            Ok(())
        });
        self.strategy.actions.push(action);
        self
    }

    /// Tracks activated instances for disposal through [`Dispose`].
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.strategy.disposer = Some(dispose_fn::<T>());
        self
    }

    /// Tracks activated instances for disposal through a closure.
    pub fn dispose_with<F>(mut self, dispose: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.strategy.disposer = Some(typed_callback::<T, F>(dispose));
        self
    }

    /// Runs just before the instance is disposed.
    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let cleanup: CleanupFn = typed_callback::<T, F>(cleanup);
        self.strategy.cleanup = Some(cleanup);
        if self.strategy.disposer.is_none() {
            self.strategy.disposer = Some(Arc::new(|_: &AnyArc| {}));
        }
        self
    }

    /// Fails activation when no disposal scope is available to track the instance.
    pub fn disposal_required(mut self) -> Self {
        self.strategy.disposal_required = true;
        self
    }

    /// The container never disposes instances of this strategy.
    pub fn externally_owned(mut self) -> Self {
        self.strategy.externally_owned = true;
        self
    }

    pub fn finish(self) -> ActivationStrategy {
        let mut strategy = self.strategy;
        if let Some(activator) = self.activator {
            let finisher: Finisher = Arc::new(|raw: Box<dyn Any + Send + Sync>| {
                raw.downcast::<T>()
                    .map(|value| erase(Arc::<T>::from(value)))
                    .map_err(|_| DiError::type_mismatch(std::any::type_name::<T>()))
            });
            strategy.activation = Activation::Construct(Arc::new(ConstructionPlan {
                parameters: self.parameters,
                activator,
                finisher,
                members: self.members,
                methods: self.methods,
            }));
        } else if !self.configured {
            tracing::debug!(activation = std::any::type_name::<T>(), "strategy finished without an activation");
        }
        strategy
    }
}

fn export_type<T, I, F>(cast: F) -> ExportType
where
    T: Send + Sync + 'static,
    I: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
{
    let caster: Caster = Arc::new(move |instance: AnyArc| {
        let value = unerase::<T>(&instance).ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))?;
        Ok(erase(cast(value)))
    });
    ExportType {
        key: TypeKey::of::<I>(),
        cast: Some(caster),
    }
}

fn enrich_fn<T, F>(enrich: F) -> super::EnrichFn
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<T> + Send + Sync + 'static,
{
    Arc::new(move |instance: AnyArc| {
        let value = unerase::<T>(&instance).ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>()))?;
        Ok(erase(enrich(value)))
    })
}

fn typed_callback<T, F>(callback: F) -> DisposeFn
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |instance: &AnyArc| {
        if let Some(value) = unerase::<T>(instance) {
            callback(&value);
        }
    })
}
