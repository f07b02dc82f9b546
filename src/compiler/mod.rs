//! The resolution engine.
//!
//! [`ActivationCompiler`] answers a request for a type by selecting a
//! strategy, building an activation expression for it and every dependency
//! below it, and lowering that expression into an [`ActivationDelegate`].
//! Delegates for unfiltered requests are cached per injection scope, so
//! each type is compiled roughly once.
//!
//! Lookup order for a request:
//!
//! 1. ambient values (`LifetimeScope`, `InjectionContext`, `TypedLocator`)
//! 2. the export container, by type and then by open generic definition
//!    (keyed requests use the key index)
//! 3. the wrapper container (`Func<T>`, `Lazy<T>`, `Owned<T>`, ...)
//! 4. collection synthesis for `Vec<Arc<T>>`
//! 5. missing-strategy providers, then one retry

mod expr;
mod missing;
mod request;

pub use missing::{MissingStrategyProvider, ProvidedStrategy};
pub use request::{InjectionTarget, Request, RequestKind, StaticInjectionContext};

use std::sync::Arc;

use self::expr::{Ambient, Construct, Expr, Test};
use crate::collection::{StrategyCollection, StrategyCollectionContainer};
use crate::context::InjectionContext;
use crate::disposal::DisposalScope;
use crate::error::{DiError, DiResult, LocationTrail};
use crate::key::{LocateKey, TypeKey};
use crate::lifestyle::InstanceKey;
use crate::scope::{InjectionScope, LifetimeScope};
use crate::strategy::{
    meets_conditions, Activation, ActivationStrategy, ConstructionPlan, DecoratorStrategy, Dependency, StrategyFilter,
};
use crate::value::AnyArc;
use crate::wrappers::{TypedLocator, WrapperKind};

/// A compiled activation: produces an instance for one request shape.
///
/// Delegates are scope independent. The lifetime scope, the disposal scope
/// to track new disposables in, and the injection context are supplied on
/// each call.
pub type ActivationDelegate =
    Arc<dyn Fn(&LifetimeScope, Option<&DisposalScope>, &InjectionContext) -> DiResult<AnyArc> + Send + Sync>;

pub(crate) fn activation_delegate<F>(delegate: F) -> ActivationDelegate
where
    F: Fn(&LifetimeScope, Option<&DisposalScope>, &InjectionContext) -> DiResult<AnyArc> + Send + Sync + 'static,
{
    Arc::new(delegate)
}

/// Lock serializing registration and missing-strategy providers.
pub(crate) const STRATEGY_ADD_LOCK: &str = "strategy-add";

/// Compiles requests against an [`InjectionScope`].
///
/// The compiler is stateless; everything it reads and caches lives in the
/// scope it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationCompiler;

impl ActivationCompiler {
    pub fn new() -> Self {
        Self
    }

    /// A root request for `type_key` at `depth`.
    pub fn create_new_request(&self, type_key: TypeKey, depth: usize) -> Request {
        Request::root(type_key, depth)
    }

    /// The delegate for a root request, from the cache when possible.
    ///
    /// Filtered requests bypass the cache. On a miss the delegate is
    /// compiled and stored in the cache generation that was current when
    /// the compile started; if another thread stored one first, that one
    /// is returned instead. `Ok(None)` means no strategy can satisfy the
    /// request. `allow_missing` enables missing-strategy providers.
    pub fn find_delegate(
        &self,
        scope: &InjectionScope,
        type_key: &TypeKey,
        filter: Option<&StrategyFilter>,
        key: Option<&LocateKey>,
        allow_missing: bool,
    ) -> DiResult<Option<ActivationDelegate>> {
        if filter.is_none() {
            let cached = match key {
                Some(key) => scope.cache().get_keyed(type_key, key),
                None => scope.cache().get(type_key),
            };
            if cached.is_some() {
                return Ok(cached);
            }
        }

        let generation = scope.cache().generation();
        let request = self
            .create_new_request(type_key.clone(), 1)
            .with_key(key.cloned())
            .with_filter(filter.cloned());
        let Some(delegate) = self.compile_delegate(scope, &request, allow_missing)? else {
            return Ok(None);
        };
        scope.cache().record_compile();
        scope.observers().compiled(type_key);

        if filter.is_some() {
            return Ok(Some(delegate));
        }
        Ok(Some(generation.add(type_key, key, delegate)))
    }

    /// Compiles `request` without consulting the cache.
    pub fn compile_delegate(
        &self,
        scope: &InjectionScope,
        request: &Request,
        allow_missing: bool,
    ) -> DiResult<Option<ActivationDelegate>> {
        let located = self.locate_or_provide(scope, request, allow_missing)?;
        Ok(located.map(|expr| {
            tracing::debug!(
                requested = %request.activation_type(),
                key = ?request.key(),
                "compiled activation delegate"
            );
            expr::compile(expr, request.activation_type().clone())
        }))
    }

    /// Runs the scope's missing-strategy providers for `request`.
    ///
    /// Takes the scope's registration lock and re-checks the request first,
    /// since another thread may have satisfied it meanwhile. Returns true
    /// when the request can now be located.
    pub fn process_missing_strategy_providers(&self, scope: &InjectionScope, request: &Request) -> DiResult<bool> {
        let providers = scope.providers();
        if providers.is_empty() {
            return Ok(false);
        }

        let lock = scope.locks().get(STRATEGY_ADD_LOCK);
        let _guard = lock.lock();
        if self.locate_expression(scope, request)?.is_some() {
            return Ok(true);
        }

        let mut added = 0usize;
        for provider in providers.iter() {
            if !provider.can_locate(scope, request) {
                continue;
            }
            for provided in provider.provide(scope, request) {
                scope.add_provided(provided);
                added += 1;
            }
        }
        tracing::debug!(requested = %request.activation_type(), added, "ran missing strategy providers");
        Ok(added > 0)
    }

    fn locate_or_provide(&self, scope: &InjectionScope, request: &Request, allow_missing: bool) -> DiResult<Option<Expr>> {
        if let Some(expr) = self.locate_expression(scope, request)? {
            return Ok(Some(expr));
        }
        if allow_missing
            && scope.configuration().auto_register_unknown
            && self.process_missing_strategy_providers(scope, request)?
        {
            return self.locate_expression(scope, request);
        }
        Ok(None)
    }

    fn locate_expression(&self, scope: &InjectionScope, request: &Request) -> DiResult<Option<Expr>> {
        let type_key = request.activation_type();
        if let Some(ambient) = ambient_for(type_key) {
            return Ok(Some(Expr::Ambient(ambient)));
        }
        if let Some(expr) = self.search_container(scope, scope.exports(), request, request.key())? {
            return Ok(Some(expr));
        }
        // Wrappers are key agnostic; the key applies to the wrapped value.
        if let Some(expr) = self.search_container(scope, scope.wrappers(), request, None)? {
            return Ok(Some(expr));
        }
        if let Some(element) = type_key.collection_element() {
            return self.collection_expression(scope, request, element.clone()).map(Some);
        }
        Ok(None)
    }

    fn search_container(
        &self,
        scope: &InjectionScope,
        container: &StrategyCollectionContainer<ActivationStrategy>,
        request: &Request,
        key: Option<&LocateKey>,
    ) -> DiResult<Option<Expr>> {
        let type_key = request.activation_type();
        if let Some(collection) = container.collection(type_key) {
            if let Some(expr) = self.select_from(scope, &collection, request, key)? {
                return Ok(Some(expr));
            }
        }
        if let Some(definition) = type_key.generic_definition() {
            if let Some(collection) = container.collection(&definition) {
                return self.select_from(scope, &collection, request, key);
            }
        }
        Ok(None)
    }

    fn select_from(
        &self,
        scope: &InjectionScope,
        collection: &StrategyCollection<ActivationStrategy>,
        request: &Request,
        key: Option<&LocateKey>,
    ) -> DiResult<Option<Expr>> {
        if let Some(key) = key {
            let Some(strategy) = collection.keyed_strategy(key) else {
                return Ok(None);
            };
            if request.filter().is_some_and(|filter| !filter(&*strategy)) {
                return Ok(None);
            }
            return self.compile_strategy(scope, &strategy, request);
        }

        if request.filter().is_none() {
            if let Some(primary) = collection.primary() {
                if let Some(expr) = self.compile_strategy(scope, &primary, request)? {
                    return Ok(Some(expr));
                }
            }
        }

        let strategies = collection.strategies();
        if strategies.is_empty() {
            return Ok(None);
        }
        let context = request.static_context();
        for strategy in strategies.iter() {
            if !meets_conditions(&**strategy, &context) {
                continue;
            }
            if request.filter().is_some_and(|filter| !filter(&**strategy)) {
                continue;
            }
            if let Some(expr) = self.compile_strategy(scope, strategy, request)? {
                return Ok(Some(expr));
            }
        }
        Ok(None)
    }

    fn compile_strategy(
        &self,
        scope: &InjectionScope,
        strategy: &Arc<ActivationStrategy>,
        request: &Request,
    ) -> DiResult<Option<Expr>> {
        match &strategy.activation {
            Activation::OpenGeneric(generic) => match generic.close(request.activation_type()) {
                Some(closed) => self.compile_strategy(scope, &closed, request),
                None => Ok(None),
            },
            Activation::Wrapper(kind) => self.wrapper_expression(scope, *kind, request),
            _ => self.activation_expression(scope, strategy, request).map(Some),
        }
    }

    /// Runs `body` for a nested request, enforcing the depth limit and
    /// recording the request's location on failure.
    fn guarded<T>(&self, scope: &InjectionScope, request: &Request, body: impl FnOnce() -> DiResult<T>) -> DiResult<T> {
        let limit = scope.configuration().max_object_graph_depth;
        let result = if request.depth() > limit {
            Err(DiError::GraphTooDeep {
                depth: request.depth(),
                limit,
                requested: request.activation_type().name(),
                trail: LocationTrail::new(),
            })
        } else {
            body()
        };
        result.map_err(|error| error.with_location(request.location()))
    }

    fn activation_expression(
        &self,
        scope: &InjectionScope,
        strategy: &ActivationStrategy,
        request: &Request,
    ) -> DiResult<Expr> {
        let activation_type = &strategy.activation_type;
        let activation = activation_type.name();

        let mut expr = match &strategy.activation {
            Activation::Construct(plan) => {
                Expr::Construct(Box::new(self.construct_expression(scope, strategy, plan, request)?))
            }
            Activation::Factory(function) => Expr::Factory {
                activation,
                function: function.clone(),
            },
            Activation::Instance(value) => Expr::Constant(value.clone()),
            Activation::OpenGeneric(_) | Activation::Wrapper(_) => {
                return Err(DiError::general(format!("{activation} cannot be activated directly")))
            }
        };

        let activated = matches!(strategy.activation, Activation::Construct(_) | Activation::Factory(_));
        if let Some(dispose) = strategy.disposer.as_ref().filter(|_| activated && !strategy.externally_owned) {
            let tracked = strategy.lifestyle.is_some()
                || strategy.disposal_required
                || scope.configuration().track_disposable_transients;
            if tracked {
                expr = Expr::TrackDisposal {
                    body: expr.boxed(),
                    activation,
                    dispose: dispose.clone(),
                    cleanup: strategy.cleanup.clone(),
                    required: strategy.disposal_required,
                };
            }
        }

        if !strategy.actions.is_empty() {
            expr = Expr::Block {
                result: expr.boxed(),
                statements: strategy.actions.clone(),
            };
        }
        for enrichment in strategy.enrichments.iter().filter(|e| !e.after_lifestyle) {
            expr = Expr::Call {
                function: enrichment.function.clone(),
                target: expr.boxed(),
            };
        }

        let before = self.phase_decorators(scope, activation_type, request, false);
        expr = self.apply_decorators(scope, expr, activation_type, request, before)?;

        let key = InstanceKey::new(strategy.id).owned_by(strategy.origin);
        if let Some(lifestyle) = &strategy.lifestyle {
            expr = Expr::Lifestyle {
                lifestyle: lifestyle.clone(),
                key: key.clone(),
                body: expr.boxed(),
            };
        }
        for enrichment in strategy.enrichments.iter().filter(|e| e.after_lifestyle) {
            expr = Expr::Call {
                function: enrichment.function.clone(),
                target: expr.boxed(),
            };
        }
        let after = self.phase_decorators(scope, activation_type, request, true);
        expr = self.apply_decorators(scope, expr, activation_type, request, after)?;

        let requested = request.activation_type();
        if requested == activation_type {
            return Ok(expr);
        }
        if let Some(cast) = strategy.cast_for(requested) {
            expr = Expr::Call {
                function: cast,
                target: expr.boxed(),
            };
        }

        // A decorated export type is memoized on its own, so the lifestyle
        // also covers its before-lifestyle decorators.
        let before = self.phase_decorators(scope, requested, request, false);
        if !before.is_empty() {
            expr = self.apply_decorators(scope, expr, requested, request, before)?;
            if let Some(lifestyle) = &strategy.lifestyle {
                expr = Expr::Lifestyle {
                    lifestyle: lifestyle.clone(),
                    key: key.for_view(requested.clone()),
                    body: expr.boxed(),
                };
            }
        }
        let after = self.phase_decorators(scope, requested, request, true);
        self.apply_decorators(scope, expr, requested, request, after)
    }

    fn construct_expression(
        &self,
        scope: &InjectionScope,
        strategy: &ActivationStrategy,
        plan: &Arc<ConstructionPlan>,
        request: &Request,
    ) -> DiResult<Construct> {
        let declaring = &strategy.activation_type;
        let dependencies = |dependencies: &[Dependency], kind: RequestKind| -> DiResult<Vec<Expr>> {
            dependencies
                .iter()
                .map(|dependency| self.dependency_expression(scope, request, dependency, kind, declaring))
                .collect()
        };

        let arguments = dependencies(&plan.parameters, RequestKind::ConstructorParameter)?;
        let members = plan
            .members
            .iter()
            .map(|member| -> DiResult<_> {
                let value = self.dependency_expression(scope, request, &member.dependency, RequestKind::Member, declaring)?;
                Ok((member.setter.clone(), value))
            })
            .collect::<DiResult<Vec<_>>>()?;
        let methods = plan
            .methods
            .iter()
            .map(|method| -> DiResult<_> {
                Ok((method.invoke.clone(), dependencies(&method.parameters, RequestKind::MethodParameter)?))
            })
            .collect::<DiResult<Vec<_>>>()?;

        Ok(Construct {
            activation: declaring.name(),
            plan: plan.clone(),
            arguments,
            members,
            methods,
        })
    }

    fn dependency_expression(
        &self,
        scope: &InjectionScope,
        parent: &Request,
        dependency: &Dependency,
        kind: RequestKind,
        declaring: &TypeKey,
    ) -> DiResult<Expr> {
        let request = parent.dependency(dependency, kind, declaring);
        let located = self.guarded(scope, &request, || self.locate_or_provide(scope, &request, true))?;

        let body = match located {
            Some(expr) => expr,
            None => {
                if let Some(default) = dependency.default_value() {
                    return Ok(Expr::Constant(default.clone()));
                }
                let type_key = dependency.type_key().clone();
                let name = dependency.target_name().cloned();
                let otherwise = if dependency.is_required() {
                    Expr::Missing(type_key.clone())
                } else {
                    Expr::Null
                };
                Expr::If {
                    test: Test::ContextHas {
                        name: name.clone(),
                        type_key: type_key.clone(),
                    },
                    then: Expr::ContextValue { name, type_key }.boxed(),
                    otherwise: otherwise.boxed(),
                }
            }
        };
        Ok(Expr::TryCatch {
            body: body.boxed(),
            location: request.location(),
        })
    }

    fn collection_expression(&self, scope: &InjectionScope, request: &Request, element: TypeKey) -> DiResult<Expr> {
        let element_request = request.nested(element.clone(), RequestKind::CollectionElement);
        self.guarded(scope, &element_request, || {
            let exports = scope.exports();
            let mut candidates: Vec<Arc<ActivationStrategy>> = Vec::new();
            let definition = element.generic_definition();
            for collection in [Some(element.clone()), definition]
                .into_iter()
                .flatten()
                .filter_map(|type_key| exports.collection(&type_key))
            {
                match request.key() {
                    Some(key) => candidates.extend(collection.keyed_strategies(key)),
                    None => candidates.extend(collection.strategies().iter().cloned()),
                }
            }

            let context = element_request.static_context();
            let mut seen: Vec<u64> = Vec::with_capacity(candidates.len());
            let mut items = Vec::with_capacity(candidates.len());
            for strategy in candidates {
                if seen.contains(&strategy.id) {
                    continue;
                }
                seen.push(strategy.id);
                if !meets_conditions(&*strategy, &context) {
                    continue;
                }
                if request.filter().is_some_and(|filter| !filter(&*strategy)) {
                    continue;
                }
                if let Some(expr) = self.compile_strategy(scope, &strategy, &element_request)? {
                    items.push(Expr::TryCatch {
                        body: expr.boxed(),
                        location: element_request.location(),
                    });
                }
            }
            tracing::trace!(element = %element, items = items.len(), "synthesized collection");
            Ok(Expr::Collection {
                items,
                comparer: request.comparer().cloned(),
            })
        })
    }

    fn wrapper_expression(&self, scope: &InjectionScope, kind: WrapperKind, request: &Request) -> DiResult<Option<Expr>> {
        let Some(inner_type) = request.activation_type().generic_arguments().first().cloned() else {
            return Ok(None);
        };
        let inner = request.nested(inner_type, RequestKind::Wrapped);
        let located = self.guarded(scope, &inner, || self.locate_or_provide(scope, &inner, true))?;
        Ok(located.map(|body| Expr::Wrapper {
            kind,
            delegate: expr::compile(body, inner.activation_type().clone()),
        }))
    }

    /// Wraps `expr` in the decorators registered for `decorated`.
    ///
    /// `phase` selects before-lifestyle (`Some(false)`) or after-lifestyle
    /// (`Some(true)`) decorators; `None` applies both, before ones first.
    /// Within a phase the lowest priority is innermost.
    /// Decorators for `decorated` that run before (`after == false`) or
    /// after the lifestyle, innermost first.
    fn phase_decorators(
        &self,
        scope: &InjectionScope,
        decorated: &TypeKey,
        request: &Request,
        after: bool,
    ) -> Vec<Arc<DecoratorStrategy>> {
        let mut decorators = self.decorators_for(scope, decorated, request);
        decorators.retain(|decorator| decorator.apply_after_lifestyle == after);
        decorators.sort_by_key(|decorator| (decorator.priority, decorator.id));
        decorators
    }

    fn apply_decorators(
        &self,
        scope: &InjectionScope,
        mut expr: Expr,
        decorated: &TypeKey,
        request: &Request,
        decorators: Vec<Arc<DecoratorStrategy>>,
    ) -> DiResult<Expr> {
        for decorator in decorators {
            let arguments = decorator
                .parameters
                .iter()
                .map(|parameter| {
                    self.dependency_expression(scope, request, parameter, RequestKind::DecoratorParameter, decorated)
                })
                .collect::<DiResult<Vec<_>>>()?;
            expr = Expr::Decorate {
                owner: decorated.name(),
                decorate: decorator.decorate.clone(),
                target: expr.boxed(),
                arguments,
            };
        }
        Ok(expr)
    }

    fn decorators_for(&self, scope: &InjectionScope, decorated: &TypeKey, request: &Request) -> Vec<Arc<DecoratorStrategy>> {
        let container = scope.decorators();
        let collections: Vec<_> = [Some(decorated.clone()), decorated.generic_definition()]
            .into_iter()
            .flatten()
            .filter_map(|type_key| container.collection(&type_key))
            .collect();
        if collections.is_empty() {
            return Vec::new();
        }

        let context = request.static_context();
        collections
            .iter()
            .flat_map(|collection| collection.strategies().to_vec())
            .filter(|decorator| meets_conditions(&**decorator, &context))
            .collect()
    }
}

fn ambient_for(type_key: &TypeKey) -> Option<Ambient> {
    if *type_key == TypeKey::of::<LifetimeScope>() {
        Some(Ambient::Scope)
    } else if *type_key == TypeKey::of::<InjectionContext>() {
        Some(Ambient::Context)
    } else if *type_key == TypeKey::of::<TypedLocator>() {
        Some(Ambient::Locator)
    } else {
        None
    }
}
