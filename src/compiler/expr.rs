//! Activation IR and its lowering into closures.
//!
//! The compiler builds an [`Expr`] tree for a request, then [`lower`]s it
//! once into a tree of [`Node`] closures. Running a node performs no
//! strategy lookup: every dependency was resolved while building the tree.
//! A node yields `None` when an optional value is absent.

use std::borrow::Cow;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{activation_delegate, ActivationDelegate};
use crate::context::InjectionContext;
use crate::disposal::{CleanupFn, DisposalScope, DisposeFn};
use crate::error::{DiError, DiResult, LocationInfo, LocationTrail};
use crate::key::TypeKey;
use crate::lifestyle::{InstanceKey, Lifestyle};
use crate::scope::{ActivationFrame, LifetimeScope};
use crate::strategy::{
    ActivationAction, Arguments, ConstructionPlan, DecorateFn, EnrichFn, FactoryFn, InstanceComparer, MemberSetter,
    MethodInvoker,
};
use crate::value::{erase, AnyArc};
use crate::wrappers::{BoundDelegate, InstanceCollection, LazyValue, OwnedValue, TypedLocator, WrapperKind};

/// A lowered expression.
pub(crate) type Node = Arc<dyn Fn(&ActivationFrame<'_>) -> DiResult<Option<AnyArc>> + Send + Sync>;

fn node<F>(evaluate: F) -> Node
where
    F: Fn(&ActivationFrame<'_>) -> DiResult<Option<AnyArc>> + Send + Sync + 'static,
{
    Arc::new(evaluate)
}

/// Values the frame supplies directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ambient {
    Scope,
    Context,
    Locator,
}

/// Runtime tests for [`Expr::If`].
#[derive(Debug, Clone)]
pub(crate) enum Test {
    /// The injection context can supply the value.
    ContextHas {
        name: Option<Cow<'static, str>>,
        type_key: TypeKey,
    },
}

/// Constructor call plus member assignments and method calls.
pub(crate) struct Construct {
    pub(crate) activation: &'static str,
    pub(crate) plan: Arc<ConstructionPlan>,
    pub(crate) arguments: Vec<Expr>,
    pub(crate) members: Vec<(MemberSetter, Expr)>,
    pub(crate) methods: Vec<(MethodInvoker, Vec<Expr>)>,
}

pub(crate) enum Expr {
    Constant(AnyArc),
    Null,
    Ambient(Ambient),
    Construct(Box<Construct>),
    Factory {
        activation: &'static str,
        function: FactoryFn,
    },
    /// Applies a function to the value of `target`.
    Call {
        function: EnrichFn,
        target: Box<Expr>,
    },
    Decorate {
        owner: &'static str,
        decorate: DecorateFn,
        target: Box<Expr>,
        arguments: Vec<Expr>,
    },
    If {
        test: Test,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    ContextValue {
        name: Option<Cow<'static, str>>,
        type_key: TypeKey,
    },
    Missing(TypeKey),
    /// Appends `location` to any error raised by `body`.
    TryCatch {
        body: Box<Expr>,
        location: LocationInfo,
    },
    /// Runs `statements` against the value of `result`.
    Block {
        result: Box<Expr>,
        statements: Vec<ActivationAction>,
    },
    Lifestyle {
        lifestyle: Arc<dyn Lifestyle>,
        key: InstanceKey,
        body: Box<Expr>,
    },
    TrackDisposal {
        body: Box<Expr>,
        activation: &'static str,
        dispose: DisposeFn,
        cleanup: Option<CleanupFn>,
        required: bool,
    },
    Collection {
        items: Vec<Expr>,
        comparer: Option<InstanceComparer>,
    },
    Wrapper {
        kind: WrapperKind,
        delegate: ActivationDelegate,
    },
}

impl Expr {
    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

fn lower_all(exprs: Vec<Expr>) -> Vec<Node> {
    exprs.into_iter().map(lower).collect()
}

fn evaluate_all(nodes: &[Node], frame: &ActivationFrame<'_>) -> DiResult<SmallVec<[Option<AnyArc>; 4]>> {
    nodes.iter().map(|node| node(frame)).collect()
}

fn no_value(activation: &'static str) -> DiError {
    DiError::general(format!("activation of {activation} produced no value"))
}

/// Lowers an expression tree into closures.
pub(crate) fn lower(expr: Expr) -> Node {
    match expr {
        Expr::Constant(value) => node(move |_| Ok(Some(value.clone()))),
        Expr::Null => node(|_| Ok(None)),
        Expr::Ambient(ambient) => node(move |frame| {
            let value = match ambient {
                Ambient::Scope => erase(Arc::new(frame.scope().clone())),
                Ambient::Context => erase(Arc::new(frame.context().clone())),
                Ambient::Locator => erase(Arc::new(TypedLocator::new(
                    frame.scope().clone(),
                    frame.context().clone(),
                ))),
            };
            Ok(Some(value))
        }),
        Expr::Construct(construct) => lower_construct(*construct),
        Expr::Factory { activation, function } => node(move |frame| {
            let value = function(frame)?;
            tracing::trace!(activation, "factory activated");
            Ok(Some(value))
        }),
        Expr::Call { function, target } => {
            let target = lower(*target);
            node(move |frame| match target(frame)? {
                Some(value) => function(value).map(Some),
                None => Ok(None),
            })
        }
        Expr::Decorate {
            owner,
            decorate,
            target,
            arguments,
        } => {
            let target = lower(*target);
            let arguments = lower_all(arguments);
            node(move |frame| {
                let Some(value) = target(frame)? else {
                    return Ok(None);
                };
                let arguments = Arguments::new(owner, evaluate_all(&arguments, frame)?);
                decorate(value, &arguments).map(Some)
            })
        }
        Expr::If { test, then, otherwise } => {
            let then = lower(*then);
            let otherwise = lower(*otherwise);
            node(move |frame| {
                let passed = match &test {
                    Test::ContextHas { name, type_key } => frame.context().contains(name.as_deref(), type_key),
                };
                if passed {
                    then(frame)
                } else {
                    otherwise(frame)
                }
            })
        }
        Expr::ContextValue { name, type_key } => {
            node(move |frame| frame.context().find_value(name.as_deref(), &type_key))
        }
        Expr::Missing(type_key) => node(move |_| Err(DiError::missing(&type_key))),
        Expr::TryCatch { body, location } => {
            let body = lower(*body);
            node(move |frame| body(frame).map_err(|error| error.with_location(location.clone())))
        }
        Expr::Block { result, statements } => {
            let result = lower(*result);
            node(move |frame| {
                let value = result(frame)?;
                if let Some(value) = &value {
                    for statement in &statements {
                        statement(value)?;
                    }
                }
                Ok(value)
            })
        }
        Expr::Lifestyle { lifestyle, key, body } => {
            let body = lower(*body);
            node(move |frame| {
                let create = |inner: &ActivationFrame<'_>| body(inner)?.ok_or_else(|| no_value(lifestyle.description()));
                lifestyle.activate(frame, &key, &create).map(Some)
            })
        }
        Expr::TrackDisposal {
            body,
            activation,
            dispose,
            cleanup,
            required,
        } => {
            let body = lower(*body);
            node(move |frame| {
                let value = body(frame)?;
                if let Some(instance) = &value {
                    match frame.disposal_scope() {
                        Some(disposal) => disposal.add_disposable(instance.clone(), dispose.clone(), cleanup.clone()),
                        None if required => {
                            return Err(DiError::DisposalScopeMissing {
                                activation,
                                trail: LocationTrail::new(),
                            })
                        }
                        None => tracing::trace!(activation, "no disposal scope; instance left untracked"),
                    }
                }
                Ok(value)
            })
        }
        Expr::Collection { items, comparer } => {
            let items = lower_all(items);
            node(move |frame| {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    if let Some(value) = item(frame)? {
                        values.push(value);
                    }
                }
                if let Some(comparer) = &comparer {
                    values.sort_by(|a, b| comparer(a, b));
                }
                Ok(Some(erase(Arc::new(InstanceCollection(values)))))
            })
        }
        Expr::Wrapper { kind, delegate } => lower_wrapper(kind, delegate),
    }
}

fn lower_construct(construct: Construct) -> Node {
    let Construct {
        activation,
        plan,
        arguments,
        members,
        methods,
    } = construct;
    let arguments = lower_all(arguments);
    let members: Vec<(MemberSetter, Node)> = members.into_iter().map(|(setter, expr)| (setter, lower(expr))).collect();
    let methods: Vec<(MethodInvoker, Vec<Node>)> = methods
        .into_iter()
        .map(|(invoke, parameters)| (invoke, lower_all(parameters)))
        .collect();

    node(move |frame| {
        let constructor_arguments = Arguments::new(activation, evaluate_all(&arguments, frame)?);
        let mut raw = (plan.activator)(&constructor_arguments)?;
        for (setter, member) in &members {
            if let Some(value) = member(frame)? {
                setter(&mut *raw, &value)?;
            }
        }
        for (invoke, parameters) in &methods {
            let method_arguments = Arguments::new(activation, evaluate_all(parameters, frame)?);
            invoke(&mut *raw, &method_arguments)?;
        }
        (plan.finisher)(raw).map(Some)
    })
}

fn bind(delegate: &ActivationDelegate, frame: &ActivationFrame<'_>) -> BoundDelegate {
    BoundDelegate::new(
        delegate.clone(),
        frame.scope().clone(),
        frame.disposal_scope().cloned(),
        frame.context().clone(),
    )
}

fn lower_wrapper(kind: WrapperKind, delegate: ActivationDelegate) -> Node {
    match kind {
        WrapperKind::Func | WrapperKind::FuncWithContext => {
            node(move |frame| Ok(Some(erase(Arc::new(bind(&delegate, frame))))))
        }
        WrapperKind::Lazy => node(move |frame| Ok(Some(erase(Arc::new(LazyValue::new(bind(&delegate, frame))))))),
        WrapperKind::Owned => node(move |frame| {
            let disposal = DisposalScope::new();
            let value = delegate(frame.scope(), Some(&disposal), frame.context())?;
            if let Some(parent) = frame.disposal_scope() {
                parent.track_scope(&disposal);
            }
            Ok(Some(erase(Arc::new(OwnedValue { value, disposal }))))
        }),
    }
}

/// Lowers `expr` into a delegate producing an instance for `requested`.
pub(crate) fn compile(expr: Expr, requested: TypeKey) -> ActivationDelegate {
    let root = lower(expr);
    activation_delegate(
        move |scope: &LifetimeScope, disposal: Option<&DisposalScope>, context: &InjectionContext| {
            let frame = ActivationFrame::new(scope, disposal, context);
            root(&frame)?.ok_or_else(|| DiError::missing(&requested))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RequestKind;
    use crate::error::ErrorKind;
    use crate::scope::Container;
    use crate::value::unerase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(expr: Expr, context: &InjectionContext) -> DiResult<Option<AnyArc>> {
        let container = Container::new();
        let scope = container.root_scope();
        let frame = ActivationFrame::new(scope, Some(scope.disposal_scope()), context);
        lower(expr)(&frame)
    }

    fn constant(value: u32) -> Expr {
        Expr::Constant(erase(Arc::new(value)))
    }

    fn location() -> LocationInfo {
        LocationInfo {
            declaring_type: "Service",
            member: Some("port".into()),
            kind: RequestKind::ConstructorParameter,
            requested_type: "u16",
            key: None,
        }
    }

    #[test]
    fn call_skips_absent_values() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let function: EnrichFn = Arc::new(move |value: AnyArc| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        });
        let expr = Expr::Call {
            function,
            target: Expr::Null.boxed(),
        };
        assert!(run(expr, &InjectionContext::new()).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn if_consults_context() {
        let type_key = TypeKey::of::<u16>();
        let expr = || Expr::If {
            test: Test::ContextHas {
                name: Some("port".into()),
                type_key: type_key.clone(),
            },
            then: Expr::ContextValue {
                name: Some("port".into()),
                type_key: type_key.clone(),
            }
            .boxed(),
            otherwise: Expr::Missing(type_key.clone()).boxed(),
        };

        let context = InjectionContext::new().with_named("port", Arc::new(8080_u16));
        let value = run(expr(), &context).unwrap().unwrap();
        assert_eq!(*unerase::<u16>(&value).unwrap(), 8080);

        let error = run(expr(), &InjectionContext::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingDependency);
    }

    #[test]
    fn try_catch_appends_location() {
        let expr = Expr::TryCatch {
            body: Expr::Missing(TypeKey::of::<u16>()).boxed(),
            location: location(),
        };
        let error = run(expr, &InjectionContext::new()).unwrap_err();
        assert_eq!(error.trail().unwrap().len(), 1);
        assert!(error.to_string().contains("'port'"));
    }

    #[test]
    fn collection_sorts_and_drops_absent_items() {
        let comparer: InstanceComparer = Arc::new(|a: &AnyArc, b: &AnyArc| {
            unerase::<u32>(b).unwrap().cmp(&unerase::<u32>(a).unwrap())
        });
        let expr = Expr::Collection {
            items: vec![constant(1), Expr::Null, constant(3), constant(2)],
            comparer: Some(comparer),
        };
        let value = run(expr, &InjectionContext::new()).unwrap().unwrap();
        let collection = unerase::<InstanceCollection>(&value).unwrap();
        let numbers: Vec<u32> = collection.0.iter().map(|v| *unerase::<u32>(v).unwrap()).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[test]
    fn required_tracking_without_disposal_scope_fails() {
        let container = Container::new();
        let context = InjectionContext::new();
        let frame = ActivationFrame::new(container.root_scope(), None, &context);
        let expr = Expr::TrackDisposal {
            body: constant(1).boxed(),
            activation: "u32",
            dispose: Arc::new(|_: &AnyArc| {}),
            cleanup: None,
            required: true,
        };
        let error = lower(expr)(&frame).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisposalScopeMissing);
    }

    #[test]
    fn block_runs_statements_in_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let first_seen = seen.clone();
        let second_seen = seen.clone();
        let first: ActivationAction = Arc::new(move |_: &AnyArc| {
            first_seen.lock().push("first");
            Ok(())
        });
        let second: ActivationAction = Arc::new(move |_: &AnyArc| {
            second_seen.lock().push("second");
            Ok(())
        });
        let expr = Expr::Block {
            result: constant(5).boxed(),
            statements: vec![first, second],
        };
        run(expr, &InjectionContext::new()).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }
}
