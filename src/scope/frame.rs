use std::cell::Cell;
use std::fmt;

use super::LifetimeScope;
use crate::context::InjectionContext;
use crate::disposal::DisposalScope;
use crate::error::{DiError, DiResult, LocationTrail};
use crate::key::{LocateKey, TypeKey};
use crate::strategy::StrategyFilter;
use crate::traits::LocatorCore;
use crate::value::AnyArc;

thread_local! {
    static NESTED_LOCATES: Cell<usize> = const { Cell::new(0) };
}

/// Bounds locates made from inside factories, which the compiler cannot see.
struct NestingGuard;

impl NestingGuard {
    fn enter(limit: usize, type_key: &TypeKey) -> DiResult<Self> {
        let depth = NESTED_LOCATES.with(|nested| {
            let depth = nested.get() + 1;
            nested.set(depth);
            depth
        });
        let guard = NestingGuard;
        if depth > limit {
            return Err(DiError::GraphTooDeep {
                depth,
                limit,
                requested: type_key.name(),
                trail: LocationTrail::new(),
            });
        }
        Ok(guard)
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTED_LOCATES.with(|nested| nested.set(nested.get().saturating_sub(1)));
    }
}

/// The environment one activation runs in.
///
/// Factories receive a frame and can locate further dependencies through
/// it; those locates share the frame's object graph and disposal scope.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator};
///
/// struct Port(u16);
/// struct Server { port: u16 }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_singleton(Port(8080));
///     r.add_transient_factory::<Server, _>(|frame| {
///         Ok(Server { port: frame.locate::<Port>()?.0 })
///     });
/// }).unwrap();
///
/// assert_eq!(container.locate::<Server>().unwrap().port, 8080);
/// ```
#[derive(Clone, Copy)]
pub struct ActivationFrame<'a> {
    scope: &'a LifetimeScope,
    disposal: Option<&'a DisposalScope>,
    context: &'a InjectionContext,
}

impl<'a> ActivationFrame<'a> {
    pub fn new(scope: &'a LifetimeScope, disposal: Option<&'a DisposalScope>, context: &'a InjectionContext) -> Self {
        Self {
            scope,
            disposal,
            context,
        }
    }

    /// The lifetime scope the activation runs in.
    pub fn scope(&self) -> &'a LifetimeScope {
        self.scope
    }

    /// Where new disposable instances are tracked, if anywhere.
    pub fn disposal_scope(&self) -> Option<&'a DisposalScope> {
        self.disposal
    }

    pub fn context(&self) -> &'a InjectionContext {
        self.context
    }
}

impl LocatorCore for ActivationFrame<'_> {
    fn locate_value(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        context: Option<&InjectionContext>,
    ) -> DiResult<Option<AnyArc>> {
        let limit = self.scope.injection_scope().configuration().max_object_graph_depth;
        let _guard = NestingGuard::enter(limit, type_key)?;
        self.scope
            .activate(type_key, key, filter, self.disposal, context.unwrap_or(self.context))
    }

    fn can_locate(&self, type_key: &TypeKey, key: Option<&LocateKey>) -> bool {
        self.scope.can_locate(type_key, key)
    }
}

impl fmt::Debug for ActivationFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationFrame")
            .field("scope", self.scope)
            .field("tracks_disposal", &self.disposal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::scope::Container;
    use crate::traits::Locator;

    struct Node;

    #[test]
    fn factory_recursion_is_bounded() {
        let container = Container::with_configuration(
            crate::ContainerConfiguration::default().with_max_object_graph_depth(8),
        );
        container
            .configure(|r| {
                r.add_transient_factory::<Node, _>(|frame| {
                    frame.locate::<Node>()?;
                    Ok(Node)
                });
            })
            .unwrap();

        let error = container.locate::<Node>().err().unwrap();
        assert_eq!(error.kind(), ErrorKind::GraphTooDeep);
        NESTED_LOCATES.with(|nested| assert_eq!(nested.get(), 0));
    }

    #[test]
    fn singleton_factory_locating_itself_fails_instead_of_blocking() {
        let container = Container::new();
        container
            .configure(|r| {
                r.add_singleton_factory::<Node, _>(|frame| {
                    frame.locate::<Node>()?;
                    Ok(Node)
                });
            })
            .unwrap();

        for _ in 0..2 {
            let error = container.locate::<Node>().err().unwrap();
            assert_eq!(error.kind(), ErrorKind::GeneralLocateFailure);
            assert!(error.to_string().contains("depends on itself"), "{error}");
        }
        NESTED_LOCATES.with(|nested| assert_eq!(nested.get(), 0));
    }

    #[test]
    fn frame_exposes_its_parts() {
        let container = Container::new();
        let context = InjectionContext::new();
        let scope = container.root_scope();
        let frame = ActivationFrame::new(scope, None, &context);

        assert!(frame.disposal_scope().is_none());
        assert!(std::ptr::eq(frame.scope(), scope));
        assert!(!frame.can_locate(&TypeKey::of::<Node>(), None));
    }
}
