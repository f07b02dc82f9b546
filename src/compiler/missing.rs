use crate::compiler::Request;
use crate::scope::InjectionScope;
use crate::strategy::{ActivationStrategy, DecoratorStrategy};

/// A strategy produced on demand for a request nothing else could satisfy.
#[derive(Debug)]
pub enum ProvidedStrategy {
    /// Added to the export container.
    Export(ActivationStrategy),
    /// Added to the wrapper container.
    Wrapper(ActivationStrategy),
    Decorator(DecoratorStrategy),
}

/// Supplies strategies for requests with no registered strategy.
///
/// Providers run under the scope's registration lock, after the engine has
/// re-checked that the request is still unsatisfied. Whatever they produce
/// is registered permanently, and the request is retried once.
///
/// Closures taking a [`Request`] implement this trait and accept every
/// request.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ActivationStrategy, Container, Locator, ProvidedStrategy, Request, TypeKey};
///
/// #[derive(Default)]
/// struct Settings { retries: u32 }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.missing_strategy_provider(|request: &Request| {
///         if *request.activation_type() == TypeKey::of::<Settings>() {
///             vec![ProvidedStrategy::Export(
///                 ActivationStrategy::build::<Settings>().construct(|_| Ok(Settings::default())).finish(),
///             )]
///         } else {
///             Vec::new()
///         }
///     });
/// }).unwrap();
///
/// assert_eq!(container.locate::<Settings>().unwrap().retries, 0);
/// ```
pub trait MissingStrategyProvider: Send + Sync {
    /// Cheap pre-check; `provide` is only called when this returns true.
    fn can_locate(&self, _scope: &InjectionScope, _request: &Request) -> bool {
        true
    }

    fn provide(&self, scope: &InjectionScope, request: &Request) -> Vec<ProvidedStrategy>;
}

impl<F> MissingStrategyProvider for F
where
    F: Fn(&Request) -> Vec<ProvidedStrategy> + Send + Sync,
{
    fn provide(&self, _scope: &InjectionScope, request: &Request) -> Vec<ProvidedStrategy> {
        self(request)
    }
}
