//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections). Strategies built with
/// [`disposable`](crate::StrategyBuilder::disposable) register every activated instance
/// in the active [`DisposalScope`](crate::DisposalScope); hooks run in LIFO order when
/// the scope is disposed.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{ActivationStrategy, Container, Dispose, Lifetime, Locator};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static FLUSHED: AtomicBool = AtomicBool::new(false);
///
/// struct Cache;
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         FLUSHED.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.export(
///         ActivationStrategy::build::<Cache>()
///             .construct(|_| Ok(Cache))
///             .lifetime(Lifetime::Scoped)
///             .disposable()
///             .finish(),
///     );
/// }).unwrap();
///
/// let scope = container.begin_lifetime_scope(None);
/// let _cache = scope.locate::<Cache>().unwrap();
/// scope.dispose();
/// assert!(FLUSHED.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
