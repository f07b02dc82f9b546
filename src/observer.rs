//! Diagnostic observers for resolution events.
//!
//! Observers are attached through [`Registration::observer`](crate::Registration::observer)
//! and are notified on every top-level locate. When no observer is attached
//! the container skips the timing and notification work entirely.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::DiError;
use crate::key::TypeKey;

/// Hooks into the resolution pipeline.
///
/// Every method has an empty default, so implementations only override the
/// events they care about.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, Locator, ResolutionObserver, TypeKey};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl ResolutionObserver for Counter {
///     fn resolved(&self, _type_key: &TypeKey, _elapsed: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let container = Container::new();
/// container.configure(|r| {
///     r.add_singleton(7u32);
///     r.observer(counter.clone());
/// }).unwrap();
///
/// container.locate::<u32>().unwrap();
/// container.locate::<u32>().unwrap();
/// assert_eq!(counter.0.load(Ordering::Relaxed), 2);
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// A top-level locate is starting.
    fn resolving(&self, _type_key: &TypeKey) {}

    /// A top-level locate produced a value.
    fn resolved(&self, _type_key: &TypeKey, _elapsed: Duration) {}

    /// A new activation delegate was compiled and cached.
    fn compiled(&self, _type_key: &TypeKey) {}

    /// A top-level locate failed or found nothing.
    fn failed(&self, _type_key: &TypeKey, _error: &DiError) {}
}

/// Observers attached to one injection scope.
///
/// Readers load the list without locking; attaching an observer publishes
/// a new list.
#[derive(Default)]
pub(crate) struct Observers {
    observers: ArcSwap<Vec<Arc<dyn ResolutionObserver>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.rcu(|observers| {
            let mut observers = Vec::clone(observers);
            observers.push(observer.clone());
            observers
        });
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.load().is_empty()
    }

    /// A copy sharing the currently attached observers.
    pub(crate) fn snapshot(&self) -> Self {
        Self {
            observers: ArcSwap::new(self.observers.load_full()),
        }
    }

    #[inline]
    pub(crate) fn resolving(&self, type_key: &TypeKey) {
        for observer in self.observers.load().iter() {
            observer.resolving(type_key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, type_key: &TypeKey, elapsed: Duration) {
        for observer in self.observers.load().iter() {
            observer.resolved(type_key, elapsed);
        }
    }

    #[inline]
    pub(crate) fn compiled(&self, type_key: &TypeKey) {
        for observer in self.observers.load().iter() {
            observer.compiled(type_key);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, type_key: &TypeKey, error: &DiError) {
        for observer in self.observers.load().iter() {
            observer.failed(type_key, error);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers").field("count", &self.observers.load().len()).finish()
    }
}

/// Built-in observer forwarding events to `tracing`.
///
/// Successful resolutions are logged at `DEBUG`, compilations at `TRACE`
/// and failures at `WARN`, all under the `ferrous_ioc` target.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, TracingObserver};
/// use std::sync::Arc;
///
/// let container = Container::new();
/// container.configure(|r| {
///     r.observer(Arc::new(TracingObserver::new()));
/// }).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    label: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `container` field to every event, to tell containers apart.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

impl ResolutionObserver for TracingObserver {
    fn resolving(&self, type_key: &TypeKey) {
        tracing::trace!(target: "ferrous_ioc", container = self.label(), type_name = type_key.name(), "resolving");
    }

    fn resolved(&self, type_key: &TypeKey, elapsed: Duration) {
        tracing::debug!(
            target: "ferrous_ioc",
            container = self.label(),
            type_name = type_key.name(),
            elapsed_us = elapsed.as_micros() as u64,
            "resolved"
        );
    }

    fn compiled(&self, type_key: &TypeKey) {
        tracing::trace!(target: "ferrous_ioc", container = self.label(), type_name = type_key.name(), "compiled delegate");
    }

    fn failed(&self, type_key: &TypeKey, error: &DiError) {
        tracing::warn!(
            target: "ferrous_ioc",
            container = self.label(),
            type_name = type_key.name(),
            kind = ?error.kind(),
            error = %error,
            "resolution failed"
        );
    }
}
