//! Lock-free disposal tracking.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::traits::Dispose;
use crate::value::{erase, unerase, AnyArc};

/// Callback that disposes an erased instance.
pub type DisposeFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// Callback run on an erased instance just before it is disposed.
pub type CleanupFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;

struct Entry {
    instance: AnyArc,
    dispose: DisposeFn,
    cleanup: Option<CleanupFn>,
    next: Option<Arc<Entry>>,
}

/// Registry of instances to dispose when a scope ends.
///
/// Entries are kept in a singly linked list whose head is swapped in with
/// compare-and-swap, so tracking never takes a lock. [`dispose`] detaches
/// the whole list at once and walks it most recent first: every entry's
/// cleanup callback runs right before its dispose callback.
///
/// [`dispose`]: DisposalScope::dispose
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{DisposalScope, Dispose};
/// use std::sync::{Arc, Mutex};
///
/// struct Connection(&'static str, Arc<Mutex<Vec<&'static str>>>);
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         self.1.lock().unwrap().push(self.0);
///     }
/// }
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let scope = DisposalScope::new();
/// scope.track(Arc::new(Connection("first", log.clone())));
/// scope.track(Arc::new(Connection("second", log.clone())));
/// scope.dispose();
///
/// assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
/// ```
#[derive(Clone, Default)]
pub struct DisposalScope {
    head: Arc<ArcSwapOption<Entry>>,
}

impl DisposalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks an erased instance with its dispose and optional cleanup callbacks.
    pub fn add_disposable(&self, instance: AnyArc, dispose: DisposeFn, cleanup: Option<CleanupFn>) {
        self.head.rcu(|head| {
            Some(Arc::new(Entry {
                instance: instance.clone(),
                dispose: dispose.clone(),
                cleanup: cleanup.clone(),
                next: head.clone(),
            }))
        });
    }

    /// Tracks a typed disposable instance.
    pub fn track<T: Dispose>(&self, instance: Arc<T>) {
        self.add_disposable(erase(instance), dispose_fn::<T>(), None);
    }

    /// Tracks a nested disposal scope, disposed together with this one.
    pub fn track_scope(&self, nested: &DisposalScope) {
        self.add_disposable(erase(Arc::new(nested.clone())), dispose_fn::<DisposalScope>(), None);
    }

    /// Number of instances currently tracked.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut current = self.head.load_full();
        while let Some(entry) = current {
            count += 1;
            current = entry.next.clone();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }

    /// Disposes every tracked instance, most recently tracked first.
    ///
    /// The list is detached before it is walked, so instances tracked while
    /// disposal runs belong to the next call.
    pub fn dispose(&self) {
        let mut current = self.head.swap(None);
        let mut disposed = 0_usize;
        while let Some(entry) = current {
            if let Some(cleanup) = &entry.cleanup {
                cleanup(&entry.instance);
            }
            (entry.dispose)(&entry.instance);
            disposed += 1;
            current = entry.next.clone();
        }
        if disposed > 0 {
            tracing::trace!(disposed, "disposal scope released instances");
        }
    }
}

impl Dispose for DisposalScope {
    fn dispose(&self) {
        DisposalScope::dispose(self);
    }
}

impl fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalScope").field("tracked", &self.len()).finish()
    }
}

/// Builds a [`DisposeFn`] that calls [`Dispose::dispose`] on `T`.
pub fn dispose_fn<T: Dispose + ?Sized>() -> DisposeFn {
    Arc::new(|instance: &AnyArc| {
        if let Some(value) = unerase::<T>(instance) {
            value.dispose();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Probe(u32, Arc<Mutex<Vec<String>>>);

    impl Dispose for Probe {
        fn dispose(&self) {
            self.1.lock().unwrap().push(format!("dispose {}", self.0));
        }
    }

    #[test]
    fn cleanup_runs_before_dispose() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = DisposalScope::new();
        let cleanup_log = log.clone();
        let cleanup: CleanupFn = Arc::new(move |_| cleanup_log.lock().unwrap().push("cleanup".into()));

        scope.add_disposable(erase(Arc::new(Probe(1, log.clone()))), dispose_fn::<Probe>(), Some(cleanup));
        scope.dispose();

        assert_eq!(*log.lock().unwrap(), vec!["cleanup".to_string(), "dispose 1".to_string()]);
    }

    #[test]
    fn dispose_empties_the_scope() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = DisposalScope::new();
        scope.track(Arc::new(Probe(1, log.clone())));
        assert_eq!(scope.len(), 1);

        scope.dispose();
        scope.dispose();

        assert!(scope.is_empty());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn nested_scopes_dispose_with_parent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let parent = DisposalScope::new();
        let nested = DisposalScope::new();
        parent.track(Arc::new(Probe(1, log.clone())));
        parent.track_scope(&nested);
        nested.track(Arc::new(Probe(2, log.clone())));

        parent.dispose();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["dispose 2".to_string(), "dispose 1".to_string()]
        );
    }
}
