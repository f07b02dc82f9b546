use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::persistent::AtomicMap;

/// Named locks, created on first use and published lock-free.
///
/// The mutexes are reentrant: registration, providers and scoped
/// activation can re-enter the same lock on one thread while compiling
/// nested requests.
#[derive(Default)]
pub(crate) struct LockTable {
    locks: AtomicMap<Cow<'static, str>, Arc<ReentrantMutex<()>>>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The lock named `name`. Every caller asking for the same name gets
    /// the same mutex.
    pub(crate) fn get(&self, name: impl Into<Cow<'static, str>>) -> Arc<ReentrantMutex<()>> {
        let name = name.into();
        if let Some(lock) = self.locks.get(&name) {
            return lock;
        }
        self.locks
            .get_or_insert_with(name, || Arc::new(ReentrantMutex::new(())))
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable").field("locks", &self.len()).finish()
    }
}
