//! Ambient data available to a single resolution.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::TypeKey;
use crate::lifestyle::InstanceKey;
use crate::persistent::AtomicMap;
use crate::value::{erase, AnyArc};

type ContextFactory = Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>;

#[derive(Clone, Default)]
struct ExtraData {
    named: Vec<(Cow<'static, str>, TypeKey, AnyArc)>,
    typed: Vec<(TypeKey, AnyArc)>,
    factories: Vec<(TypeKey, ContextFactory)>,
}

/// Caller-supplied values consulted when a dependency has no strategy.
///
/// Lookup order for a dependency is: a value registered under the
/// dependency's target name (when its type matches), then a value of the
/// exact requested type, then a factory whose return type matches. Values
/// are never preferred over registered strategies.
///
/// A context also carries shared data that every resolution made with it
/// can read and write, and a per-object-graph store used by
/// [`SingletonPerObjectGraph`](crate::SingletonPerObjectGraph).
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{InjectionContext, TypeKey};
/// use std::sync::Arc;
///
/// let context = InjectionContext::new()
///     .with_named("port", Arc::new(8080_u16))
///     .with_value(Arc::new(String::from("tenant-a")));
///
/// assert!(context.contains(Some("port"), &TypeKey::of::<u16>()));
/// assert!(context.contains(None, &TypeKey::of::<String>()));
/// assert!(!context.contains(None, &TypeKey::of::<u32>()));
/// ```
#[derive(Clone, Default)]
pub struct InjectionContext {
    extra: Arc<ExtraData>,
    shared: Arc<AtomicMap<Cow<'static, str>, AnyArc>>,
    graph: Arc<AtomicMap<InstanceKey, AnyArc>>,
}

impl InjectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value found by its exact type.
    pub fn with_value<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        Arc::make_mut(&mut self.extra)
            .typed
            .push((TypeKey::of::<T>(), erase(value)));
        self
    }

    /// Adds a value found by the target name of a dependency.
    pub fn with_named<T: ?Sized + Send + Sync + 'static>(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: Arc<T>,
    ) -> Self {
        Arc::make_mut(&mut self.extra)
            .named
            .push((name.into(), TypeKey::of::<T>(), erase(value)));
        self
    }

    /// Adds a factory consulted when no stored value matches.
    pub fn with_factory<T, F>(mut self, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let factory: ContextFactory = Arc::new(move || factory().map(erase));
        Arc::make_mut(&mut self.extra)
            .factories
            .push((TypeKey::of::<T>(), factory));
        self
    }

    /// True when [`find_value`](Self::find_value) would produce something.
    pub fn contains(&self, name: Option<&str>, requested: &TypeKey) -> bool {
        self.named_value(name, requested).is_some()
            || self.typed_value(requested).is_some()
            || self.extra.factories.iter().any(|(ty, _)| ty == requested)
    }

    /// Finds a value for a dependency with the given target name and type.
    pub fn find_value(&self, name: Option<&str>, requested: &TypeKey) -> DiResult<Option<AnyArc>> {
        if let Some(value) = self.named_value(name, requested) {
            return Ok(Some(value));
        }
        if let Some(value) = self.typed_value(requested) {
            return Ok(Some(value));
        }
        match self.extra.factories.iter().find(|(ty, _)| ty == requested) {
            Some((_, factory)) => factory().map(Some),
            None => Ok(None),
        }
    }

    fn named_value(&self, name: Option<&str>, requested: &TypeKey) -> Option<AnyArc> {
        let name = name?;
        self.extra
            .named
            .iter()
            .rev()
            .find(|(n, ty, _)| n == name && ty == requested)
            .map(|(_, _, value)| value.clone())
    }

    fn typed_value(&self, requested: &TypeKey) -> Option<AnyArc> {
        self.extra
            .typed
            .iter()
            .rev()
            .find(|(ty, _)| ty == requested)
            .map(|(_, value)| value.clone())
    }

    /// Reads shared data.
    pub fn shared(&self, key: &str) -> Option<AnyArc> {
        self.shared.get(key)
    }

    /// Writes shared data, visible to every resolution using this context.
    pub fn set_shared(&self, key: impl Into<Cow<'static, str>>, value: AnyArc) {
        self.shared.insert(key.into(), value);
    }

    /// A context for a new object graph: same extra and shared data, empty
    /// per-graph store.
    pub fn for_object_graph(&self) -> Self {
        Self {
            extra: self.extra.clone(),
            shared: self.shared.clone(),
            graph: Arc::new(AtomicMap::new()),
        }
    }

    /// Memoizes a value for the current object graph.
    pub(crate) fn graph_instance<F>(&self, key: &InstanceKey, create: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        if let Some(existing) = self.graph.get(key) {
            return Ok(existing);
        }
        let created = create()?;
        Ok(self
            .graph
            .thread_safe_insert(key.clone(), created, |existing, _| existing.clone()))
    }
}

impl fmt::Debug for InjectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionContext")
            .field("named", &self.extra.named.len())
            .field("typed", &self.extra.typed.len())
            .field("factories", &self.extra.factories.len())
            .field("shared", &self.shared.len())
            .finish()
    }
}
