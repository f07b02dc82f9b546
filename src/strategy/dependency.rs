use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::ActivationStrategy;
use crate::error::{DiError, DiResult};
use crate::key::{LocateKey, TypeKey};
use crate::value::{erase, unerase, AnyArc};
use crate::wrappers::Resolvable;

/// Predicate selecting which strategies may satisfy a request.
pub type StrategyFilter = Arc<dyn Fn(&ActivationStrategy) -> bool + Send + Sync>;

/// Orders the elements of a synthesized collection.
pub type InstanceComparer = Arc<dyn Fn(&AnyArc, &AnyArc) -> Ordering + Send + Sync>;

/// How one constructor parameter, member or method parameter is satisfied.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::Dependency;
/// use std::sync::Arc;
///
/// let retries = Dependency::on::<Arc<u32>>()
///     .named("retries")
///     .with_default(Arc::new(3_u32));
/// assert!(!retries.is_required());
/// ```
#[derive(Clone)]
pub struct Dependency {
    type_key: TypeKey,
    target_name: Option<Cow<'static, str>>,
    required: bool,
    default_value: Option<AnyArc>,
    filter: Option<StrategyFilter>,
    locate_key: Option<LocateKey>,
    comparer: Option<InstanceComparer>,
}

impl Dependency {
    /// A required dependency on whatever `R` resolves from.
    pub fn on<R: Resolvable>() -> Self {
        Self::on_type(R::type_key())
    }

    pub fn on_type(type_key: TypeKey) -> Self {
        Self {
            type_key,
            target_name: None,
            required: true,
            default_value: None,
            filter: None,
            locate_key: None,
            comparer: None,
        }
    }

    /// Names the injection site; used for context lookups and diagnostics.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Resolves to nothing instead of failing when no value is found.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value used when no strategy exists. Implies optional.
    pub fn with_default<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.default_value = Some(erase(value));
        self.required = false;
        self
    }

    pub fn with_key(mut self, key: impl Into<LocateKey>) -> Self {
        self.locate_key = Some(key.into());
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ActivationStrategy) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sorts the elements of a collection dependency of `Arc<T>` values.
    pub fn sorted_by<T, F>(mut self, compare: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.comparer = Some(Arc::new(move |a: &AnyArc, b: &AnyArc| {
            match (unerase::<T>(a), unerase::<T>(b)) {
                (Some(a), Some(b)) => compare(&a, &b),
                _ => Ordering::Equal,
            }
        }));
        self
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn target_name(&self) -> Option<&Cow<'static, str>> {
        self.target_name.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&AnyArc> {
        self.default_value.as_ref()
    }

    pub fn filter(&self) -> Option<&StrategyFilter> {
        self.filter.as_ref()
    }

    pub fn locate_key(&self) -> Option<&LocateKey> {
        self.locate_key.as_ref()
    }

    pub fn comparer(&self) -> Option<&InstanceComparer> {
        self.comparer.as_ref()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("type_key", &self.type_key)
            .field("target_name", &self.target_name)
            .field("required", &self.required)
            .field("has_default", &self.default_value.is_some())
            .field("locate_key", &self.locate_key)
            .finish()
    }
}

/// Resolved values for a list of dependencies, in declaration order.
///
/// Absent optional dependencies are `None`.
pub struct Arguments {
    owner: &'static str,
    values: SmallVec<[Option<AnyArc>; 4]>,
}

impl Arguments {
    pub(crate) fn new(owner: &'static str, values: SmallVec<[Option<AnyArc>; 4]>) -> Self {
        Self { owner, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `index`, converted to `R`. Fails when it is absent.
    pub fn get<R: Resolvable>(&self, index: usize) -> DiResult<R> {
        match self.raw(index) {
            Some(value) => R::from_instance(value),
            None => Err(DiError::general(format!(
                "argument {index} of {} was not supplied",
                self.owner
            ))),
        }
    }

    /// The argument at `index` converted to `R`, or `None` when absent.
    pub fn optional<R: Resolvable>(&self, index: usize) -> DiResult<Option<R>> {
        self.raw(index).map(R::from_instance).transpose()
    }

    pub fn raw(&self, index: usize) -> Option<&AnyArc> {
        self.values.get(index).and_then(Option::as_ref)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("len", &self.values.len())
            .finish()
    }
}
