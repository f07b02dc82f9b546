//! Typed views over resolved values and the built-in wrapper types.
//!
//! [`Resolvable`] converts an erased instance into the shape a caller asked
//! for. Besides `Arc<T>` and `Vec<Arc<T>>`, the container understands a few
//! wrapper shapes that defer or scope activation:
//!
//! - [`Func<T>`]: activates a new `T` (per its lifestyle) on every call
//! - [`Lazy<T>`]: activates `T` on first access, then keeps it
//! - [`Owned<T>`]: activates `T` with its own disposal scope
//! - [`FuncWithContext<T>`]: like `Func<T>` with a caller-supplied context
//! - [`TypedLocator`]: locates arbitrary types from the injection site's scope

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::compiler::ActivationDelegate;
use crate::context::InjectionContext;
use crate::disposal::DisposalScope;
use crate::error::{DiError, DiResult};
use crate::key::{
    GenericShape, GenericType, LocateKey, TypeKey, COLLECTION_DEFINITION, FUNC_DEFINITION,
    FUNC_WITH_CONTEXT_DEFINITION, LAZY_DEFINITION, OWNED_DEFINITION,
};
use crate::scope::LifetimeScope;
use crate::strategy::StrategyFilter;
use crate::traits::LocatorCore;
use crate::value::{unerase, AnyArc};

/// A value that can be produced from an erased instance.
pub trait Resolvable: Sized + Send + Sync + 'static {
    /// The key requested to obtain `Self`.
    fn type_key() -> TypeKey;

    fn from_instance(instance: &AnyArc) -> DiResult<Self>;
}

fn mismatch<T: ?Sized>() -> DiError {
    DiError::type_mismatch(std::any::type_name::<T>())
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Arc<T> {
    fn type_key() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        unerase::<T>(instance).ok_or_else(mismatch::<T>)
    }
}

/// Erased elements of a synthesized collection.
pub(crate) struct InstanceCollection(pub(crate) Vec<AnyArc>);

impl<T: ?Sized + 'static> GenericType for Vec<Arc<T>> {
    fn generic_shape() -> GenericShape {
        GenericShape::new(COLLECTION_DEFINITION, vec![TypeKey::of::<T>()])
    }
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Vec<Arc<T>> {
    fn type_key() -> TypeKey {
        TypeKey::of_generic::<Vec<Arc<T>>>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        if let Some(explicit) = unerase::<Vec<Arc<T>>>(instance) {
            return Ok(explicit.as_ref().clone());
        }
        let collection = unerase::<InstanceCollection>(instance).ok_or_else(mismatch::<Self>)?;
        collection
            .0
            .iter()
            .map(|element| unerase::<T>(element).ok_or_else(mismatch::<T>))
            .collect()
    }
}

/// Kinds of built-in wrapper strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    Func,
    Lazy,
    Owned,
    FuncWithContext,
}

impl WrapperKind {
    pub const ALL: [WrapperKind; 4] = [
        WrapperKind::Func,
        WrapperKind::Lazy,
        WrapperKind::Owned,
        WrapperKind::FuncWithContext,
    ];

    pub fn definition_key(self) -> TypeKey {
        let name = match self {
            WrapperKind::Func => FUNC_DEFINITION,
            WrapperKind::Lazy => LAZY_DEFINITION,
            WrapperKind::Owned => OWNED_DEFINITION,
            WrapperKind::FuncWithContext => FUNC_WITH_CONTEXT_DEFINITION,
        };
        TypeKey::definition(name, 1)
    }
}

/// A compiled delegate bound to the scope it was injected from.
pub(crate) struct BoundDelegate {
    delegate: ActivationDelegate,
    scope: LifetimeScope,
    disposal: Option<DisposalScope>,
    context: InjectionContext,
}

impl BoundDelegate {
    pub(crate) fn new(
        delegate: ActivationDelegate,
        scope: LifetimeScope,
        disposal: Option<DisposalScope>,
        context: InjectionContext,
    ) -> Self {
        Self {
            delegate,
            scope,
            disposal,
            context,
        }
    }

    /// Runs the delegate as a new object graph.
    fn invoke(&self, context: Option<&InjectionContext>) -> DiResult<AnyArc> {
        let context = context.unwrap_or(&self.context).for_object_graph();
        (self.delegate)(&self.scope, self.disposal.as_ref(), &context)
    }
}

/// Activates a `T` on every call.
pub struct Func<T: ?Sized> {
    bound: Arc<BoundDelegate>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Func<T> {
    pub fn call(&self) -> DiResult<Arc<T>> {
        let instance = self.bound.invoke(None)?;
        unerase::<T>(&instance).ok_or_else(mismatch::<T>)
    }
}

impl<T: ?Sized> Clone for Func<T> {
    fn clone(&self) -> Self {
        Self {
            bound: self.bound.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> GenericType for Func<T> {
    fn generic_shape() -> GenericShape {
        GenericShape::new(FUNC_DEFINITION, vec![TypeKey::of::<T>()])
    }
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Func<T> {
    fn type_key() -> TypeKey {
        TypeKey::of_generic::<Self>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        let bound = unerase::<BoundDelegate>(instance).ok_or_else(mismatch::<Self>)?;
        Ok(Self {
            bound,
            _marker: PhantomData,
        })
    }
}

/// Activates a `T` on every call, with a caller-supplied injection context.
pub struct FuncWithContext<T: ?Sized> {
    bound: Arc<BoundDelegate>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> FuncWithContext<T> {
    pub fn call(&self, context: &InjectionContext) -> DiResult<Arc<T>> {
        let instance = self.bound.invoke(Some(context))?;
        unerase::<T>(&instance).ok_or_else(mismatch::<T>)
    }
}

impl<T: ?Sized> Clone for FuncWithContext<T> {
    fn clone(&self) -> Self {
        Self {
            bound: self.bound.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> GenericType for FuncWithContext<T> {
    fn generic_shape() -> GenericShape {
        GenericShape::new(FUNC_WITH_CONTEXT_DEFINITION, vec![TypeKey::of::<T>()])
    }
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for FuncWithContext<T> {
    fn type_key() -> TypeKey {
        TypeKey::of_generic::<Self>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        let bound = unerase::<BoundDelegate>(instance).ok_or_else(mismatch::<Self>)?;
        Ok(Self {
            bound,
            _marker: PhantomData,
        })
    }
}

pub(crate) struct LazyValue {
    bound: BoundDelegate,
    value: OnceCell<AnyArc>,
}

impl LazyValue {
    pub(crate) fn new(bound: BoundDelegate) -> Self {
        Self {
            bound,
            value: OnceCell::new(),
        }
    }
}

/// Activates `T` on first access and keeps it.
pub struct Lazy<T: ?Sized> {
    inner: Arc<LazyValue>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub fn value(&self) -> DiResult<Arc<T>> {
        let instance = self.inner.value.get_or_try_init(|| self.inner.bound.invoke(None))?;
        unerase::<T>(instance).ok_or_else(mismatch::<T>)
    }

    pub fn is_created(&self) -> bool {
        self.inner.value.get().is_some()
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> GenericType for Lazy<T> {
    fn generic_shape() -> GenericShape {
        GenericShape::new(LAZY_DEFINITION, vec![TypeKey::of::<T>()])
    }
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Lazy<T> {
    fn type_key() -> TypeKey {
        TypeKey::of_generic::<Self>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        let inner = unerase::<LazyValue>(instance).ok_or_else(mismatch::<Self>)?;
        Ok(Self {
            inner,
            _marker: PhantomData,
        })
    }
}

pub(crate) struct OwnedValue {
    pub(crate) value: AnyArc,
    pub(crate) disposal: DisposalScope,
}

/// A `T` activated with its own disposal scope.
///
/// Disposing the `Owned` disposes everything tracked while activating `T`.
/// If it is never disposed explicitly, the enclosing scope disposes it.
pub struct Owned<T: ?Sized> {
    inner: Arc<OwnedValue>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Owned<T> {
    pub fn value(&self) -> DiResult<Arc<T>> {
        unerase::<T>(&self.inner.value).ok_or_else(mismatch::<T>)
    }

    pub fn dispose(&self) {
        self.inner.disposal.dispose();
    }
}

impl<T: ?Sized> Clone for Owned<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> GenericType for Owned<T> {
    fn generic_shape() -> GenericShape {
        GenericShape::new(OWNED_DEFINITION, vec![TypeKey::of::<T>()])
    }
}

impl<T: ?Sized + Send + Sync + 'static> Resolvable for Owned<T> {
    fn type_key() -> TypeKey {
        TypeKey::of_generic::<Self>()
    }

    fn from_instance(instance: &AnyArc) -> DiResult<Self> {
        let inner = unerase::<OwnedValue>(instance).ok_or_else(mismatch::<Self>)?;
        Ok(Self {
            inner,
            _marker: PhantomData,
        })
    }
}

/// Untyped locator bound to the scope and context of its injection site.
#[derive(Clone)]
pub struct TypedLocator {
    scope: LifetimeScope,
    context: InjectionContext,
}

impl TypedLocator {
    pub(crate) fn new(scope: LifetimeScope, context: InjectionContext) -> Self {
        Self { scope, context }
    }
}

impl LocatorCore for TypedLocator {
    fn locate_value(
        &self,
        type_key: &TypeKey,
        key: Option<&LocateKey>,
        filter: Option<&StrategyFilter>,
        context: Option<&InjectionContext>,
    ) -> DiResult<Option<AnyArc>> {
        self.scope
            .locate_value(type_key, key, filter, Some(context.unwrap_or(&self.context)))
    }

    fn can_locate(&self, type_key: &TypeKey, key: Option<&LocateKey>) -> bool {
        self.scope.can_locate(type_key, key)
    }
}

impl fmt::Debug for TypedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedLocator").field("scope", &self.scope).finish()
    }
}

macro_rules! resolvable_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Resolvable for $ty {
                fn type_key() -> TypeKey {
                    TypeKey::of::<$ty>()
                }

                fn from_instance(instance: &AnyArc) -> DiResult<Self> {
                    unerase::<$ty>(instance)
                        .map(|value| value.as_ref().clone())
                        .ok_or_else(mismatch::<$ty>)
                }
            }
        )*
    };
}

resolvable_by_clone!(LifetimeScope, InjectionContext, TypedLocator);
