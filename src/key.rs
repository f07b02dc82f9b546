//! Type and locate keys for the activation registry.

use std::any::TypeId;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Generic definition name used for synthesized collections (`Vec<Arc<T>>`).
pub const COLLECTION_DEFINITION: &str = "Vec";
/// Generic definition name of [`Func`](crate::Func).
pub const FUNC_DEFINITION: &str = "Func";
/// Generic definition name of [`Lazy`](crate::Lazy).
pub const LAZY_DEFINITION: &str = "Lazy";
/// Generic definition name of [`Owned`](crate::Owned).
pub const OWNED_DEFINITION: &str = "Owned";
/// Generic definition name of [`FuncWithContext`](crate::FuncWithContext).
pub const FUNC_WITH_CONTEXT_DEFINITION: &str = "FuncWithContext";

/// What a [`TypeKey`] identifies.
///
/// Closed types are identified by their `TypeId`. Open generic definitions
/// have no `TypeId` in Rust, so they are identified by a definition name
/// and an arity instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeIdentity {
    /// A concrete (closed) type.
    Closed(TypeId),
    /// An open generic definition, e.g. `Repository<_>`.
    Definition(&'static str, usize),
}

/// Describes how a closed type was built from a generic definition.
///
/// Rust has no runtime generic reflection, so types that take part in
/// open-generic matching describe themselves through [`GenericType`].
#[derive(Debug, Clone)]
pub struct GenericShape {
    definition: &'static str,
    arguments: Vec<TypeKey>,
}

impl GenericShape {
    /// Creates a shape from a definition name and its closed type arguments.
    pub fn new(definition: &'static str, arguments: Vec<TypeKey>) -> Self {
        Self {
            definition,
            arguments,
        }
    }

    /// Name of the generic definition.
    pub fn definition(&self) -> &'static str {
        self.definition
    }

    /// Number of type arguments.
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// The closed type arguments, in declaration order.
    pub fn arguments(&self) -> &[TypeKey] {
        &self.arguments
    }

    /// Key of the open definition this shape closes.
    pub fn definition_key(&self) -> TypeKey {
        TypeKey::definition(self.definition, self.arity())
    }
}

/// Implemented by generic types that can be matched against open generic
/// strategies and built-in wrappers.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{GenericShape, GenericType, TypeKey};
///
/// struct Repository<T>(std::marker::PhantomData<T>);
///
/// impl<T: 'static> GenericType for Repository<T> {
///     fn generic_shape() -> GenericShape {
///         GenericShape::new("Repository", vec![TypeKey::of::<T>()])
///     }
/// }
///
/// let key = TypeKey::of_generic::<Repository<u32>>();
/// assert_eq!(key.generic_definition(), Some(TypeKey::definition("Repository", 1)));
/// assert_eq!(key.generic_arguments(), &[TypeKey::of::<u32>()]);
/// ```
pub trait GenericType: 'static {
    /// Returns the definition name and closed arguments of `Self`.
    fn generic_shape() -> GenericShape;
}

/// Identifies a requested or exported type.
///
/// Equality, ordering and hashing only consider the [`TypeIdentity`]; the
/// name and generic shape are carried along for diagnostics and generic
/// matching.
#[derive(Clone)]
pub struct TypeKey {
    identity: TypeIdentity,
    name: &'static str,
    shape: Option<Arc<GenericShape>>,
}

impl TypeKey {
    /// Key for a closed type without generic information.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            identity: TypeIdentity::Closed(TypeId::of::<T>()),
            name: std::any::type_name::<T>(),
            shape: None,
        }
    }

    /// Key for a closed generic type, carrying its [`GenericShape`].
    pub fn of_generic<T: GenericType + ?Sized>() -> Self {
        Self {
            identity: TypeIdentity::Closed(TypeId::of::<T>()),
            name: std::any::type_name::<T>(),
            shape: Some(Arc::new(T::generic_shape())),
        }
    }

    /// Key for an open generic definition.
    pub fn definition(name: &'static str, arity: usize) -> Self {
        Self {
            identity: TypeIdentity::Definition(name, arity),
            name,
            shape: None,
        }
    }

    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Type name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> Option<&GenericShape> {
        self.shape.as_deref()
    }

    pub fn is_open_definition(&self) -> bool {
        matches!(self.identity, TypeIdentity::Definition(..))
    }

    /// The open definition this closed generic type was built from.
    pub fn generic_definition(&self) -> Option<TypeKey> {
        self.shape().map(GenericShape::definition_key)
    }

    /// Closed type arguments, empty for non-generic keys.
    pub fn generic_arguments(&self) -> &[TypeKey] {
        match self.shape() {
            Some(shape) => shape.arguments(),
            None => &[],
        }
    }

    /// Element type when this key describes a `Vec<Arc<T>>` collection.
    pub fn collection_element(&self) -> Option<&TypeKey> {
        let shape = self.shape()?;
        if shape.definition() == COLLECTION_DEFINITION && shape.arity() == 1 {
            shape.arguments().first()
        } else {
            None
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity.cmp(&other.identity)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            TypeIdentity::Closed(_) => write!(f, "TypeKey({})", self.name),
            TypeIdentity::Definition(name, arity) => write!(f, "TypeKey({name}<{arity}>)"),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            TypeIdentity::Closed(_) => f.write_str(self.name),
            TypeIdentity::Definition(name, arity) => {
                write!(f, "{name}<{}>", vec!["_"; arity].join(", "))
            }
        }
    }
}

/// Key distinguishing several exports of the same type.
///
/// [`LocateKey::Any`] is the wildcard: a strategy exported under `Any`
/// answers every keyed request for its type that has no exact match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocateKey {
    /// Wildcard key.
    Any,
    /// String key.
    Name(Cow<'static, str>),
    /// Integer key.
    Number(i64),
    /// A type used as a key.
    Type(TypeIdentity),
}

impl LocateKey {
    /// A key made from a type.
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        LocateKey::Type(TypeIdentity::Closed(TypeId::of::<T>()))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, LocateKey::Any)
    }
}

impl From<&'static str> for LocateKey {
    fn from(value: &'static str) -> Self {
        LocateKey::Name(Cow::Borrowed(value))
    }
}

impl From<String> for LocateKey {
    fn from(value: String) -> Self {
        LocateKey::Name(Cow::Owned(value))
    }
}

impl From<i64> for LocateKey {
    fn from(value: i64) -> Self {
        LocateKey::Number(value)
    }
}

impl From<i32> for LocateKey {
    fn from(value: i32) -> Self {
        LocateKey::Number(i64::from(value))
    }
}

impl fmt::Display for LocateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateKey::Any => f.write_str("*"),
            LocateKey::Name(name) => write!(f, "\"{name}\""),
            LocateKey::Number(number) => write!(f, "{number}"),
            LocateKey::Type(TypeIdentity::Closed(id)) => write!(f, "{id:?}"),
            LocateKey::Type(TypeIdentity::Definition(name, arity)) => write!(f, "{name}<{arity}>"),
        }
    }
}
