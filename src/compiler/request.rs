use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::LocationInfo;
use crate::key::{LocateKey, TypeKey};
use crate::strategy::{Dependency, InstanceComparer, StrategyFilter};

/// Where a request originates in the object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A top-level locate.
    Root,
    ConstructorParameter,
    Member,
    MethodParameter,
    /// A dependency of a decorator.
    DecoratorParameter,
    /// One element of a synthesized collection.
    CollectionElement,
    /// The value behind a `Func`, `Lazy`, `Owned` or `FuncWithContext`.
    Wrapped,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::Root => "root request",
            RequestKind::ConstructorParameter => "constructor parameter",
            RequestKind::Member => "member",
            RequestKind::MethodParameter => "method parameter",
            RequestKind::DecoratorParameter => "decorator parameter",
            RequestKind::CollectionElement => "collection element",
            RequestKind::Wrapped => "wrapped value",
        })
    }
}

/// The injection site a request fills.
#[derive(Debug, Clone)]
pub struct InjectionTarget {
    /// Activation type declaring the dependency.
    pub declaring_type: TypeKey,
    /// Parameter or member name, when known.
    pub name: Option<Cow<'static, str>>,
    pub kind: RequestKind,
}

/// Call-site information handed to conditions.
#[derive(Debug, Clone)]
pub struct StaticInjectionContext {
    requested_type: TypeKey,
    key: Option<LocateKey>,
    target: Option<InjectionTarget>,
    injected_into: Vec<TypeKey>,
}

impl StaticInjectionContext {
    pub fn requested_type(&self) -> &TypeKey {
        &self.requested_type
    }

    pub fn key(&self) -> Option<&LocateKey> {
        self.key.as_ref()
    }

    /// The injection site, `None` for root requests.
    pub fn target(&self) -> Option<&InjectionTarget> {
        self.target.as_ref()
    }

    /// Activation types the value is being injected into, nearest first.
    pub fn injected_into(&self) -> &[TypeKey] {
        &self.injected_into
    }
}

/// One node of a resolution: the type asked for and where it is needed.
///
/// Requests form a chain through their parents, used to build the
/// [`StaticInjectionContext`] and to bound the object-graph depth.
#[derive(Clone)]
pub struct Request {
    activation_type: TypeKey,
    kind: RequestKind,
    depth: usize,
    key: Option<LocateKey>,
    filter: Option<StrategyFilter>,
    comparer: Option<InstanceComparer>,
    target: Option<InjectionTarget>,
    parent: Option<Arc<Request>>,
}

impl Request {
    pub(crate) fn root(activation_type: TypeKey, depth: usize) -> Self {
        Self {
            activation_type,
            kind: RequestKind::Root,
            depth,
            key: None,
            filter: None,
            comparer: None,
            target: None,
            parent: None,
        }
    }

    pub(crate) fn with_key(mut self, key: Option<LocateKey>) -> Self {
        self.key = key;
        self
    }

    pub(crate) fn with_filter(mut self, filter: Option<StrategyFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// A request for one dependency of `declaring_type`.
    pub(crate) fn dependency(&self, dependency: &Dependency, kind: RequestKind, declaring_type: &TypeKey) -> Self {
        Self {
            activation_type: dependency.type_key().clone(),
            kind,
            depth: self.depth + 1,
            key: dependency.locate_key().cloned(),
            filter: dependency.filter().cloned(),
            comparer: dependency.comparer().cloned(),
            target: Some(InjectionTarget {
                declaring_type: declaring_type.clone(),
                name: dependency.target_name().cloned(),
                kind,
            }),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// A request for `activation_type` in the same position as `self`, used
    /// for wrapped values and collection elements.
    pub(crate) fn nested(&self, activation_type: TypeKey, kind: RequestKind) -> Self {
        Self {
            activation_type,
            kind,
            depth: self.depth + 1,
            key: self.key.clone(),
            filter: self.filter.clone(),
            comparer: None,
            target: self.target.clone(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn activation_type(&self) -> &TypeKey {
        &self.activation_type
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn key(&self) -> Option<&LocateKey> {
        self.key.as_ref()
    }

    pub fn filter(&self) -> Option<&StrategyFilter> {
        self.filter.as_ref()
    }

    pub(crate) fn comparer(&self) -> Option<&InstanceComparer> {
        self.comparer.as_ref()
    }

    pub fn target(&self) -> Option<&InjectionTarget> {
        self.target.as_ref()
    }

    pub fn parent(&self) -> Option<&Request> {
        self.parent.as_deref()
    }

    pub fn static_context(&self) -> StaticInjectionContext {
        let mut injected_into = Vec::new();
        let mut current = Some(self);
        while let Some(request) = current {
            if let Some(target) = &request.target {
                if injected_into.last() != Some(&target.declaring_type) {
                    injected_into.push(target.declaring_type.clone());
                }
            }
            current = request.parent();
        }

        StaticInjectionContext {
            requested_type: self.activation_type.clone(),
            key: self.key.clone(),
            target: self.target.clone(),
            injected_into,
        }
    }

    pub(crate) fn location(&self) -> LocationInfo {
        let (declaring_type, member) = match &self.target {
            Some(target) => (target.declaring_type.name(), target.name.clone()),
            None => ("<root>", None),
        };
        LocationInfo {
            declaring_type,
            member,
            kind: self.kind,
            requested_type: self.activation_type.name(),
            key: self.key.clone(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("activation_type", &self.activation_type)
            .field("kind", &self.kind)
            .field("depth", &self.depth)
            .field("key", &self.key)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
