//! Error types for the activation engine.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::compiler::RequestKind;
use crate::key::{LocateKey, TypeKey};

/// One breadcrumb of a failed resolution: which dependency of which type
/// was being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInfo {
    /// Activation type that declares the dependency.
    pub declaring_type: &'static str,
    /// Parameter or member name, when known.
    pub member: Option<Cow<'static, str>>,
    /// Kind of injection site.
    pub kind: RequestKind,
    /// Type that was requested at this site.
    pub requested_type: &'static str,
    /// Locate key of the request, if keyed.
    pub key: Option<LocateKey>,
}

impl fmt::Display for LocationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.kind, self.declaring_type)?;
        if let Some(member) = &self.member {
            write!(f, " ('{member}')")?;
        }
        write!(f, " requesting {}", self.requested_type)?;
        if let Some(key) = &self.key {
            write!(f, " with key {key}")?;
        }
        Ok(())
    }
}

/// Breadcrumbs collected while an error travels out of a resolution.
///
/// Locations are pushed innermost first; `Display` prints them from the
/// root request down to the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationTrail(SmallVec<[LocationInfo; 4]>);

impl LocationTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: LocationInfo) {
        self.0.push(location);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Locations from the root request down to the failure site.
    pub fn from_root(&self) -> impl Iterator<Item = &LocationInfo> {
        self.0.iter().rev()
    }

    /// The location closest to the failure.
    pub fn innermost(&self) -> Option<&LocationInfo> {
        self.0.first()
    }
}

impl fmt::Display for LocationTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for location in self.from_root() {
            write!(f, "\n  at {location}")?;
        }
        Ok(())
    }
}

/// Plain discriminant of [`DiError`], convenient for matching in tests and
/// callers that don't care about the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingDependency,
    DisposalScopeMissing,
    GeneralLocateFailure,
    GraphTooDeep,
    TypeMismatch,
    ConfigurationLocked,
}

/// Activation errors
///
/// Every variant that can occur during a resolution carries a
/// [`LocationTrail`] so the message shows the path from the root request
/// to the failing dependency.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, ErrorKind, Locator};
///
/// let container = Container::new();
/// let err = container.locate::<String>().unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::MissingDependency);
/// assert!(err.to_string().contains("alloc::string::String"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// No strategy, default or context value satisfied a required dependency.
    #[error("could not locate {requested}{trail}")]
    MissingDependency {
        requested: &'static str,
        trail: LocationTrail,
    },
    /// A strategy requires disposal tracking but no disposal scope was active.
    #[error("no disposal scope is available to track {activation}{trail}")]
    DisposalScopeMissing {
        activation: &'static str,
        trail: LocationTrail,
    },
    /// A user activator, factory or provider failed.
    #[error("{message}{trail}")]
    GeneralLocateFailure {
        message: String,
        trail: LocationTrail,
    },
    /// The object graph exceeded the configured depth bound.
    #[error("object graph depth {depth} exceeds the limit of {limit} while resolving {requested}{trail}")]
    GraphTooDeep {
        depth: usize,
        limit: usize,
        requested: &'static str,
        trail: LocationTrail,
    },
    /// An erased instance did not hold the expected type.
    #[error("instance is not of the expected type {expected}{trail}")]
    TypeMismatch {
        expected: &'static str,
        trail: LocationTrail,
    },
    /// Registration was attempted after resolution under the rejecting policy.
    #[error("container configuration is locked: {0}")]
    ConfigurationLocked(&'static str),
}

impl DiError {
    pub fn missing(requested: &TypeKey) -> Self {
        DiError::MissingDependency {
            requested: requested.name(),
            trail: LocationTrail::new(),
        }
    }

    pub fn type_mismatch(expected: &'static str) -> Self {
        DiError::TypeMismatch {
            expected,
            trail: LocationTrail::new(),
        }
    }

    /// A general failure with a message, typically returned by user activators.
    pub fn general(message: impl Into<String>) -> Self {
        DiError::GeneralLocateFailure {
            message: message.into(),
            trail: LocationTrail::new(),
        }
    }

    /// Wraps any error as a general failure.
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        Self::general(error.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DiError::MissingDependency { .. } => ErrorKind::MissingDependency,
            DiError::DisposalScopeMissing { .. } => ErrorKind::DisposalScopeMissing,
            DiError::GeneralLocateFailure { .. } => ErrorKind::GeneralLocateFailure,
            DiError::GraphTooDeep { .. } => ErrorKind::GraphTooDeep,
            DiError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            DiError::ConfigurationLocked(_) => ErrorKind::ConfigurationLocked,
        }
    }

    /// Locations recorded while the error propagated. Empty for configuration errors.
    pub fn trail(&self) -> Option<&LocationTrail> {
        match self {
            DiError::MissingDependency { trail, .. }
            | DiError::DisposalScopeMissing { trail, .. }
            | DiError::GeneralLocateFailure { trail, .. }
            | DiError::GraphTooDeep { trail, .. }
            | DiError::TypeMismatch { trail, .. } => Some(trail),
            DiError::ConfigurationLocked(_) => None,
        }
    }

    /// Appends one breadcrumb. Called once per nesting level on the way out.
    pub fn with_location(mut self, location: LocationInfo) -> Self {
        match &mut self {
            DiError::MissingDependency { trail, .. }
            | DiError::DisposalScopeMissing { trail, .. }
            | DiError::GeneralLocateFailure { trail, .. }
            | DiError::GraphTooDeep { trail, .. }
            | DiError::TypeMismatch { trail, .. } => trail.push(location),
            DiError::ConfigurationLocked(_) => {}
        }
        self
    }
}

/// Result type for activation operations
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn location(declaring: &'static str, requested: &'static str) -> LocationInfo {
        LocationInfo {
            declaring_type: declaring,
            member: Some("dep".into()),
            kind: RequestKind::ConstructorParameter,
            requested_type: requested,
            key: None,
        }
    }

    #[test]
    fn trail_prints_from_root() {
        let err = DiError::missing(&TypeKey::of::<u8>())
            .with_location(location("Inner", "u8"))
            .with_location(location("Outer", "Inner"));

        let text = err.to_string();
        let outer = text.find("of Outer").unwrap();
        let inner = text.find("of Inner").unwrap();
        assert!(outer < inner);
        assert_eq!(err.trail().unwrap().len(), 2);
        assert_eq!(err.trail().unwrap().innermost().unwrap().declaring_type, "Inner");
    }

    #[test]
    fn general_errors_keep_their_message() {
        let err = DiError::general("database offline");
        assert_eq!(err.kind(), ErrorKind::GeneralLocateFailure);
        assert_eq!(err.to_string(), "database offline");
    }
}
