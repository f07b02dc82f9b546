//! Container configuration.
//!
//! Every setting has a default, so `ContainerConfiguration::default()` is a
//! working configuration. With the `config` feature the struct can also be
//! loaded from JSON; missing fields keep their defaults.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::error::{DiError, DiResult};

/// What `configure` does once the container has resolved something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum LateRegistration {
    /// Accept the registration and drop every compiled delegate, so later
    /// locates see the new strategies. Instances already handed out and
    /// memoized singletons are kept.
    #[default]
    InvalidateCache,
    /// Refuse the registration with [`DiError::ConfigurationLocked`](crate::DiError::ConfigurationLocked).
    Reject,
}

/// Settings for a [`Container`](crate::Container).
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Container, ContainerConfiguration, LateRegistration};
///
/// let configuration = ContainerConfiguration::default()
///     .with_max_object_graph_depth(32)
///     .with_cache_shards(16)
///     .with_late_registration(LateRegistration::Reject);
///
/// let container = Container::with_configuration(configuration);
/// assert_eq!(container.configuration().max_object_graph_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfiguration {
    /// Deepest dependency chain compiled before failing with `GraphTooDeep`.
    pub max_object_graph_depth: usize,
    /// Index strategies under their declared base types as well.
    pub export_as_base: bool,
    /// Consult missing-strategy providers for unknown types.
    pub auto_register_unknown: bool,
    /// Track disposable instances of transient strategies in the active
    /// disposal scope.
    pub track_disposable_transients: bool,
    /// Number of delegate cache shards. Rounded up to a power of two.
    pub cache_shards: usize,
    pub late_registration: LateRegistration,
}

impl Default for ContainerConfiguration {
    fn default() -> Self {
        Self {
            max_object_graph_depth: 100,
            export_as_base: false,
            auto_register_unknown: true,
            track_disposable_transients: true,
            cache_shards: 64,
            late_registration: LateRegistration::InvalidateCache,
        }
    }
}

impl ContainerConfiguration {
    pub fn with_max_object_graph_depth(mut self, depth: usize) -> Self {
        self.max_object_graph_depth = depth;
        self
    }

    pub fn with_export_as_base(mut self, export_as_base: bool) -> Self {
        self.export_as_base = export_as_base;
        self
    }

    pub fn with_auto_register_unknown(mut self, enabled: bool) -> Self {
        self.auto_register_unknown = enabled;
        self
    }

    pub fn with_track_disposable_transients(mut self, enabled: bool) -> Self {
        self.track_disposable_transients = enabled;
        self
    }

    pub fn with_cache_shards(mut self, shards: usize) -> Self {
        self.cache_shards = shards;
        self
    }

    pub fn with_late_registration(mut self, policy: LateRegistration) -> Self {
        self.late_registration = policy;
        self
    }

    /// The shard count actually used: at least one, rounded to a power of two.
    pub fn shard_count(&self) -> usize {
        self.cache_shards.max(1).next_power_of_two()
    }

    /// Parses a configuration from JSON. Absent fields take their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(DiError::from_error)
    }

    #[cfg(feature = "config")]
    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(DiError::from_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ContainerConfiguration::default();
        assert_eq!(config.max_object_graph_depth, 100);
        assert!(!config.export_as_base);
        assert!(config.auto_register_unknown);
        assert!(config.track_disposable_transients);
        assert_eq!(config.shard_count(), 64);
        assert_eq!(config.late_registration, LateRegistration::InvalidateCache);
    }

    #[test]
    fn shard_count_rounds_up() {
        assert_eq!(ContainerConfiguration::default().with_cache_shards(0).shard_count(), 1);
        assert_eq!(ContainerConfiguration::default().with_cache_shards(5).shard_count(), 8);
        assert_eq!(ContainerConfiguration::default().with_cache_shards(16).shard_count(), 16);
    }

    #[cfg(feature = "config")]
    #[test]
    fn loads_partial_json() {
        let config = ContainerConfiguration::from_json(
            r#"{ "max_object_graph_depth": 12, "late_registration": "reject" }"#,
        )
        .unwrap();
        assert_eq!(config.max_object_graph_depth, 12);
        assert_eq!(config.late_registration, LateRegistration::Reject);
        assert_eq!(config.cache_shards, 64);
    }

    #[cfg(feature = "config")]
    #[test]
    fn rejects_malformed_json() {
        assert!(ContainerConfiguration::from_json("{ not json").is_err());
    }
}
