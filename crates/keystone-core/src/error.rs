//! Bootstrap error taxonomy.
//!
//! Every variant is fatal while the application is bootstrapping: nothing is
//! retried and nothing is downgraded to a warning. The first error reported
//! by any stage aborts the pipeline.

use thiserror::Error;

use crate::service::ServiceTypeId;
use crate::transport::TransportError;

/// Type-erased error returned across trait seams (factories, setup hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A required configuration section was not loaded.
    #[error("configuration section '{name}' is missing")]
    ConfigMissing {
        /// Name of the missing section.
        name: String,
    },

    /// A configuration value is absent or cannot be parsed.
    #[error("invalid configuration value '{section}.{key}': {reason}")]
    ConfigMalformed {
        /// Section holding the value.
        section: String,
        /// Offending key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The `services` section has no entry for a required service.
    #[error("no factory declared for service '{service}'")]
    FactoryNotDeclared {
        /// The unresolvable service.
        service: ServiceTypeId,
    },

    /// A factory was registered for one service but produces another.
    #[error("factory '{factory}' is registered for '{expected}' but produces '{actual}'")]
    FactoryTypeMismatch {
        /// Factory type name from the `services` section.
        factory: String,
        /// Service id the factory was registered under.
        expected: ServiceTypeId,
        /// Service id the factory declares.
        actual: ServiceTypeId,
    },

    /// The named factory type could not be instantiated.
    #[error("cannot instantiate factory '{factory}' for service '{service}': {source}")]
    FactoryInstantiationFailure {
        /// Service the factory was needed for.
        service: ServiceTypeId,
        /// Factory type name from the `services` section.
        factory: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// A factory failed (or timed out) while constructing its service.
    #[error("failed to construct service '{service}': {source}")]
    ServiceConstructionFailure {
        /// Service being constructed.
        service: ServiceTypeId,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// A plugin's setup hook failed (or timed out).
    #[error("failed to set up plugin '{plugin}': {source}")]
    PluginSetupFailure {
        /// Plugin name.
        plugin: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// Declared service requirements form a cycle and cycles are rejected.
    #[error("dependency cycle detected among services: {}", display_ids(.members))]
    CyclicDependency {
        /// Services that take part in at least one cycle.
        members: Vec<ServiceTypeId>,
    },

    /// The primary transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl BootstrapError {
    /// Creates a [`BootstrapError::ConfigMalformed`].
    pub fn malformed(
        section: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConfigMalformed {
            section: section.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Short, stable name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "config_missing",
            Self::ConfigMalformed { .. } => "config_malformed",
            Self::FactoryNotDeclared { .. } => "factory_not_declared",
            Self::FactoryTypeMismatch { .. } => "factory_type_mismatch",
            Self::FactoryInstantiationFailure { .. } => "factory_instantiation_failure",
            Self::ServiceConstructionFailure { .. } => "service_construction_failure",
            Self::PluginSetupFailure { .. } => "plugin_setup_failure",
            Self::CyclicDependency { .. } => "cyclic_dependency",
            Self::Transport(_) => "transport",
        }
    }
}

fn display_ids(ids: &[ServiceTypeId]) -> String {
    ids.iter()
        .map(ServiceTypeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;
