//! Service factories and their registry.
//!
//! Two tables work together to resolve a [`ServiceTypeId`] to a factory:
//!
//! 1. The `services` configuration section maps each service id to a
//!    *factory type name*.
//! 2. A [`FactoryCatalog`] maps factory type names to constructors. It is
//!    filled at build time through the [`FACTORY_REGISTRY`] distributed slice
//!    and at startup through [`FactoryCatalog::register`].
//!
//! ```text
//! services.properties                     FactoryCatalog
//! ───────────────────                     ──────────────
//! game.database = builtin.sqlite    ──►   "builtin.sqlite" ──► fn() -> Box<dyn ServiceFactory>
//! ```
//!
//! # Registering a factory at build time
//!
//! ```rust,ignore
//! use keystone_core::{FactoryRegistration, FACTORY_REGISTRY, linkme};
//!
//! #[linkme::distributed_slice(FACTORY_REGISTRY)]
//! #[linkme(crate = keystone_core::linkme)]
//! static SQLITE_FACTORY: FactoryRegistration =
//!     FactoryRegistration::new("builtin.sqlite", || Ok(Box::new(SqliteFactory)));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use tracing::{debug, warn};

use crate::config::ConfigSection;
use crate::context::AppContext;
use crate::error::{BootstrapError, BootstrapResult, BoxError};
use crate::service::{ServiceArc, ServiceTypeId};

// =============================================================================
// ServiceFactory
// =============================================================================

/// Constructs exactly one kind of service.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    /// The service id this factory produces.
    fn service_type(&self) -> ServiceTypeId;

    /// Builds the service.
    ///
    /// May perform I/O. Must not dereference other services synchronously;
    /// they may not have been constructed yet.
    async fn create(&self, ctx: &AppContext) -> Result<ServiceArc, BoxError>;
}

/// Function pointer that instantiates a factory.
pub type FactoryConstructor = fn() -> Result<Box<dyn ServiceFactory>, BoxError>;

type SharedConstructor = Arc<dyn Fn() -> Result<Box<dyn ServiceFactory>, BoxError> + Send + Sync>;

// =============================================================================
// Build-time registry
// =============================================================================

/// A build-time factory registration.
#[derive(Clone, Copy)]
pub struct FactoryRegistration {
    /// Factory type name referenced from the `services` section.
    pub name: &'static str,
    /// Instantiates the factory.
    pub construct: FactoryConstructor,
}

impl FactoryRegistration {
    /// Creates a registration.
    pub const fn new(name: &'static str, construct: FactoryConstructor) -> Self {
        Self { name, construct }
    }
}

/// Factories contributed by every linked crate.
#[distributed_slice]
pub static FACTORY_REGISTRY: [FactoryRegistration];

// =============================================================================
// FactoryCatalog
// =============================================================================

/// Factory type name → constructor table.
#[derive(Clone, Default)]
pub struct FactoryCatalog {
    constructors: HashMap<String, SharedConstructor>,
}

impl FactoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from every entry of [`FACTORY_REGISTRY`].
    ///
    /// When several crates register the same name a warning is emitted and
    /// the **first** one wins.
    pub fn collect_all() -> Self {
        let mut catalog = Self::new();
        for entry in FACTORY_REGISTRY.iter() {
            if catalog.contains(entry.name) {
                warn!(
                    factory = entry.name,
                    "Multiple factories registered under the same name, using first"
                );
                continue;
            }
            let construct = entry.construct;
            catalog
                .constructors
                .insert(entry.name.to_string(), Arc::new(construct));
        }
        debug!(count = catalog.len(), "Collected build-time factory registrations");
        catalog
    }

    /// Adds a constructor at startup. An existing entry with the same name is
    /// kept and a warning is logged.
    pub fn register<F>(&mut self, name: impl Into<String>, construct: F)
    where
        F: Fn() -> Result<Box<dyn ServiceFactory>, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            warn!(factory = %name, "Factory already registered, keeping the first one");
            return;
        }
        self.constructors.insert(name, Arc::new(construct));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, construct: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ServiceFactory>, BoxError> + Send + Sync + 'static,
    {
        self.register(name, construct);
        self
    }

    /// Merges another catalog; entries already present here win.
    pub fn merge(mut self, other: FactoryCatalog) -> Self {
        for (name, construct) in other.constructors {
            self.constructors.entry(name).or_insert(construct);
        }
        self
    }

    /// Whether a factory type name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Number of known factory types.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    fn instantiate(&self, name: &str) -> Option<Result<Box<dyn ServiceFactory>, BoxError>> {
        self.constructors.get(name).map(|construct| construct())
    }
}

// =============================================================================
// FactoryRegistry
// =============================================================================

/// Resolves service ids to factories using the `services` section.
pub struct FactoryRegistry {
    declarations: HashMap<ServiceTypeId, String>,
    catalog: FactoryCatalog,
}

impl FactoryRegistry {
    /// Name of the configuration section that declares factories.
    pub const SECTION: &'static str = "services";

    /// Creates a registry from the `services` section and a catalog.
    pub fn from_section(section: &ConfigSection, catalog: FactoryCatalog) -> Self {
        let declarations = section
            .iter()
            .map(|(service, factory)| (ServiceTypeId::from(service), factory.trim().to_string()))
            .collect();
        Self {
            declarations,
            catalog,
        }
    }

    /// Factory type name declared for `service`.
    pub fn declared_factory(&self, service: &ServiceTypeId) -> Option<&str> {
        self.declarations.get(service).map(String::as_str)
    }

    /// Number of declared services.
    pub fn declared_count(&self) -> usize {
        self.declarations.len()
    }

    /// Instantiates the factory for `service`.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::FactoryNotDeclared`] when `services` has no entry.
    /// - [`BootstrapError::FactoryInstantiationFailure`] when the factory type
    ///   is unknown or its constructor fails.
    /// - [`BootstrapError::FactoryTypeMismatch`] when the factory produces a
    ///   different service.
    pub fn factory_for(&self, service: &ServiceTypeId) -> BootstrapResult<Box<dyn ServiceFactory>> {
        let factory_name =
            self.declared_factory(service)
                .ok_or_else(|| BootstrapError::FactoryNotDeclared {
                    service: service.clone(),
                })?;

        let factory = self
            .catalog
            .instantiate(factory_name)
            .unwrap_or_else(|| Err(format!("unknown factory type '{factory_name}'").into()))
            .map_err(|source| BootstrapError::FactoryInstantiationFailure {
                service: service.clone(),
                factory: factory_name.to_string(),
                source,
            })?;

        let produced = factory.service_type();
        if &produced != service {
            return Err(BootstrapError::FactoryTypeMismatch {
                factory: factory_name.to_string(),
                expected: service.clone(),
                actual: produced,
            });
        }
        Ok(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFactory;

    fn registry(section: ConfigSection) -> FactoryRegistry {
        let catalog = FactoryCatalog::new()
            .with("stub.x", || Ok(Box::new(StubFactory::new("svc.x", &[]))))
            .with("stub.w", || Ok(Box::new(StubFactory::new("svc.w", &[]))))
            .with("broken", || Err("constructor exploded".into()));
        FactoryRegistry::from_section(&section, catalog)
    }

    #[test]
    fn test_factory_for_declared_service() {
        let registry = registry(ConfigSection::new("services").with("svc.x", "stub.x"));
        let factory = registry.factory_for(&"svc.x".into()).unwrap();
        assert_eq!(factory.service_type().as_str(), "svc.x");
    }

    #[test]
    fn test_undeclared_service() {
        let registry = registry(ConfigSection::new("services"));
        let err = registry.factory_for(&"svc.z".into()).err().unwrap();
        assert!(matches!(
            err,
            BootstrapError::FactoryNotDeclared { service } if service.as_str() == "svc.z"
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let registry = registry(ConfigSection::new("services").with("svc.x", "stub.w"));
        let err = registry.factory_for(&"svc.x".into()).err().unwrap();
        match err {
            BootstrapError::FactoryTypeMismatch {
                factory,
                expected,
                actual,
            } => {
                assert_eq!(factory, "stub.w");
                assert_eq!(expected.as_str(), "svc.x");
                assert_eq!(actual.as_str(), "svc.w");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_instantiation_failures() {
        let registry = registry(
            ConfigSection::new("services")
                .with("svc.x", "broken")
                .with("svc.y", "does.not.exist"),
        );
        assert!(matches!(
            registry.factory_for(&"svc.x".into()),
            Err(BootstrapError::FactoryInstantiationFailure { factory, .. }) if factory == "broken"
        ));
        assert!(matches!(
            registry.factory_for(&"svc.y".into()),
            Err(BootstrapError::FactoryInstantiationFailure { factory, .. }) if factory == "does.not.exist"
        ));
    }

    #[test]
    fn test_catalog_first_registration_wins() {
        let catalog = FactoryCatalog::new()
            .with("dup", || Ok(Box::new(StubFactory::new("svc.first", &[]))))
            .with("dup", || Ok(Box::new(StubFactory::new("svc.second", &[]))));
        assert_eq!(catalog.len(), 1);

        let section = ConfigSection::new("services").with("svc.first", "dup");
        let registry = FactoryRegistry::from_section(&section, catalog);
        let factory = registry.factory_for(&"svc.first".into()).unwrap();
        assert_eq!(factory.service_type().as_str(), "svc.first");
    }
}
