//! Services provided by the runtime itself.
//!
//! The factory below is registered at build time, so any application can
//! declare it in `services.properties`:
//!
//! ```text
//! keystone.plugin_metadata = builtin.plugin_metadata
//! ```

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use keystone_core::linkme::distributed_slice;
use keystone_core::{
    AppContext, BoxError, FACTORY_REGISTRY, FactoryRegistration, PluginDirectory, PluginMetadata,
    Service, ServiceArc, ServiceFactory, ServiceMeta, ServiceTypeId,
};

// ─── Plugin metadata ──────────────────────────────────────────────────────────

/// Exposes the metadata of every plugin that completed setup.
///
/// The directory is read live: it is empty until the pipeline has finished
/// running every setup hook.
pub struct PluginMetadataService {
    directory: PluginDirectory,
}

impl PluginMetadataService {
    /// Factory type name to use in `services.properties`.
    pub const FACTORY: &'static str = "builtin.plugin_metadata";

    /// Metadata of all set-up plugins.
    pub fn plugins(&self) -> Vec<PluginMetadata> {
        self.directory.snapshot()
    }

    /// Looks up a plugin by name.
    pub fn find(&self, name: &str) -> Option<PluginMetadata> {
        self.directory.find(name)
    }

    /// All metadata as a JSON array.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.plugins()).unwrap_or(serde_json::Value::Null)
    }
}

impl ServiceMeta for PluginMetadataService {
    const ID: &'static str = "keystone.plugin_metadata";
}

impl Service for PluginMetadataService {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct PluginMetadataFactory;

#[async_trait]
impl ServiceFactory for PluginMetadataFactory {
    fn service_type(&self) -> ServiceTypeId {
        ServiceTypeId::of::<PluginMetadataService>()
    }

    async fn create(&self, ctx: &AppContext) -> Result<ServiceArc, BoxError> {
        Ok(Arc::new(PluginMetadataService {
            directory: ctx.plugin_directory().clone(),
        }))
    }
}

fn plugin_metadata_factory() -> Result<Box<dyn ServiceFactory>, BoxError> {
    Ok(Box::new(PluginMetadataFactory))
}

#[distributed_slice(FACTORY_REGISTRY)]
#[linkme(crate = keystone_core::linkme)]
static PLUGIN_METADATA_FACTORY: FactoryRegistration =
    FactoryRegistration::new(PluginMetadataService::FACTORY, plugin_metadata_factory);

#[cfg(test)]
mod tests {
    use keystone_core::{ConfigSection, ConfigStore, FactoryCatalog, FactoryRegistry, ResolveOptions};

    use super::*;
    use crate::transport::ConsoleClient;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_registered_at_build_time() {
        let catalog = FactoryCatalog::collect_all();
        assert!(catalog.contains(PluginMetadataService::FACTORY));

        let services = ConfigSection::new("services")
            .with(PluginMetadataService::ID, PluginMetadataService::FACTORY);
        let ctx = AppContext::new(
            Arc::new(ConfigStore::new().with_section(services.clone())),
            Arc::new(ConsoleClient),
            None,
        );
        let registry = Arc::new(FactoryRegistry::from_section(&services, catalog));

        ctx.services()
            .resolve(
                [ServiceTypeId::of::<PluginMetadataService>()],
                registry,
                ctx.clone(),
                ResolveOptions::default(),
            )
            .await
            .unwrap();

        let service = ctx.service::<PluginMetadataService>().unwrap();
        assert!(service.plugins().is_empty());

        ctx.plugin_directory().publish(vec![PluginMetadata::named("greeter")]);
        assert_eq!(service.find("greeter").map(|m| m.name), Some("greeter"));
        assert_eq!(service.to_json()[0]["name"], "greeter");
    }
}
