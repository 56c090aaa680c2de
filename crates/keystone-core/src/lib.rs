//! # Keystone Core
//!
//! The service resolution engine and plugin model of the Keystone bootstrap
//! framework.
//!
//! A Keystone application is a set of plugins. Each plugin declares the
//! services it needs by [`ServiceTypeId`]; the `services` configuration
//! section maps every id to a factory; the [`ServiceContainer`] turns the
//! union of all declared requirements into a fully constructed, deduplicated
//! service map before any plugin's setup hook runs.
//!
//! ## Layers
//!
//! - **Configuration**: [`ConfigStore`] / [`ConfigSection`], string-valued
//!   sections keyed by name.
//! - **Services**: the [`Service`] trait, [`ServiceFactory`] and the
//!   [`FactoryRegistry`] that resolves ids to factories.
//! - **Resolution**: [`ServiceContainer::resolve`], a fan-out/fan-in traversal
//!   that constructs services concurrently and detects completion with an
//!   atomic outstanding-work counter.
//! - **Plugins**: [`PluginDescriptor`], [`PluginRegistry`] and the
//!   [`define_plugin!`] macro.
//! - **Integration**: [`AppContext`] and the transport traits supplied by the
//!   host.
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystone_core::prelude::*;
//!
//! let factories = FactoryRegistry::from_section(config.get("services")?, catalog);
//! let container = ctx.services().clone();
//! container
//!     .resolve(plugins.required_services(), Arc::new(factories), ctx.clone(), ResolveOptions::default())
//!     .await?;
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod factory;
pub mod plugin;
pub mod service;
pub mod transport;

pub use config::{ConfigSection, ConfigStore};
pub use container::{Progress, ResolutionReport, ResolveOptions, ServiceContainer};
pub use context::{AppContext, PluginDirectory};
pub use error::{BootstrapError, BootstrapResult, BoxError};
pub use factory::{
    FACTORY_REGISTRY, FactoryCatalog, FactoryConstructor, FactoryRegistration, FactoryRegistry,
    ServiceFactory,
};
pub use plugin::{
    KEYSTONE_PLUGIN_API_VERSION, PLUGIN_REGISTRY, PluginDescriptor, PluginMetadata,
    PluginRegistry, SetupFn,
};
pub use service::{Service, ServiceArc, ServiceMeta, ServiceTypeId};
pub use transport::{
    Activity, ClientSettings, GatewaySession, Presence, Snowflake, Status, TransportBuilder,
    TransportClient, TransportError, TransportResult,
};

#[doc(hidden)]
pub use futures::future::BoxFuture;
#[doc(hidden)]
pub use linkme;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        AppContext, BootstrapError, BootstrapResult, BoxError, ConfigSection, ConfigStore,
        FactoryCatalog, FactoryRegistry, PluginDescriptor, PluginMetadata, PluginRegistry,
        ResolveOptions, Service, ServiceArc, ServiceContainer, ServiceFactory, ServiceMeta,
        ServiceTypeId, define_plugin,
    };
}

#[cfg(test)]
pub(crate) mod testing;
