//! # Keystone
//!
//! A plugin bootstrap framework: it constructs exactly the services installed
//! plugins need, then starts them.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────────┐   ┌───────────────┐
//! │ config dir   │──▶│ transport    │──▶│ service resolution │──▶│ plugin setup  │──▶ running
//! │ .properties  │   │ client       │   │ (fan-out/fan-in)   │   │ (concurrent)  │
//! └──────────────┘   └──────────────┘   └────────────────────┘   └───────────────┘
//! ```
//!
//! - **Plugins** declare service ids and an async setup hook.
//! - **Services** are built by factories named in `services.properties`.
//! - **Resolution** constructs the transitive closure of all requirements
//!   concurrently, once per id, before any setup hook runs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keystone::prelude::*;
//!
//! #[distributed_slice(PLUGIN_REGISTRY)]
//! #[linkme(crate = keystone::core::linkme)]
//! static STATS: PluginDescriptor = define_plugin! {
//!     name: "stats",
//!     requires: ["game.database"],
//!     setup: |ctx| {
//!         ctx.log("stats ready").await;
//!         Ok(())
//!     },
//! };
//! ```
//!
//! Then run the `keystone` binary with the configuration directory.
//!
//! ## Features
//!
//! - `toml-config`: `runtime.toml` settings file (default)
//! - `yaml-config`: `runtime.yaml` settings file
//! - `json-log`: JSON log lines

pub use keystone_core as core;
pub use keystone_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use keystone::prelude::*;
/// ```
pub mod prelude {
    // Pipeline - main entry point
    pub use keystone_runtime::{BootstrapPipeline, ConfigDirectory, ConsoleTransport, PipelineState};

    // Plugin system
    pub use keystone_core::linkme::distributed_slice;
    pub use keystone_core::{
        FACTORY_REGISTRY, FactoryRegistration, PLUGIN_REGISTRY, PluginDescriptor, PluginMetadata,
        define_plugin,
    };

    // Services
    pub use keystone_core::{
        AppContext, BoxError, FactoryCatalog, Service, ServiceArc, ServiceFactory, ServiceMeta,
        ServiceTypeId,
    };

    // Errors
    pub use keystone_core::{BootstrapError, BootstrapResult};
}
