//! Keystone Runtime - the launcher side of the Keystone bootstrap framework.
//!
//! This crate provides:
//! - Loading application sections from a directory of `.properties` files
//! - Runtime settings layered with figment (`runtime.toml`, `KEYSTONE_*`)
//! - Logging configuration
//! - Parsing of the `bot` section, including the initial presence
//! - The [`BootstrapPipeline`] state machine
//! - A console transport and the built-in `keystone.plugin_metadata` service
//!
//! ```ignore
//! use keystone_runtime::{BootstrapPipeline, ConfigDirectory, ConsoleTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dir = ConfigDirectory::new("./config");
//!     let runtime = dir.runtime_settings().load().unwrap_or_default();
//!     keystone_runtime::logging::init_from_config(&runtime.logging);
//!
//!     let outcome = BootstrapPipeline::new(dir, ConsoleTransport)
//!         .settings(runtime.bootstrap)
//!         .run()
//!         .await;
//! }
//! ```

pub mod builtin;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod settings;
pub mod transport;

// Re-exports
pub use builtin::PluginMetadataService;
pub use config::{
    BootstrapConfig, ConfigDirectory, ConfigError, ConfigResult, LoggingConfig, RuntimeConfig,
    RuntimeConfigLoader,
};
pub use logging::{LoggingBuilder, SpanEvents};
pub use pipeline::{BootstrapPipeline, BootstrapReport, ConfigSource, PipelineState};
pub use settings::{BotSettings, parse_activity, parse_presence};
pub use transport::{ConsoleClient, ConsoleTransport, shutdown_signal};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
