//! Configuration for the Keystone launcher.
//!
//! Application sections come from a directory of `.properties` files; the
//! launcher's own settings come from figment (defaults, `runtime.toml`,
//! `KEYSTONE_*` environment variables).

pub mod error;
pub mod loader;
pub mod properties;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigDirectory, RuntimeConfigLoader};
pub use properties::PropertiesError;
pub use schema::{
    BootstrapConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RuntimeConfig,
    SpanEventConfig,
};
