//! Configuration loading.
//!
//! Two independent sources live in the configuration directory:
//!
//! - **Application sections**: every `*.properties` file becomes one
//!   [`ConfigSection`] named after the file stem (`bot.properties` → `bot`).
//!   Loaded by [`ConfigDirectory::load`].
//! - **Runtime settings**: an optional `runtime.toml` (or `runtime.yaml` with
//!   the `yaml-config` feature) plus `KEYSTONE_*` environment variables,
//!   layered with figment by [`RuntimeConfigLoader`].
//!
//! # Runtime settings priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Settings file
//! 3. Environment variables (`KEYSTONE_` prefix, `__` as separator)
//! 4. Programmatic overrides
//!
//! - `KEYSTONE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `KEYSTONE_BOOTSTRAP__CONSTRUCT_TIMEOUT_SECS=30` → `bootstrap.construct_timeout_secs = 30`
//!
//! # Example
//!
//! ```rust,ignore
//! let dir = ConfigDirectory::new("./config");
//! let runtime = dir.runtime_settings().load()?;
//! let store = dir.load().await?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use futures::future::try_join_all;
use keystone_core::{ConfigSection, ConfigStore};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::properties;
use super::schema::RuntimeConfig;

const PROPERTIES_EXTENSION: &str = "properties";

// =============================================================================
// ConfigDirectory
// =============================================================================

/// A directory of `.properties` files.
#[derive(Debug, Clone)]
pub struct ConfigDirectory {
    path: PathBuf,
}

impl ConfigDirectory {
    /// Wraps a directory path. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A runtime settings loader that searches this directory.
    pub fn runtime_settings(&self) -> RuntimeConfigLoader {
        RuntimeConfigLoader::new().search_path(&self.path)
    }

    /// Reads and parses every `*.properties` file concurrently.
    ///
    /// Other files and subdirectories are ignored.
    pub async fn load(&self) -> ConfigResult<ConfigStore> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ConfigError::DirectoryNotFound(self.path.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::DirectoryNotFound(self.path.clone()));
            }
            Err(e) => return Err(ConfigError::Read(e)),
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_properties = path
                .extension()
                .is_some_and(|ext| ext == PROPERTIES_EXTENSION);
            if is_properties && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let sections = try_join_all(files.into_iter().map(load_section)).await?;
        let store: ConfigStore = sections.into_iter().collect();

        info!(
            path = %self.path.display(),
            sections = ?store.names().collect::<Vec<_>>(),
            "Configuration loaded"
        );
        Ok(store)
    }
}

async fn load_section(path: PathBuf) -> ConfigResult<ConfigSection> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = tokio::fs::read_to_string(&path).await?;
    let entries = properties::parse(&text)
        .map_err(|e| ConfigError::parse(&path, e.line, e.reason))?;

    debug!(section = %name, keys = entries.len(), "Parsed configuration file");
    Ok(ConfigSection::from_entries(name, entries))
}

// =============================================================================
// RuntimeConfigLoader
// =============================================================================

/// Figment-based loader for [`RuntimeConfig`].
pub struct RuntimeConfigLoader {
    figment: Figment,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for RuntimeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfigLoader {
    /// Environment variable prefix.
    pub const ENV_PREFIX: &'static str = "KEYSTONE_";

    /// Creates a loader with defaults and environment variables enabled.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a directory searched for `runtime.*` files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads this exact file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges settings programmatically, above every other source.
    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the settings.
    pub fn load(self) -> ConfigResult<RuntimeConfig> {
        let figment = self.build_figment()?;
        let config: RuntimeConfig = figment.extract()?;

        debug!(
            logging_level = %config.logging.level,
            reject_cycles = config.bootstrap.reject_cycles,
            "Runtime settings loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading runtime settings file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = Self::ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.figment))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Merges the first `runtime.*` file found in the search paths.
    fn load_config_files(&self, figment: Figment) -> Figment {
        let mut names: Vec<&str> = Vec::new();
        #[cfg(feature = "toml-config")]
        names.push("runtime.toml");
        #[cfg(feature = "yaml-config")]
        names.extend(["runtime.yaml", "runtime.yml"]);

        for dir in &self.search_paths {
            for name in &names {
                let path = dir.join(name);
                if path.is_file() {
                    info!(path = %path.display(), "Loading runtime settings file");
                    // Only enabled formats are in `names`.
                    return Self::merge_config_file(figment.clone(), &path).unwrap_or(figment);
                }
            }
        }
        debug!("No runtime settings file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_load_properties_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bot.properties", "token = abc\nstatus = idle\n");
        write(dir.path(), "services.properties", "game.database = builtin.sqlite\n");
        write(dir.path(), "README.md", "not configuration");
        fs::create_dir(dir.path().join("nested.properties")).unwrap();

        let store = ConfigDirectory::new(dir.path()).load().await.unwrap();

        assert_eq!(store.names().collect::<Vec<_>>(), ["bot", "services"]);
        let bot = store.get("bot").unwrap();
        assert_eq!(bot.get("token"), Some("abc"));
        assert_eq!(bot.get("status"), Some("idle"));
        assert_eq!(
            store.get("services").unwrap().get("game.database"),
            Some("builtin.sqlite")
        );
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = ConfigDirectory::new(&missing).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryNotFound(path) if path == missing));
    }

    #[tokio::test]
    async fn test_plain_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bot.properties");
        write(dir.path(), "bot.properties", "token = abc\n");

        let err = ConfigDirectory::new(&file).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryNotFound(path) if path == file));
    }

    #[tokio::test]
    async fn test_unreadable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plain", "not a directory");
        // A path below a regular file fails with ENOTDIR, not NotFound.
        let below_file = dir.path().join("plain").join("config");

        let err = ConfigDirectory::new(&below_file).load().await.unwrap_err();
        match err {
            ConfigError::Read(io) => assert_ne!(io.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_parse_error_names_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bot.properties", "token = abc\nname = \\uZZZZ\n");

        let err = ConfigDirectory::new(dir.path()).load().await.unwrap_err();
        match err {
            ConfigError::Parse { file, line, .. } => {
                assert!(file.ends_with("bot.properties"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_runtime_settings() {
        let config = RuntimeConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.bootstrap.resolve_options().construct_timeout, None);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_runtime_settings_file_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "runtime.toml",
            r#"
[logging]
level = "debug"
format = "pretty"

[logging.filters]
keystone_core = "trace"

[bootstrap]
construct_timeout_secs = 30
reject_cycles = true
"#,
        );

        let config = ConfigDirectory::new(dir.path())
            .runtime_settings()
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters.get("keystone_core"), Some(&LogLevel::Trace));
        let options = config.bootstrap.resolve_options();
        assert_eq!(options.construct_timeout, Some(std::time::Duration::from_secs(30)));
        assert!(options.reject_cycles);
        assert_eq!(config.bootstrap.setup_timeout(), None);
    }

    #[test]
    fn test_programmatic_override_wins() {
        let mut overrides = RuntimeConfig::default();
        overrides.bootstrap.setup_timeout_secs = Some(5);

        let config = RuntimeConfigLoader::new()
            .without_env()
            .merge(overrides)
            .load()
            .unwrap();
        assert_eq!(config.bootstrap.setup_timeout_secs, Some(5));
    }

    #[test]
    fn test_unsupported_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.ini");
        fs::write(&path, "level=debug").unwrap();

        let err = RuntimeConfigLoader::new().file(&path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
