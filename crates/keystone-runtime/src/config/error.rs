//! Configuration error types.

use std::path::PathBuf;

use keystone_core::BootstrapError;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration directory does not exist or is not a directory.
    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// An explicitly requested settings file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read a configuration file or list the directory.
    #[error("Failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    /// A `.properties` file is malformed.
    #[error("Failed to parse {file}:{line}: {reason}")]
    Parse {
        /// File being parsed.
        file: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// Runtime settings could not be extracted.
    #[error("Failed to extract runtime settings: {0}")]
    Extract(String),

    /// The runtime settings file has an unsupported or disabled format.
    #[error("Unsupported or disabled runtime settings format: {0}")]
    UnsupportedFormat(PathBuf),
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(file: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(e.to_string())
    }
}

impl From<ConfigError> for BootstrapError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Parse { file, line, reason } => BootstrapError::malformed(
                section_name(&file),
                format!("line {line}"),
                reason,
            ),
            ConfigError::DirectoryNotFound(dir) => BootstrapError::ConfigMissing {
                name: dir.display().to_string(),
            },
            other => BootstrapError::malformed("<config>", "<directory>", other.to_string()),
        }
    }
}

fn section_name(file: &std::path::Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
