//! The `keystone` launcher.
//!
//! Takes the configuration directory, sets up logging from its runtime
//! settings and runs the bootstrap pipeline with every plugin and factory
//! linked into the binary. Exits with `0` once the session disconnects and
//! `1` on any bootstrap failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use keystone_core::{BootstrapResult, FactoryCatalog, PluginRegistry};
use keystone_runtime::{BootstrapPipeline, ConfigDirectory, ConsoleTransport, logging};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "keystone", version, about)]
struct Cli {
    /// Directory holding `bot.properties`, `services.properties` and the
    /// other configuration sections.
    config_dir: PathBuf,
    /// Runtime settings file to use instead of `runtime.toml` in the
    /// configuration directory.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let dir = ConfigDirectory::new(&cli.config_dir);

    let mut loader = dir.runtime_settings();
    if let Some(path) = &cli.settings {
        loader = loader.file(path);
    }
    let runtime = match loader.load() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("keystone: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_from_config(&runtime.logging);

    info!(
        config_dir = %cli.config_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting keystone"
    );

    let outcome = BootstrapPipeline::new(dir, ConsoleTransport)
        .plugins(PluginRegistry::collect_all())
        .catalog(FactoryCatalog::collect_all())
        .settings(runtime.bootstrap)
        .run()
        .await;

    match &outcome {
        Ok(report) => info!(
            services = report.services.len(),
            plugins = report.plugins.len(),
            "Disconnected"
        ),
        Err(e) => error!(kind = e.kind(), "Exiting after bootstrap failure: {e}"),
    }
    exit_code(&outcome)
}

/// `0` after a graceful disconnect, `1` on any bootstrap failure.
fn exit_code<T>(outcome: &BootstrapResult<T>) -> ExitCode {
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use keystone_core::{BootstrapError, ServiceTypeId};

    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok::<(), _>(())), ExitCode::SUCCESS);

        let missing: BootstrapResult<()> = Err(BootstrapError::ConfigMissing {
            name: "bot".into(),
        });
        assert_eq!(exit_code(&missing), ExitCode::from(1));

        let undeclared: BootstrapResult<()> = Err(BootstrapError::FactoryNotDeclared {
            service: ServiceTypeId::from("svc.z"),
        });
        assert_eq!(exit_code(&undeclared), ExitCode::from(1));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_directory_and_settings() {
        let cli = Cli::try_parse_from(["keystone", "./config", "--settings", "prod.toml"]).unwrap();
        assert_eq!(cli.config_dir, PathBuf::from("./config"));
        assert_eq!(cli.settings, Some(PathBuf::from("prod.toml")));

        assert!(Cli::try_parse_from(["keystone"]).is_err());
    }
}
