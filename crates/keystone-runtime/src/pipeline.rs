//! The bootstrap pipeline.
//!
//! Drives one application from a configuration directory to a running
//! gateway session:
//!
//! ```text
//! Init → ConfigLoaded → ClientBuilt → PluginsEnumerated → ServicesResolved
//!      → PluginsSetUp → Running → Terminated
//! ```
//!
//! Stages run strictly in order. The first error moves the pipeline to
//! [`PipelineState::Failed`] and is returned from [`BootstrapPipeline::run`];
//! nothing is retried and nothing already built is torn down.
//!
//! # Example
//!
//! ```rust,ignore
//! use keystone_runtime::{BootstrapPipeline, ConfigDirectory, ConsoleTransport};
//!
//! let report = BootstrapPipeline::new(ConfigDirectory::new("./config"), ConsoleTransport)
//!     .settings(runtime.bootstrap)
//!     .run()
//!     .await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use keystone_core::{
    AppContext, BootstrapError, BootstrapResult, BoxError, ConfigStore, FactoryCatalog,
    FactoryRegistry, PluginDescriptor, PluginMetadata, PluginRegistry, ServiceTypeId,
    TransportBuilder,
};
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{BootstrapConfig, ConfigDirectory};
use crate::settings::{BOT_SECTION, BotSettings};

const SERVICES_SECTION: &str = FactoryRegistry::SECTION;
const STARTED_MESSAGE: &str = "Bot started!";

// =============================================================================
// State
// =============================================================================

/// Observable state of a [`BootstrapPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing has happened yet.
    Init,
    /// Configuration loaded and the `bot` section parsed.
    ConfigLoaded,
    /// Transport client built and the context created.
    ClientBuilt,
    /// Plugins listed and their requirements collected.
    PluginsEnumerated,
    /// Every required service constructed.
    ServicesResolved,
    /// Every setup hook succeeded and metadata was published.
    PluginsSetUp,
    /// Logged in; waiting for the session to end.
    Running,
    /// The session ended normally.
    Terminated,
    /// A stage failed.
    Failed,
}

impl PipelineState {
    /// Lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ConfigLoaded => "config_loaded",
            Self::ClientBuilt => "client_built",
            Self::PluginsEnumerated => "plugins_enumerated",
            Self::ServicesResolved => "services_resolved",
            Self::PluginsSetUp => "plugins_set_up",
            Self::Running => "running",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }

    /// Whether the pipeline has stopped.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Configuration source
// =============================================================================

/// Where the application sections come from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A directory of `.properties` files, read when the pipeline runs.
    Directory(ConfigDirectory),
    /// An already loaded store.
    Store(ConfigStore),
}

impl ConfigSource {
    async fn load(self) -> BootstrapResult<ConfigStore> {
        match self {
            Self::Directory(dir) => Ok(dir.load().await?),
            Self::Store(store) => Ok(store),
        }
    }
}

impl From<ConfigDirectory> for ConfigSource {
    fn from(dir: ConfigDirectory) -> Self {
        Self::Directory(dir)
    }
}

impl From<ConfigStore> for ConfigSource {
    fn from(store: ConfigStore) -> Self {
        Self::Store(store)
    }
}

// =============================================================================
// Report
// =============================================================================

/// Outcome of a pipeline that reached [`PipelineState::Terminated`].
#[derive(Debug)]
pub struct BootstrapReport {
    /// Ids of every constructed service, sorted.
    pub services: Vec<ServiceTypeId>,
    /// Metadata of every set-up plugin.
    pub plugins: Vec<PluginMetadata>,
    /// The application context, still holding the built services.
    pub context: AppContext,
}

// =============================================================================
// BootstrapPipeline
// =============================================================================

/// Runs the bootstrap stages for one application.
pub struct BootstrapPipeline {
    config: ConfigSource,
    transport: Arc<dyn TransportBuilder>,
    plugins: PluginRegistry,
    catalog: FactoryCatalog,
    settings: BootstrapConfig,
    state: watch::Sender<PipelineState>,
}

impl BootstrapPipeline {
    /// Creates a pipeline with every build-time registered plugin and
    /// factory.
    pub fn new(config: impl Into<ConfigSource>, transport: impl TransportBuilder + 'static) -> Self {
        let (state, _) = watch::channel(PipelineState::Init);
        Self {
            config: config.into(),
            transport: Arc::new(transport),
            plugins: PluginRegistry::collect_all(),
            catalog: FactoryCatalog::collect_all(),
            settings: BootstrapConfig::default(),
            state,
        }
    }

    /// Replaces the plugin set.
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Replaces the factory catalog.
    pub fn catalog(mut self, catalog: FactoryCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets timeouts and the cycle policy.
    pub fn settings(mut self, settings: BootstrapConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Runs every stage and waits for the session to end.
    ///
    /// # Errors
    ///
    /// The first error of any stage. The state is [`PipelineState::Failed`]
    /// afterwards and the error has been logged.
    pub async fn run(self) -> BootstrapResult<BootstrapReport> {
        let state = self.state.clone();
        let span = info_span!("bootstrap");

        match self.drive().instrument(span).await {
            Ok(report) => {
                state.send_replace(PipelineState::Terminated);
                info!(
                    services = report.services.len(),
                    plugins = report.plugins.len(),
                    "Session ended, shutting down"
                );
                Ok(report)
            }
            Err(e) => {
                let stage = state.send_replace(PipelineState::Failed);
                error!(stage = %stage, kind = e.kind(), error = %e, "Bootstrap failed");
                Err(e)
            }
        }
    }

    async fn drive(self) -> BootstrapResult<BootstrapReport> {
        let Self {
            config,
            transport,
            plugins,
            catalog,
            settings,
            state,
        } = self;

        // ─── Configuration ────────────────────────────────────────────────────
        let store = config.load().await?;
        let bot = BotSettings::from_section(store.get(BOT_SECTION)?)?;
        store.get(SERVICES_SECTION)?;
        advance(&state, PipelineState::ConfigLoaded);

        // ─── Transport client ────────────────────────────────────────────────
        let client = transport.build(&bot.client).await?;
        info!(transport = client.name(), "Transport client built");
        let ctx = AppContext::new(Arc::new(store), client, bot.debug_log_channel);
        advance(&state, PipelineState::ClientBuilt);

        // ─── Plugins ──────────────────────────────────────────────────────────
        let required = plugins.required_services();
        info!(
            plugins = plugins.len(),
            services = required.len(),
            "Plugins enumerated"
        );
        advance(&state, PipelineState::PluginsEnumerated);

        // ─── Services ─────────────────────────────────────────────────────────
        let factories = FactoryRegistry::from_section(ctx.section(SERVICES_SECTION)?, catalog);
        let resolution = ctx
            .services()
            .resolve(
                required,
                Arc::new(factories),
                ctx.clone(),
                settings.resolve_options(),
            )
            .await?;
        info!(
            constructed = resolution.constructed.len(),
            elapsed_ms = resolution.elapsed.as_millis() as u64,
            "Services resolved"
        );
        advance(&state, PipelineState::ServicesResolved);

        // ─── Setup ────────────────────────────────────────────────────────────
        let timeout = settings.setup_timeout();
        try_join_all(
            plugins
                .iter()
                .map(|descriptor| set_up(*descriptor, ctx.clone(), timeout)),
        )
        .await?;
        ctx.plugin_directory().publish(plugins.metadata());
        info!(plugins = plugins.len(), "Plugins set up");
        advance(&state, PipelineState::PluginsSetUp);

        // ─── Running ──────────────────────────────────────────────────────────
        let session = ctx.client().login(bot.presence.clone()).await?;
        ctx.set_session(Arc::clone(&session));
        advance(&state, PipelineState::Running);
        info!("Bot is running");
        ctx.log(STARTED_MESSAGE).await;

        session.on_disconnect().await;

        Ok(BootstrapReport {
            services: ctx.services().ids(),
            plugins: ctx.plugins(),
            context: ctx,
        })
    }
}

impl fmt::Debug for BootstrapPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapPipeline")
            .field("config", &self.config)
            .field("plugins", &self.plugins.len())
            .field("catalog", &self.catalog.len())
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn advance(state: &watch::Sender<PipelineState>, next: PipelineState) {
    state.send_replace(next);
    debug!(state = %next, "Pipeline state changed");
}

async fn set_up(
    descriptor: PluginDescriptor,
    ctx: AppContext,
    timeout: Option<Duration>,
) -> BootstrapResult<()> {
    let setup = descriptor.run_setup(ctx);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, setup).await {
            Ok(result) => result,
            Err(elapsed) => Err(Box::new(elapsed) as BoxError),
        },
        None => setup.await,
    };

    result.map_err(|source| BootstrapError::PluginSetupFailure {
        plugin: descriptor.name.to_string(),
        source,
    })?;
    debug!(plugin = descriptor.name, "Plugin set up");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
