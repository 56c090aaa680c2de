//! Application context shared by factories, plugins and the pipeline.
//!
//! [`AppContext`] is a cheap, cloneable handle. Factories receive it while
//! services are being constructed; setup hooks receive it once the service
//! graph has settled. Service lookups are always lazy: they read the live
//! [`ServiceContainer`] at call time.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{ConfigSection, ConfigStore};
use crate::container::ServiceContainer;
use crate::error::BootstrapResult;
use crate::plugin::PluginMetadata;
use crate::service::{ServiceArc, ServiceMeta, ServiceTypeId};
use crate::transport::{GatewaySession, Snowflake, TransportClient};

// ─── PluginDirectory ──────────────────────────────────────────────────────────

/// Metadata of every plugin that completed setup.
///
/// Filled once by the pipeline after all setup hooks succeed; empty before.
#[derive(Debug, Clone, Default)]
pub struct PluginDirectory {
    entries: Arc<RwLock<Vec<PluginMetadata>>>,
}

impl PluginDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the directory contents.
    pub fn publish(&self, metadata: Vec<PluginMetadata>) {
        *self.entries.write() = metadata;
    }

    /// Snapshot of all entries.
    pub fn snapshot(&self) -> Vec<PluginMetadata> {
        self.entries.read().clone()
    }

    /// Looks up a plugin by name.
    pub fn find(&self, name: &str) -> Option<PluginMetadata> {
        self.entries.read().iter().find(|m| m.name == name).copied()
    }

    /// Number of published plugins.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// ─── AppContext ───────────────────────────────────────────────────────────────

struct ContextInner {
    config: Arc<ConfigStore>,
    client: Arc<dyn TransportClient>,
    services: ServiceContainer,
    plugins: PluginDirectory,
    debug_log_channel: Option<Snowflake>,
    session: OnceLock<Arc<dyn GatewaySession>>,
}

/// Handle to everything a factory or plugin may touch.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

impl AppContext {
    /// Creates a context around a built transport client.
    pub fn new(
        config: Arc<ConfigStore>,
        client: Arc<dyn TransportClient>,
        debug_log_channel: Option<Snowflake>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                client,
                services: ServiceContainer::new(),
                plugins: PluginDirectory::new(),
                debug_log_channel,
                session: OnceLock::new(),
            }),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigStore {
        &self.inner.config
    }

    /// Shortcut for `config().get(name)`.
    pub fn section(&self, name: &str) -> BootstrapResult<&ConfigSection> {
        self.inner.config.get(name)
    }

    /// The primary transport client.
    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.inner.client
    }

    /// The service container of this bootstrap run.
    pub fn services(&self) -> &ServiceContainer {
        &self.inner.services
    }

    /// Looks up a constructed service by its static id and downcasts it.
    ///
    /// Returns `None` while the service is not (yet) constructed.
    pub fn service<T>(&self) -> Option<Arc<T>>
    where
        T: ServiceMeta + Send + Sync + 'static,
    {
        self.inner.services.get_typed::<T>()
    }

    /// Looks up a constructed service by id.
    pub fn service_by_id(&self, id: &ServiceTypeId) -> Option<ServiceArc> {
        self.inner.services.get(id)
    }

    /// Metadata of all set-up plugins.
    pub fn plugins(&self) -> Vec<PluginMetadata> {
        self.inner.plugins.snapshot()
    }

    /// The shared plugin directory.
    pub fn plugin_directory(&self) -> &PluginDirectory {
        &self.inner.plugins
    }

    /// Channel that receives diagnostic messages, if configured.
    pub fn debug_log_channel(&self) -> Option<Snowflake> {
        self.inner.debug_log_channel
    }

    /// Stores the gateway session. Only the first call has any effect.
    pub fn set_session(&self, session: Arc<dyn GatewaySession>) -> bool {
        self.inner.session.set(session).is_ok()
    }

    /// The gateway session, once logged in.
    pub fn session(&self) -> Option<&Arc<dyn GatewaySession>> {
        self.inner.session.get()
    }

    /// Sends a diagnostic message to the debug log channel.
    ///
    /// Delivery failures are logged and swallowed.
    pub async fn log(&self, message: &str) {
        let Some(channel) = self.inner.debug_log_channel else {
            debug!(message, "No debug log channel configured");
            return;
        };
        if let Err(e) = self.inner.client.send_message(channel, message).await {
            warn!(%channel, error = %e, "Failed to deliver debug log message");
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("client", &self.inner.client.name())
            .field("services", &self.inner.services.len())
            .field("plugins", &self.inner.plugins.len())
            .field("debug_log_channel", &self.inner.debug_log_channel)
            .finish_non_exhaustive()
    }
}
