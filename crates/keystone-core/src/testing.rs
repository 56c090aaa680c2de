//! Test doubles shared by the unit tests of this crate.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{ConfigSection, ConfigStore};
use crate::context::AppContext;
use crate::error::BoxError;
use crate::factory::{FactoryCatalog, FactoryRegistry, ServiceFactory};
use crate::service::{Service, ServiceArc, ServiceMeta, ServiceTypeId};
use crate::transport::{
    GatewaySession, Presence, Snowflake, TransportClient, TransportError, TransportResult,
};

// ─── Transport ────────────────────────────────────────────────────────────────

/// Records sent messages; sessions disconnect immediately.
#[derive(Default)]
pub(crate) struct NoopClient {
    sent: Mutex<Vec<(Snowflake, String)>>,
    fail_sends: bool,
}

impl NoopClient {
    pub(crate) fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Default::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<(Snowflake, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TransportClient for NoopClient {
    fn name(&self) -> &str {
        "noop"
    }

    async fn send_message(&self, channel: Snowflake, content: &str) -> TransportResult<()> {
        if self.fail_sends {
            return Err(TransportError::SendFailed {
                channel,
                reason: "refused".into(),
            });
        }
        self.sent.lock().push((channel, content.to_string()));
        Ok(())
    }

    async fn login(&self, _presence: Presence) -> TransportResult<Arc<dyn GatewaySession>> {
        Ok(Arc::new(NoopSession))
    }
}

struct NoopSession;

#[async_trait]
impl GatewaySession for NoopSession {
    async fn on_disconnect(&self) {}
}

pub(crate) fn context_with(client: Arc<NoopClient>, channel: Option<Snowflake>) -> AppContext {
    AppContext::new(Arc::new(ConfigStore::new()), client, channel)
}

// ─── Services ─────────────────────────────────────────────────────────────────

pub(crate) struct Stub {
    pub(crate) id: ServiceTypeId,
    requires: Vec<ServiceTypeId>,
}

impl ServiceMeta for Stub {
    const ID: &'static str = "test.stub";
}

impl Service for Stub {
    fn required_services(&self) -> Vec<ServiceTypeId> {
        self.requires.clone()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Clone, Copy, Default)]
enum Behaviour {
    #[default]
    Succeed,
    Fail,
    Panic,
}

pub(crate) struct StubFactory {
    id: &'static str,
    requires: &'static [&'static str],
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    behaviour: Behaviour,
}

impl StubFactory {
    pub(crate) fn new(id: &'static str, requires: &'static [&'static str]) -> Self {
        Self {
            id,
            requires,
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
            behaviour: Behaviour::Succeed,
        }
    }
}

#[async_trait]
impl ServiceFactory for StubFactory {
    fn service_type(&self) -> ServiceTypeId {
        ServiceTypeId::from(self.id)
    }

    async fn create(&self, _ctx: &AppContext) -> Result<ServiceArc, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behaviour {
            Behaviour::Succeed => Ok(Arc::new(Stub {
                id: self.service_type(),
                requires: self.requires.iter().copied().map(ServiceTypeId::from).collect(),
            })),
            Behaviour::Fail => Err(format!("{} refused to start", self.id).into()),
            Behaviour::Panic => panic!("{} exploded", self.id),
        }
    }
}

// ─── StubSet ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct StubEntry {
    requires: &'static [&'static str],
    delay: Option<Duration>,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

/// Builds a `services` section and catalog of stub factories.
///
/// Every service `id` gets a factory named `stub:<id>`.
#[derive(Default)]
pub(crate) struct StubSet {
    entries: HashMap<&'static str, StubEntry>,
    declarations: Vec<(String, String)>,
}

impl StubSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn service(mut self, id: &'static str, requires: &'static [&'static str]) -> Self {
        self.entries.insert(
            id,
            StubEntry {
                requires,
                delay: None,
                behaviour: Behaviour::Succeed,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );
        self.declarations.push((id.to_string(), format!("stub:{id}")));
        self
    }

    /// Adds a raw `services` entry.
    pub(crate) fn declare(mut self, id: &str, factory: &str) -> Self {
        self.declarations.push((id.to_string(), factory.to_string()));
        self
    }

    pub(crate) fn delayed(mut self, id: &str, delay: Duration) -> Self {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.delay = Some(delay);
        }
        self
    }

    pub(crate) fn failing(mut self, id: &str) -> Self {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.behaviour = Behaviour::Fail;
        }
        self
    }

    pub(crate) fn panicking(mut self, id: &str) -> Self {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.behaviour = Behaviour::Panic;
        }
        self
    }

    /// How many times the factory of `id` ran `create`.
    pub(crate) fn calls(&self, id: &str) -> usize {
        self.entries
            .get(id)
            .map_or(0, |entry| entry.calls.load(Ordering::SeqCst))
    }

    pub(crate) fn catalog(&self) -> FactoryCatalog {
        let mut catalog = FactoryCatalog::new();
        for (&id, entry) in &self.entries {
            let entry = entry.clone();
            catalog.register(format!("stub:{id}"), move || {
                Ok(Box::new(StubFactory {
                    id,
                    requires: entry.requires,
                    calls: entry.calls.clone(),
                    delay: entry.delay,
                    behaviour: entry.behaviour,
                }))
            });
        }
        catalog
    }

    pub(crate) fn section(&self) -> ConfigSection {
        ConfigSection::from_entries("services", self.declarations.iter().cloned())
    }

    pub(crate) fn registry(&self) -> Arc<FactoryRegistry> {
        Arc::new(FactoryRegistry::from_section(&self.section(), self.catalog()))
    }
}
