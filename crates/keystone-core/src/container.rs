//! The service container and its resolution engine.
//!
//! [`ServiceContainer::resolve`] turns a set of required service ids into a
//! fully constructed, deduplicated service map. Requirements are discovered
//! while resolution is in flight: every constructed service reports the
//! services it needs, and those are admitted into the same run.
//!
//! # Algorithm
//!
//! ```text
//!            ┌──────────── frontier (mpsc) ◄──────────────┐
//!            ▼                                             │ Admit(id)
//!   driver: spawn one construction task per admitted id    │
//!            │                                             │
//!            ▼                                             │
//!   task:  factory_for(id) ─► create(ctx) ─► record ─► admit unseen requirements
//!                                                          │ outstanding += admitted
//!                                                          ▼
//!                                              outstanding -= 1 ─► Done? ─► Settled
//! ```
//!
//! - `visited` is a locked set; check-and-insert happens under one lock, so an
//!   id is admitted at most once per run.
//! - `outstanding` counts admitted ids that are queued or being constructed.
//!   A task adds its newly admitted requirements *before* it completes itself,
//!   so the counter reaches zero exactly once, when nothing is left to do.
//! - The first error aborts every in-flight task. Instances recorded before
//!   the failure stay in the container; nothing is rolled back. A later run
//!   re-admits their requirements that were never constructed.
//!
//! Construction is declarative-first: a service only *declares* what it
//! needs and must not dereference those services while it is being built.
//! Mutual requirements therefore neither deadlock nor construct twice. Once
//! the run has settled, the declared edges are layered with Kahn's algorithm
//! to detect cycles.

use std::any::Any;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::context::AppContext;
use crate::error::{BootstrapError, BootstrapResult};
use crate::factory::FactoryRegistry;
use crate::service::{ServiceArc, ServiceMeta, ServiceTypeId};

// =============================================================================
// Options and report
// =============================================================================

/// Tuning knobs for one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Upper bound for a single `ServiceFactory::create` call.
    ///
    /// `None` waits forever: a hung factory stalls the whole run.
    pub construct_timeout: Option<Duration>,

    /// Fail with [`BootstrapError::CyclicDependency`] instead of logging a
    /// warning when declared requirements form a cycle.
    pub reject_cycles: bool,
}

/// Outcome of a successful resolution run.
#[derive(Debug, Clone)]
pub struct ResolutionReport {
    /// Services constructed by this run, in completion order.
    pub constructed: Vec<ServiceTypeId>,
    /// Dependency layers of the whole container, or `None` if a cycle
    /// prevented ordering.
    pub layers: Option<Vec<Vec<ServiceTypeId>>>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

// =============================================================================
// Outstanding-work counter
// =============================================================================

/// Result of completing one unit of outstanding work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Work remains; carries the remaining count.
    Pending(usize),
    /// The last unit completed.
    Done,
}

#[derive(Debug, Default)]
struct Outstanding(AtomicUsize);

impl Outstanding {
    fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::AcqRel);
    }

    fn complete_one(&self) -> Progress {
        match self.0.fetch_sub(1, Ordering::AcqRel) {
            1 => Progress::Done,
            previous => Progress::Pending(previous - 1),
        }
    }
}

// =============================================================================
// Per-run state
// =============================================================================

enum Signal {
    Admit(ServiceTypeId),
    Settled,
}

struct Resolution {
    container: ServiceContainer,
    factories: Arc<FactoryRegistry>,
    ctx: AppContext,
    options: ResolveOptions,
    visited: Mutex<HashSet<ServiceTypeId>>,
    outstanding: Outstanding,
    frontier: mpsc::UnboundedSender<Signal>,
    failed: AtomicBool,
    constructed: Mutex<Vec<ServiceTypeId>>,
}

impl Resolution {
    /// Admits every unseen id and queues it. Returns how many were admitted.
    ///
    /// The counter is raised before anything is queued.
    fn admit(&self, ids: impl IntoIterator<Item = ServiceTypeId>) -> usize {
        let admitted: Vec<ServiceTypeId> = {
            let mut visited = self.visited.lock();
            ids.into_iter()
                .filter(|id| visited.insert(id.clone()))
                .collect()
        };
        if admitted.is_empty() {
            return 0;
        }
        self.outstanding.add(admitted.len());
        let count = admitted.len();
        for id in admitted {
            debug!(service = %id, "Service admitted");
            // The receiver outlives every task; a send error only happens
            // after the driver gave up on a failed run.
            let _ = self.frontier.send(Signal::Admit(id));
        }
        count
    }

    async fn construct(self: Arc<Self>, id: ServiceTypeId) -> BootstrapResult<()> {
        let factory = self.factories.factory_for(&id)?;

        let creating = factory.create(&self.ctx);
        let created = match self.options.construct_timeout {
            Some(limit) => tokio::time::timeout(limit, creating)
                .await
                .map_err(|elapsed| BootstrapError::ServiceConstructionFailure {
                    service: id.clone(),
                    source: Box::new(elapsed),
                })?,
            None => creating.await,
        };
        let instance = created.map_err(|source| BootstrapError::ServiceConstructionFailure {
            service: id.clone(),
            source,
        })?;

        if self.failed.load(Ordering::Acquire) {
            return Ok(());
        }

        let requirements = instance.required_services();
        self.container.record(id.clone(), instance, requirements.clone());
        self.constructed.lock().push(id.clone());
        debug!(service = %id, requires = requirements.len(), "Service constructed");

        self.admit(requirements);

        if let Progress::Done = self.outstanding.complete_one() {
            let _ = self.frontier.send(Signal::Settled);
        }
        Ok(())
    }
}

// =============================================================================
// ServiceContainer
// =============================================================================

#[derive(Default)]
struct ContainerInner {
    instances: RwLock<HashMap<ServiceTypeId, ServiceArc>>,
    requirements: RwLock<HashMap<ServiceTypeId, Vec<ServiceTypeId>>>,
}

/// Constructed service instances keyed by id.
///
/// Cloning is cheap and yields a handle to the same container. Instances are
/// written at most once per id and never removed.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs `initial` and everything it transitively requires.
    ///
    /// Services already present in the container are not constructed again,
    /// so resolving the same set twice is a no-op. Runs on the same container
    /// must not overlap.
    ///
    /// # Errors
    ///
    /// The first error reported by any construction task. See
    /// [`FactoryRegistry::factory_for`] and
    /// [`BootstrapError::ServiceConstructionFailure`]. With
    /// [`ResolveOptions::reject_cycles`] a cycle yields
    /// [`BootstrapError::CyclicDependency`].
    pub async fn resolve<I>(
        &self,
        initial: I,
        factories: Arc<FactoryRegistry>,
        ctx: AppContext,
        options: ResolveOptions,
    ) -> BootstrapResult<ResolutionReport>
    where
        I: IntoIterator<Item = ServiceTypeId>,
    {
        let started = Instant::now();
        let (frontier, mut signals) = mpsc::unbounded_channel();

        let run = Arc::new(Resolution {
            container: self.clone(),
            factories,
            ctx,
            options,
            visited: Mutex::new(self.inner.instances.read().keys().cloned().collect()),
            outstanding: Outstanding::default(),
            frontier,
            failed: AtomicBool::new(false),
            constructed: Mutex::new(Vec::new()),
        });

        let leftover = self.unmet_requirements();
        if !leftover.is_empty() {
            debug!(count = leftover.len(), "Re-admitting requirements of an aborted run");
        }
        let seeded = run.admit(initial.into_iter().chain(leftover));
        info!(seeded, "Resolving services");

        if seeded > 0 {
            let mut tasks = JoinSet::new();
            let mut running: HashMap<tokio::task::Id, ServiceTypeId> = HashMap::new();

            let outcome = loop {
                tokio::select! {
                    Some(signal) = signals.recv() => match signal {
                        Signal::Admit(id) => {
                            let span = info_span!("construct", service = %id);
                            let handle = tasks.spawn(run.clone().construct(id.clone()).instrument(span));
                            running.insert(handle.id(), id);
                        }
                        Signal::Settled => break Ok(()),
                    },
                    Some(joined) = tasks.join_next_with_id() => match joined {
                        Ok((task, Ok(()))) => {
                            running.remove(&task);
                        }
                        Ok((task, Err(e))) => {
                            running.remove(&task);
                            break Err(e);
                        }
                        Err(e) => {
                            let service = running
                                .remove(&e.id())
                                .unwrap_or_else(|| ServiceTypeId::from("<unknown>"));
                            let reason = if e.is_panic() {
                                panic_message(e.into_panic())
                            } else {
                                "construction task was cancelled".to_string()
                            };
                            break Err(BootstrapError::ServiceConstructionFailure {
                                service,
                                source: reason.into(),
                            });
                        }
                    },
                }
            };

            if let Err(e) = outcome {
                run.failed.store(true, Ordering::Release);
                tasks.abort_all();
                warn!(error = %e, in_flight = running.len(), "Resolution aborted");
                return Err(e);
            }

            // Settled: the remaining tasks have finished their work and are
            // only returning.
            while tasks.join_next().await.is_some() {}
        }

        let layers = match self.dependency_layers() {
            Ok(layers) => Some(layers),
            Err(e) if run.options.reject_cycles => return Err(e),
            Err(e) => {
                warn!(error = %e, "Services declare cyclic requirements");
                None
            }
        };

        let constructed = std::mem::take(&mut *run.constructed.lock());
        let elapsed = started.elapsed();
        info!(
            constructed = constructed.len(),
            total = self.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Services resolved"
        );

        Ok(ResolutionReport {
            constructed,
            layers,
            elapsed,
        })
    }

    fn record(&self, id: ServiceTypeId, instance: ServiceArc, requires: Vec<ServiceTypeId>) {
        self.inner
            .instances
            .write()
            .entry(id.clone())
            .or_insert(instance);
        self.inner.requirements.write().entry(id).or_insert(requires);
    }

    /// Declared requirements of recorded services that are not constructed.
    ///
    /// Only non-empty after an aborted run.
    fn unmet_requirements(&self) -> Vec<ServiceTypeId> {
        let instances = self.inner.instances.read();
        let requirements = self.inner.requirements.read();
        let mut unmet: Vec<ServiceTypeId> = requirements
            .values()
            .flatten()
            .filter(|id| !instances.contains_key(*id))
            .cloned()
            .collect();
        unmet.sort();
        unmet.dedup();
        unmet
    }

    /// Looks up a constructed service.
    pub fn get<Q>(&self, id: &Q) -> Option<ServiceArc>
    where
        ServiceTypeId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.instances.read().get(id).cloned()
    }

    /// Looks up a constructed service by its static id and downcasts it.
    pub fn get_typed<T>(&self) -> Option<Arc<T>>
    where
        T: ServiceMeta + Send + Sync + 'static,
    {
        let service = self.get(T::ID)?;
        let any: Arc<dyn Any + Send + Sync> = service.as_any();
        any.downcast::<T>().ok()
    }

    /// Whether `id` has been constructed.
    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        ServiceTypeId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.instances.read().contains_key(id)
    }

    /// Number of constructed services.
    pub fn len(&self) -> usize {
        self.inner.instances.read().len()
    }

    /// Whether nothing has been constructed.
    pub fn is_empty(&self) -> bool {
        self.inner.instances.read().is_empty()
    }

    /// Ids of all constructed services, sorted.
    pub fn ids(&self) -> Vec<ServiceTypeId> {
        let mut ids: Vec<_> = self.inner.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Groups constructed services into layers: every service only requires
    /// services of earlier layers.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::CyclicDependency`] listing the services that cannot
    /// be ordered.
    pub fn dependency_layers(&self) -> BootstrapResult<Vec<Vec<ServiceTypeId>>> {
        let requirements = self.inner.requirements.read();
        topological_layers(&requirements).map_err(|members| BootstrapError::CyclicDependency {
            members,
        })
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.ids())
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Kahn's algorithm over `service → requirements`, one layer per frontier.
///
/// Requirements that are not keys of the map and self-requirements are
/// ignored. Returns the unordered services on a cycle.
fn topological_layers(
    requirements: &HashMap<ServiceTypeId, Vec<ServiceTypeId>>,
) -> Result<Vec<Vec<ServiceTypeId>>, Vec<ServiceTypeId>> {
    let mut in_degree: HashMap<&ServiceTypeId, usize> =
        requirements.keys().map(|id| (id, 0)).collect();
    let mut dependents: HashMap<&ServiceTypeId, Vec<&ServiceTypeId>> = HashMap::new();

    for (id, requires) in requirements {
        let unique: HashSet<&ServiceTypeId> = requires.iter().collect();
        for dep in unique {
            if dep == id || !requirements.contains_key(dep) {
                continue;
            }
            dependents.entry(dep).or_default().push(id);
            if let Some(degree) = in_degree.get_mut(id) {
                *degree += 1;
            }
        }
    }

    let mut layers: Vec<Vec<ServiceTypeId>> = Vec::new();
    let mut current: Vec<&ServiceTypeId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next = Vec::new();
        for id in &current {
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dependent);
                    }
                }
            }
        }
        let mut layer: Vec<ServiceTypeId> = current.into_iter().cloned().collect();
        layer.sort();
        layers.push(layer);
        current = next;
    }

    if processed != requirements.len() {
        let mut members: Vec<ServiceTypeId> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.clone())
            .collect();
        members.sort();
        return Err(members);
    }
    Ok(layers)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => format!("factory panicked: {message}"),
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => format!("factory panicked: {message}"),
            Err(_) => "factory panicked".to_string(),
        },
    }
}
