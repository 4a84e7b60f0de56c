//! Scan orchestration: resolve targets, fetch each once, persist the outcome.
//!
//! [`ScanService`] is generic over a [`Probe`] so the Tomcat and Actuator
//! paths share one implementation. Within an environment scan every target is
//! fetched on its own task (bounded by a semaphore); timestamps are taken in
//! invocation order before the fetch starts and rows are written in the same
//! order as the handles are awaited. A failing or panicking fetch only
//! affects its own row.

pub mod scheduler;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::inventory::{ActuatorTarget, InventoryStore, TomcatTarget};
use crate::probe::actuator::{ActuatorClient, ActuatorSnapshot};
use crate::probe::tomcat::{TomcatManagerClient, TomcatSnapshot};
use crate::probe::FetchError;
use crate::store::{ScanState, ScanStateStore};

pub use scheduler::{ScanScheduler, SweepOutcome};

// ── Seams ────────────────────────────────────────────────────────────────────

/// A scannable inventory entry.
pub trait ScanTarget: Clone + Send + Sync + 'static {
    /// Label used in logs and not-found errors.
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    fn lookup(inventory: &dyn InventoryStore, id: Uuid) -> Result<Option<Self>, AppError>;

    fn for_servers(inventory: &dyn InventoryStore, server_ids: &[Uuid]) -> Result<Vec<Self>, AppError>;
}

impl ScanTarget for TomcatTarget {
    const KIND: &'static str = "tomcat target";

    fn id(&self) -> Uuid {
        self.id
    }

    fn lookup(inventory: &dyn InventoryStore, id: Uuid) -> Result<Option<Self>, AppError> {
        inventory.tomcat_target(id)
    }

    fn for_servers(inventory: &dyn InventoryStore, server_ids: &[Uuid]) -> Result<Vec<Self>, AppError> {
        inventory.tomcat_targets_for_servers(server_ids)
    }
}

impl ScanTarget for ActuatorTarget {
    const KIND: &'static str = "actuator target";

    fn id(&self) -> Uuid {
        self.id
    }

    fn lookup(inventory: &dyn InventoryStore, id: Uuid) -> Result<Option<Self>, AppError> {
        inventory.actuator_target(id)
    }

    fn for_servers(inventory: &dyn InventoryStore, server_ids: &[Uuid]) -> Result<Vec<Self>, AppError> {
        inventory.actuator_targets_for_servers(server_ids)
    }
}

/// A protocol client that turns one target into a payload or a classified
/// failure. Implementations must not panic on bad responses.
pub trait Probe: Send + Sync + 'static {
    type Target: ScanTarget;
    type Payload: Clone + Send + Sync + 'static;

    fn fetch_target(
        &self,
        target: &Self::Target,
    ) -> impl Future<Output = Result<Self::Payload, FetchError>> + Send;
}

impl Probe for TomcatManagerClient {
    type Target = TomcatTarget;
    type Payload = TomcatSnapshot;

    fn fetch_target(
        &self,
        target: &TomcatTarget,
    ) -> impl Future<Output = Result<TomcatSnapshot, FetchError>> + Send {
        self.fetch(target)
    }
}

impl Probe for ActuatorClient {
    type Target = ActuatorTarget;
    type Payload = ActuatorSnapshot;

    fn fetch_target(
        &self,
        target: &ActuatorTarget,
    ) -> impl Future<Output = Result<ActuatorSnapshot, FetchError>> + Send {
        self.fetch(target)
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// A scanned target together with the row that was just written for it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport<T, P> {
    #[serde(skip)]
    pub target: T,
    pub state: ScanState<P>,
}

type Report<P> = ScanReport<<P as Probe>::Target, <P as Probe>::Payload>;

pub struct ScanService<P: Probe> {
    inventory: Arc<dyn InventoryStore>,
    store: Arc<dyn ScanStateStore<P::Payload>>,
    probe: Arc<P>,
    limit: Arc<Semaphore>,
}

impl<P: Probe> ScanService<P> {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        store: Arc<dyn ScanStateStore<P::Payload>>,
        probe: P,
        max_concurrency: usize,
    ) -> Self {
        Self {
            inventory,
            store,
            probe: Arc::new(probe),
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Scan one target by id. Unknown ids are [`AppError::NotFound`].
    pub async fn scan_target(&self, target_id: Uuid) -> Result<Report<P>, AppError> {
        let target = <P::Target as ScanTarget>::lookup(&*self.inventory, target_id)?
            .ok_or_else(|| AppError::NotFound(format!("{} {target_id}", P::Target::KIND)))?;

        let scanned_at = Utc::now();
        let result = join_fetch(self.spawn_fetch(target.clone())).await;
        self.persist(target, scanned_at, result)
    }

    /// Scan every target hosted on the environment's servers.
    ///
    /// An environment with no targets (or no such environment) yields an
    /// empty list and writes nothing.
    pub async fn scan_environment(&self, environment_id: Uuid) -> Result<Vec<Report<P>>, AppError> {
        let server_ids: Vec<Uuid> = self
            .inventory
            .servers_in_environment(environment_id)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        if server_ids.is_empty() {
            return Ok(Vec::new());
        }
        let targets = <P::Target as ScanTarget>::for_servers(&*self.inventory, &server_ids)?;
        if targets.is_empty() {
            debug!(env_id = %environment_id, kind = P::Target::KIND, "no targets to scan");
            return Ok(Vec::new());
        }

        let pending: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let scanned_at = Utc::now();
                let handle = self.spawn_fetch(target.clone());
                (target, scanned_at, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(pending.len());
        let mut write_error: Option<AppError> = None;
        for (target, scanned_at, handle) in pending {
            let id = target.id();
            let result = join_fetch(handle).await;
            match self.persist(target, scanned_at, result) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(env_id = %environment_id, kind = P::Target::KIND, target_id = %id, error = %e, "failed to store scan state");
                    if write_error.is_none() {
                        write_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = write_error {
            return Err(e);
        }

        let failed = reports.iter().filter(|r| r.state.payload().is_none()).count();
        debug!(
            env_id = %environment_id,
            kind = P::Target::KIND,
            scanned = reports.len(),
            failed,
            "environment scan complete"
        );
        Ok(reports)
    }

    fn spawn_fetch(&self, target: P::Target) -> JoinHandle<Result<P::Payload, FetchError>> {
        let probe = Arc::clone(&self.probe);
        let limit = Arc::clone(&self.limit);
        tokio::spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return Err(FetchError::interrupted());
            };
            probe.fetch_target(&target).await
        })
    }

    fn persist(
        &self,
        target: P::Target,
        scanned_at: chrono::DateTime<Utc>,
        result: Result<P::Payload, FetchError>,
    ) -> Result<Report<P>, AppError> {
        let id = target.id();
        let state = match result {
            Ok(payload) => {
                debug!(kind = P::Target::KIND, target_id = %id, "scan succeeded");
                ScanState::success(id, scanned_at, payload)
            }
            Err(e) => {
                info!(kind = P::Target::KIND, target_id = %id, error_kind = %e.kind, error = %e.message, "scan failed");
                ScanState::error(id, scanned_at, Some(e.kind), Some(&e.message))
            }
        };
        self.store.upsert(state.clone())?;
        Ok(ScanReport { target, state })
    }
}

/// Await a fetch task; a panic or cancellation becomes `UNKNOWN: Interrupted`.
async fn join_fetch<T>(handle: JoinHandle<Result<T, FetchError>>) -> Result<T, FetchError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "fetch task did not complete");
            Err(FetchError::interrupted())
        }
    }
}

// ── Manual scans ─────────────────────────────────────────────────────────────

/// Result of a manual environment scan, one list per protocol.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentScan<TP, AP> {
    pub tomcat: Vec<ScanReport<TomcatTarget, TP>>,
    pub actuator: Vec<ScanReport<ActuatorTarget, AP>>,
}

/// On-demand scans. Bypasses the scheduler guard; refused entirely when
/// `scans.manual_enabled` is off.
pub struct ManualScanner<T = TomcatManagerClient, A = ActuatorClient>
where
    T: Probe<Target = TomcatTarget>,
    A: Probe<Target = ActuatorTarget>,
{
    tomcat: Arc<ScanService<T>>,
    actuator: Arc<ScanService<A>>,
    enabled: bool,
}

impl<T, A> ManualScanner<T, A>
where
    T: Probe<Target = TomcatTarget>,
    A: Probe<Target = ActuatorTarget>,
{
    pub fn new(tomcat: Arc<ScanService<T>>, actuator: Arc<ScanService<A>>, enabled: bool) -> Self {
        Self { tomcat, actuator, enabled }
    }

    fn ensure_enabled(&self) -> Result<(), AppError> {
        if self.enabled { Ok(()) } else { Err(AppError::ManualScansDisabled) }
    }

    pub async fn scan_environment(
        &self,
        environment_id: Uuid,
    ) -> Result<EnvironmentScan<T::Payload, A::Payload>, AppError> {
        self.ensure_enabled()?;
        let tomcat = self.tomcat.scan_environment(environment_id).await?;
        let actuator = self.actuator.scan_environment(environment_id).await?;
        Ok(EnvironmentScan { tomcat, actuator })
    }

    pub async fn scan_tomcat_target(&self, target_id: Uuid) -> Result<Report<T>, AppError> {
        self.ensure_enabled()?;
        self.tomcat.scan_target(target_id).await
    }

    pub async fn scan_actuator_target(&self, target_id: Uuid) -> Result<Report<A>, AppError> {
        self.ensure_enabled()?;
        self.actuator.scan_target(target_id).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted probes and a small inventory shared by the scan tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::inventory::{Environment, Inventory, Server};
    use crate::model::{Role, ScanErrorKind};

    #[derive(Clone)]
    pub enum Script {
        Ok(&'static str),
        Fail(ScanErrorKind, &'static str),
        Panic,
        /// Succeeds after the gate hands out a permit.
        Gated,
    }

    /// Probe whose behaviour per target id is fixed up front. Unscripted
    /// targets succeed with `"ok"`.
    #[derive(Default)]
    pub struct ScriptedProbe {
        pub script: HashMap<Uuid, Script>,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub gate: Option<Arc<Semaphore>>,
        pub delay: Option<Duration>,
    }

    impl ScriptedProbe {
        pub fn with(script: impl IntoIterator<Item = (Uuid, Script)>) -> Self {
            Self { script: script.into_iter().collect(), ..Self::default() }
        }

        async fn run(&self, id: Uuid) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let out = match self.script.get(&id).cloned().unwrap_or(Script::Ok("ok")) {
                Script::Ok(s) => Ok(s.to_string()),
                Script::Fail(kind, msg) => Err(FetchError::new(kind, msg)),
                Script::Panic => panic!("probe exploded"),
                Script::Gated => {
                    if let Some(gate) = &self.gate {
                        let _permit = gate.acquire().await;
                    }
                    Ok("gated".to_string())
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            out
        }
    }

    /// Tomcat-flavoured scripted probe.
    #[derive(Default)]
    pub struct TomcatProbe(pub ScriptedProbe);

    impl Probe for TomcatProbe {
        type Target = TomcatTarget;
        type Payload = String;

        async fn fetch_target(&self, target: &TomcatTarget) -> Result<String, FetchError> {
            self.0.run(target.id).await
        }
    }

    /// Actuator-flavoured scripted probe.
    #[derive(Default)]
    pub struct ActuatorProbe(pub ScriptedProbe);

    impl Probe for ActuatorProbe {
        type Target = ActuatorTarget;
        type Payload = String;

        async fn fetch_target(&self, target: &ActuatorTarget) -> Result<String, FetchError> {
            self.0.run(target.id).await
        }
    }

    pub fn tomcat(server_id: Uuid) -> TomcatTarget {
        TomcatTarget {
            id: Uuid::new_v4(),
            server_id,
            role: Role::Payments,
            base_url: "http://tomcat.test".into(),
            port: 8080,
            username: "u".into(),
            password: "p".into(),
            connect_timeout_ms: 100,
            request_timeout_ms: 100,
        }
    }

    pub fn actuator(server_id: Uuid, profile: &str) -> ActuatorTarget {
        ActuatorTarget {
            id: Uuid::new_v4(),
            server_id,
            role: Role::Services,
            base_url: "http://svc.test".into(),
            port: 8080,
            profile: profile.into(),
            connect_timeout_ms: 100,
            request_timeout_ms: 100,
        }
    }

    /// Two environments: `dev` with two servers (three Tomcat targets, one
    /// actuator target) and an empty `staging`.
    pub struct Fleet {
        pub dev: Uuid,
        pub staging: Uuid,
        pub tomcats: Vec<TomcatTarget>,
        pub actuators: Vec<ActuatorTarget>,
        pub inventory: Arc<Inventory>,
    }

    pub fn fleet() -> Fleet {
        let dev = Environment { id: Uuid::new_v4(), name: "dev".into() };
        let staging = Environment { id: Uuid::new_v4(), name: "staging".into() };
        let s1 = Server { id: Uuid::new_v4(), environment_id: dev.id, name: "tp-01".into() };
        let s2 = Server { id: Uuid::new_v4(), environment_id: dev.id, name: "pay-01".into() };
        let tomcats = vec![tomcat(s1.id), tomcat(s1.id), tomcat(s2.id)];
        let actuators = vec![actuator(s2.id, "orders")];
        let inventory = Arc::new(Inventory::new(
            vec![dev.clone(), staging.clone()],
            vec![s1, s2],
            tomcats.clone(),
            actuators.clone(),
        ));
        Fleet { dev: dev.id, staging: staging.id, tomcats, actuators, inventory }
    }
}
