//! Periodic sweep driver.
//!
//! One sweep walks every environment and runs the Tomcat scan then the
//! Actuator scan for it. A single atomic flag keeps sweeps from overlapping:
//! a tick that finds a sweep in progress is dropped, not queued. The flag is
//! cleared by a drop guard, so an error or a panic inside a sweep cannot
//! leave it set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::inventory::{ActuatorTarget, InventoryStore, TomcatTarget};
use crate::probe::actuator::ActuatorClient;
use crate::probe::tomcat::TomcatManagerClient;
use super::{Probe, ScanService};

/// What a call to [`ScanScheduler::run_once`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Scheduling is switched off in config.
    Disabled,
    /// Another sweep held the flag.
    Skipped,
    Completed {
        environments: usize,
        /// Protocol scans (or the environment listing) that returned an error.
        failures: usize,
    },
}

pub struct ScanScheduler<T = TomcatManagerClient, A = ActuatorClient>
where
    T: Probe<Target = TomcatTarget>,
    A: Probe<Target = ActuatorTarget>,
{
    inventory: Arc<dyn InventoryStore>,
    tomcat: Arc<ScanService<T>>,
    actuator: Arc<ScanService<A>>,
    config: SchedulerConfig,
    running: AtomicBool,
}

/// Clears the running flag when dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T, A> ScanScheduler<T, A>
where
    T: Probe<Target = TomcatTarget>,
    A: Probe<Target = ActuatorTarget>,
{
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        tomcat: Arc<ScanService<T>>,
        actuator: Arc<ScanService<A>>,
        config: SchedulerConfig,
    ) -> Self {
        Self { inventory, tomcat, actuator, config, running: AtomicBool::new(false) }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    /// One tick: sweep all environments unless disabled or already running.
    pub async fn run_once(&self) -> SweepOutcome {
        if !self.config.enabled {
            return SweepOutcome::Disabled;
        }
        let Some(_guard) = self.try_acquire() else {
            debug!("sweep already in progress; skipping tick");
            return SweepOutcome::Skipped;
        };

        let environments = match self.inventory.environments() {
            Ok(envs) => envs,
            Err(e) => {
                warn!(error = %e, "cannot list environments");
                return SweepOutcome::Completed { environments: 0, failures: 1 };
            }
        };

        let mut failures = 0;
        for env in &environments {
            if let Err(e) = self.tomcat.scan_environment(env.id).await {
                warn!(env_id = %env.id, env = %env.name, error = %e, "tomcat environment scan failed");
                failures += 1;
            }
            if let Err(e) = self.actuator.scan_environment(env.id).await {
                warn!(env_id = %env.id, env = %env.name, error = %e, "actuator environment scan failed");
                failures += 1;
            }
        }

        debug!(environments = environments.len(), failures, "sweep complete");
        SweepOutcome::Completed { environments: environments.len(), failures }
    }

    /// Tick after `initial_delay`, then `fixed_delay` after each sweep ends,
    /// until `shutdown` fires. A sweep in progress is abandoned on shutdown.
    pub async fn run(&self, shutdown: CancellationToken) {
        if !self.config.enabled {
            info!("scan scheduler disabled");
            shutdown.cancelled().await;
            return;
        }

        info!(
            initial_delay_ms = self.config.initial_delay.as_millis() as u64,
            fixed_delay_ms = self.config.fixed_delay.as_millis() as u64,
            "scan scheduler running"
        );

        let mut delay = self.config.initial_delay;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.run_once() => {
                    if let SweepOutcome::Completed { environments, failures } = outcome {
                        info!(environments, failures, "sweep finished");
                    }
                }
            }

            delay = self.config.fixed_delay;
        }

        info!("scan scheduler shutting down");
    }
}
