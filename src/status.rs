//! Environment status: inventory + latest scan states → decision verdict.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::decision::{evaluate, ActuatorObservation, Issue, TomcatObservation};
use crate::error::AppError;
use crate::inventory::InventoryStore;
use crate::model::Severity;
use crate::probe::actuator::ActuatorSnapshot;
use crate::probe::tomcat::TomcatSnapshot;
use crate::store::ScanStateStore;

/// At most this many issues are returned; the counts still cover all of them.
pub const MAX_ISSUES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentStatus {
    pub environment_id: Uuid,
    pub environment_name: String,
    pub verdict: Severity,
    pub evaluated_at: DateTime<Utc>,
    pub block_issues: usize,
    pub warn_issues: usize,
    pub unknown_issues: usize,
    pub issues: Vec<Issue>,
}

pub struct EnvironmentStatusQuery {
    inventory: Arc<dyn InventoryStore>,
    tomcat_states: Arc<dyn ScanStateStore<TomcatSnapshot>>,
    actuator_states: Arc<dyn ScanStateStore<ActuatorSnapshot>>,
}

impl EnvironmentStatusQuery {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        tomcat_states: Arc<dyn ScanStateStore<TomcatSnapshot>>,
        actuator_states: Arc<dyn ScanStateStore<ActuatorSnapshot>>,
    ) -> Self {
        Self { inventory, tomcat_states, actuator_states }
    }

    pub fn status(&self, environment_id: Uuid) -> Result<EnvironmentStatus, AppError> {
        let env = self
            .inventory
            .environment(environment_id)?
            .ok_or_else(|| AppError::NotFound(format!("environment {environment_id}")))?;

        let server_names: HashMap<Uuid, String> = self
            .inventory
            .servers_in_environment(env.id)?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        let server_ids: Vec<Uuid> = server_names.keys().copied().collect();
        let server_name = |server_id: Uuid| {
            server_names
                .get(&server_id)
                .cloned()
                .ok_or_else(|| AppError::Inventory(format!("server {server_id} not found")))
        };

        let (tomcats, actuators) = if server_ids.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                self.inventory.tomcat_targets_for_servers(&server_ids)?,
                self.inventory.actuator_targets_for_servers(&server_ids)?,
            )
        };

        let ids: Vec<Uuid> = tomcats.iter().map(|t| t.id).collect();
        let tomcat_states = self.tomcat_states.get_many(&ids)?;
        let tomcat_obs = tomcats
            .iter()
            .map(|t| {
                Ok(TomcatObservation::new(
                    t.id,
                    Some(server_name(t.server_id)?),
                    t.role,
                    tomcat_states.get(&t.id),
                ))
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let ids: Vec<Uuid> = actuators.iter().map(|a| a.id).collect();
        let actuator_states = self.actuator_states.get_many(&ids)?;
        let actuator_obs = actuators
            .iter()
            .map(|a| {
                Ok(ActuatorObservation::new(
                    a.id,
                    Some(server_name(a.server_id)?),
                    a.role,
                    a.profile.clone(),
                    actuator_states.get(&a.id),
                ))
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let mut evaluation = evaluate(&tomcat_obs, &actuator_obs);
        evaluation.issues.truncate(MAX_ISSUES);

        Ok(EnvironmentStatus {
            environment_id: env.id,
            environment_name: env.name,
            verdict: evaluation.verdict,
            evaluated_at: Utc::now(),
            block_issues: evaluation.block_issues,
            warn_issues: evaluation.warn_issues,
            unknown_issues: evaluation.unknown_issues,
            issues: evaluation.issues,
        })
    }
}
