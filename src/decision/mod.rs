//! Decision engine: observations in, verdict and issues out.
//!
//! [`evaluate`] is a pure function. It never fails on missing fields: a
//! target that was never scanned becomes an `UNKNOWN` issue, a failed scan a
//! `BLOCK` issue, and a successful actuator scan is checked against health,
//! CPU and memory thresholds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{IssueKind, Role, ScanErrorKind, ScanOutcomeKind, Severity};
use crate::probe::actuator::ActuatorSnapshot;
use crate::store::ScanState;

pub const CPU_WARN: f64 = 0.75;
pub const CPU_BLOCK: f64 = 0.90;
/// 900 MiB.
pub const MEMORY_WARN_BYTES: u64 = 900 * 1024 * 1024;
/// 1500 MiB.
pub const MEMORY_BLOCK_BYTES: u64 = 1500 * 1024 * 1024;

const NOT_SCANNED: &str = "Not scanned";

// ── Inputs ───────────────────────────────────────────────────────────────────

/// A Tomcat target joined with its latest scan state. `scanned_at` or
/// `outcome` being `None` means the target was never scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct TomcatObservation {
    pub target_id: Uuid,
    pub server_name: Option<String>,
    pub role: Role,
    pub scanned_at: Option<DateTime<Utc>>,
    pub outcome: Option<ScanOutcomeKind>,
    pub error_kind: Option<ScanErrorKind>,
    pub error_message: Option<String>,
}

impl TomcatObservation {
    pub fn new<P>(
        target_id: Uuid,
        server_name: Option<String>,
        role: Role,
        state: Option<&ScanState<P>>,
    ) -> Self {
        Self {
            target_id,
            server_name,
            role,
            scanned_at: state.map(|s| s.scanned_at),
            outcome: state.map(ScanState::outcome_kind),
            error_kind: state.and_then(ScanState::error_kind),
            error_message: state.and_then(|s| s.error_message()).map(str::to_string),
        }
    }
}

/// An actuator target joined with its latest scan state.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorObservation {
    pub target_id: Uuid,
    pub server_name: Option<String>,
    pub role: Role,
    pub profile: String,
    pub scanned_at: Option<DateTime<Utc>>,
    pub outcome: Option<ScanOutcomeKind>,
    pub error_kind: Option<ScanErrorKind>,
    pub error_message: Option<String>,
    pub health_status: Option<String>,
    pub app_name: Option<String>,
    pub cpu_usage: Option<f64>,
    pub memory_used_bytes: Option<u64>,
}

impl ActuatorObservation {
    pub fn new(
        target_id: Uuid,
        server_name: Option<String>,
        role: Role,
        profile: impl Into<String>,
        state: Option<&ScanState<ActuatorSnapshot>>,
    ) -> Self {
        let snapshot = state.and_then(ScanState::payload);
        Self {
            target_id,
            server_name,
            role,
            profile: profile.into(),
            scanned_at: state.map(|s| s.scanned_at),
            outcome: state.map(ScanState::outcome_kind),
            error_kind: state.and_then(ScanState::error_kind),
            error_message: state.and_then(|s| s.error_message()).map(str::to_string),
            health_status: snapshot.map(|s| s.health_status.clone()),
            app_name: snapshot.map(|s| s.app_name.clone()),
            cpu_usage: snapshot.map(|s| s.cpu_usage),
            memory_used_bytes: snapshot.map(|s| s.memory_used_bytes),
        }
    }
}

// ── Outputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Never `OK`.
    pub severity: Severity,
    pub kind: IssueKind,
    pub target_id: Uuid,
    pub server_name: Option<String>,
    pub role: Role,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub verdict: Severity,
    pub issues: Vec<Issue>,
    pub block_issues: usize,
    pub warn_issues: usize,
    pub unknown_issues: usize,
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Tomcat issues first (input order), then actuator issues (input order).
pub fn evaluate(tomcats: &[TomcatObservation], actuators: &[ActuatorObservation]) -> Evaluation {
    let mut issues: Vec<Issue> = tomcats.iter().filter_map(tomcat_issue).collect();
    issues.extend(actuators.iter().filter_map(actuator_issue));

    let count = |sev: Severity| issues.iter().filter(|i| i.severity == sev).count();
    let (block_issues, warn_issues, unknown_issues) =
        (count(Severity::Block), count(Severity::Warn), count(Severity::Unknown));

    let verdict = if block_issues > 0 {
        Severity::Block
    } else if warn_issues > 0 {
        Severity::Warn
    } else if unknown_issues > 0 {
        Severity::Unknown
    } else {
        Severity::Ok
    };

    Evaluation { verdict, issues, block_issues, warn_issues, unknown_issues }
}

fn tomcat_issue(t: &TomcatObservation) -> Option<Issue> {
    let issue = |severity, message| Issue {
        severity,
        kind: IssueKind::TomcatTarget,
        target_id: t.target_id,
        server_name: t.server_name.clone(),
        role: t.role,
        label: format!("Tomcat {}", t.role.as_str().to_lowercase()),
        message,
    };

    match (t.scanned_at, t.outcome) {
        (None, _) | (_, None) => Some(issue(Severity::Unknown, NOT_SCANNED.to_string())),
        (Some(_), Some(ScanOutcomeKind::Error)) => {
            Some(issue(Severity::Block, error_message(t.error_kind, t.error_message.as_deref())))
        }
        (Some(_), Some(ScanOutcomeKind::Success)) => None,
    }
}

fn actuator_issue(a: &ActuatorObservation) -> Option<Issue> {
    let issue = |severity, message| Issue {
        severity,
        kind: IssueKind::ActuatorTarget,
        target_id: a.target_id,
        server_name: a.server_name.clone(),
        role: a.role,
        label: format!("Microservice {}", a.profile),
        message,
    };

    match (a.scanned_at, a.outcome) {
        (None, _) | (_, None) => return Some(issue(Severity::Unknown, NOT_SCANNED.to_string())),
        (Some(_), Some(ScanOutcomeKind::Error)) => {
            return Some(issue(
                Severity::Block,
                error_message(a.error_kind, a.error_message.as_deref()),
            ));
        }
        (Some(_), Some(ScanOutcomeKind::Success)) => {}
    }

    // Checks run in a fixed order; BLOCK is sticky, WARN only lifts OK/WARN.
    let mut severity = Severity::Ok;
    let mut parts = Vec::new();

    let health = a.health_status.as_deref().unwrap_or_default().trim();
    if !health.eq_ignore_ascii_case("UP") {
        severity = Severity::Block;
        let shown = if health.is_empty() { "UNKNOWN".to_string() } else { health.to_uppercase() };
        parts.push(format!("health={shown}"));
    }

    if let Some(cpu) = a.cpu_usage {
        if cpu >= CPU_BLOCK {
            severity = Severity::Block;
            parts.push(format!("cpu={}", format_pct(cpu)));
        } else if cpu >= CPU_WARN && severity != Severity::Block {
            severity = Severity::Warn;
            parts.push(format!("cpu={}", format_pct(cpu)));
        }
    }

    if let Some(mem) = a.memory_used_bytes {
        if mem >= MEMORY_BLOCK_BYTES {
            severity = Severity::Block;
            parts.push(format!("memory={}", format_bytes(mem)));
        } else if mem >= MEMORY_WARN_BYTES && severity != Severity::Block {
            severity = Severity::Warn;
            parts.push(format!("memory={}", format_bytes(mem)));
        }
    }

    if severity == Severity::Ok {
        return None;
    }

    let mut message = parts.join(", ");
    if let Some(app) = a.app_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        message = if message.is_empty() { app.to_string() } else { format!("{app} · {message}") };
    }
    if message.is_empty() {
        message = "Degraded".to_string();
    }
    Some(issue(severity, message))
}

fn error_message(kind: Option<ScanErrorKind>, message: Option<&str>) -> String {
    format!(
        "{}: {}",
        kind.unwrap_or(ScanErrorKind::Unknown),
        message.unwrap_or("Unknown error")
    )
}

/// `0.955` → `"95.5%"`.
fn format_pct(ratio: f64) -> String {
    format!("{:.1}%", (ratio * 1000.0).round() / 10.0)
}

/// Whole MB below 1024 MB, otherwise GB to one decimal.
fn format_bytes(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb < 1024.0 {
        format!("{}MB", mb.round() as u64)
    } else {
        format!("{:.1}GB", (mb / 1024.0 * 10.0).round() / 10.0)
    }
}
