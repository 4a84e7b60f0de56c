//! Scan-state store: the latest scan outcome per target.
//!
//! One row per target id, replaced wholesale on every scan. There is no
//! history: a missing row means the target has never been scanned.
//!
//! The store is generic over the protocol payload `P` so Tomcat and Actuator
//! states live in separate, strongly typed stores.

pub mod memory;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{ScanErrorKind, ScanOutcomeKind};

pub use memory::MemoryScanStateStore;

/// Stored error messages are capped at this many characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 600;

/// Result of one scan of one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanState<P> {
    pub target_id: Uuid,
    /// Orchestration time, not fetch completion time.
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcome<P>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome<P> {
    Success(P),
    Error {
        kind: ScanErrorKind,
        message: Option<String>,
    },
}

impl<P> ScanState<P> {
    pub fn success(target_id: Uuid, scanned_at: DateTime<Utc>, payload: P) -> Self {
        Self { target_id, scanned_at, outcome: ScanOutcome::Success(payload) }
    }

    /// Build an error row. A missing kind is stored as `UNKNOWN`; the message
    /// is trimmed and capped at [`MAX_ERROR_MESSAGE_CHARS`].
    pub fn error(
        target_id: Uuid,
        scanned_at: DateTime<Utc>,
        kind: Option<ScanErrorKind>,
        message: Option<&str>,
    ) -> Self {
        Self {
            target_id,
            scanned_at,
            outcome: ScanOutcome::Error {
                kind: kind.unwrap_or(ScanErrorKind::Unknown),
                message: message.map(|m| truncate_message(m, MAX_ERROR_MESSAGE_CHARS)),
            },
        }
    }

    pub fn outcome_kind(&self) -> ScanOutcomeKind {
        match self.outcome {
            ScanOutcome::Success(_) => ScanOutcomeKind::Success,
            ScanOutcome::Error { .. } => ScanOutcomeKind::Error,
        }
    }

    pub fn payload(&self) -> Option<&P> {
        match &self.outcome {
            ScanOutcome::Success(p) => Some(p),
            ScanOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ScanErrorKind> {
        match &self.outcome {
            ScanOutcome::Error { kind, .. } => Some(*kind),
            ScanOutcome::Success(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ScanOutcome::Error { message, .. } => message.as_deref(),
            ScanOutcome::Success(_) => None,
        }
    }
}

/// Trim `s` and cap it at `max` characters, ending with `…` when cut.
pub fn truncate_message(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Keyed upsert / lookup of scan states.
///
/// Implementations must treat [`upsert`](Self::upsert) as a full replace of
/// the row for `state.target_id`.
pub trait ScanStateStore<P>: Send + Sync {
    fn upsert(&self, state: ScanState<P>) -> Result<(), AppError>;

    fn get(&self, target_id: Uuid) -> Result<Option<ScanState<P>>, AppError>;

    /// Rows for the ids that have one; ids never scanned are simply absent.
    fn get_many(&self, target_ids: &[Uuid]) -> Result<HashMap<Uuid, ScanState<P>>, AppError>;
}
