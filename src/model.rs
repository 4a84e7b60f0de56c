//! Closed vocabularies shared by the scan, store and decision modules.
//!
//! Wire names are the upper-case constants used by stored rows and status
//! payloads (`"TIMEOUT"`, `"BLOCK"`, …).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared role of a monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Services,
    Auth,
    Payments,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Services => "SERVICES",
            Role::Auth => "AUTH",
            Role::Payments => "PAYMENTS",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fetch failed. Shared by both protocol clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanErrorKind {
    /// Refused, unreachable, or any other transport I/O failure.
    Connectivity,
    /// Client-side deadline exceeded (connect or request).
    Timeout,
    /// HTTP 401 / 403.
    Auth,
    /// Any other non-2xx status.
    Http,
    /// Malformed or incomplete response body.
    Parse,
    /// URL construction failure, interruption, or anything uncategorised.
    Unknown,
}

impl ScanErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorKind::Connectivity => "CONNECTIVITY",
            ScanErrorKind::Timeout => "TIMEOUT",
            ScanErrorKind::Auth => "AUTH",
            ScanErrorKind::Http => "HTTP",
            ScanErrorKind::Parse => "PARSE",
            ScanErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcomeKind {
    Success,
    Error,
}

/// Issue severity and aggregate verdict.
///
/// Variant order is the dominance order (`Ok < Unknown < Warn < Block`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Unknown,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Unknown => "UNKNOWN",
            Severity::Warn => "WARN",
            Severity::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of target an issue was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    TomcatTarget,
    ActuatorTarget,
}
