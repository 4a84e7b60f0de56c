//! Application-wide error types.
//!
//! Protocol fetch failures are not represented here: they are recorded as
//! scan outcomes (see [`crate::probe::FetchError`]) and never abort a sweep.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("inventory error: {0}")]
    Inventory(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("manual scans are disabled")]
    ManualScansDisabled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
