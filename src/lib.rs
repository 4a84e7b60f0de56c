//! hivewatch: Tomcat manager and actuator fleet monitor.
//!
//! Polls every target in the inventory on a fixed delay, keeps the latest
//! scan outcome per target and turns those outcomes into a per-environment
//! verdict (`OK` / `UNKNOWN` / `WARN` / `BLOCK`).

pub mod config;
pub mod decision;
pub mod error;
pub mod inventory;
pub mod logger;
pub mod model;
pub mod probe;
pub mod scan;
pub mod status;
pub mod store;
