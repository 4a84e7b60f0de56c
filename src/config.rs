//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! the path given with `-f`), then applies `HIVEWATCH_INVENTORY` and
//! `HIVEWATCH_LOG_LEVEL` env overrides.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Periodic sweep timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// When `false` every tick is a no-op.
    pub enabled: bool,
    /// Delay between the end of one sweep and the start of the next.
    pub fixed_delay: Duration,
    /// Delay before the first sweep after startup.
    pub initial_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScansConfig {
    /// Gates on-demand scans triggered outside the scheduler.
    pub manual_enabled: bool,
    /// Upper bound on concurrent fetches within one environment scan.
    pub max_concurrency: usize,
    pub scheduler: SchedulerConfig,
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub log_level: String,
    /// Inventory file (already expanded, no `~`).
    pub inventory_path: PathBuf,
    pub scans: ScansConfig,
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    service: RawService,
    #[serde(default)]
    scans: RawScans,
}

#[derive(Deserialize)]
struct RawService {
    #[serde(default = "default_service_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_inventory")]
    inventory: String,
}

impl Default for RawService {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            inventory: default_inventory(),
        }
    }
}

#[derive(Deserialize)]
struct RawScans {
    #[serde(default = "default_true")]
    manual_enabled: bool,
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
    #[serde(default)]
    scheduler: RawScheduler,
}

impl Default for RawScans {
    fn default() -> Self {
        Self {
            manual_enabled: true,
            max_concurrency: default_max_concurrency(),
            scheduler: RawScheduler::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawScheduler {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_fixed_delay_ms")]
    fixed_delay_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    initial_delay_ms: u64,
}

impl Default for RawScheduler {
    fn default() -> Self {
        Self {
            enabled: true,
            fixed_delay_ms: default_fixed_delay_ms(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_service_name() -> String { "hivewatch".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_inventory() -> String { "config/inventory.toml".to_string() }
fn default_max_concurrency() -> usize { 8 }
fn default_fixed_delay_ms() -> u64 { 60_000 }
fn default_initial_delay_ms() -> u64 { 5_000 }

fn default_true() -> bool {
    true
}

/// Load config from `path` (or `config/default.toml`), then apply env-var
/// overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let inventory_override = env::var("HIVEWATCH_INVENTORY").ok();
    let log_level_override = env::var("HIVEWATCH_LOG_LEVEL").ok();
    load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        inventory_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    inventory_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.service;
    let inventory_path = expand_home(inventory_override.unwrap_or(&s.inventory));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();

    let scans = parsed.scans;
    if scans.max_concurrency == 0 {
        return Err(AppError::Config("scans.max_concurrency must be >= 1".into()));
    }
    if scans.scheduler.fixed_delay_ms == 0 {
        return Err(AppError::Config("scans.scheduler.fixed_delay_ms must be > 0".into()));
    }

    Ok(Config {
        service_name: s.name,
        log_level,
        inventory_path,
        scans: ScansConfig {
            manual_enabled: scans.manual_enabled,
            max_concurrency: scans.max_concurrency,
            scheduler: SchedulerConfig {
                enabled: scans.scheduler.enabled,
                fixed_delay: Duration::from_millis(scans.scheduler.fixed_delay_ms),
                initial_delay: Duration::from_millis(scans.scheduler.initial_delay_ms),
            },
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl ScansConfig {
    /// Manual scans on, scheduler ticking every second with no initial delay.
    pub fn test_default() -> Self {
        Self {
            manual_enabled: true,
            max_concurrency: 4,
            scheduler: SchedulerConfig {
                enabled: true,
                fixed_delay: Duration::from_secs(1),
                initial_delay: Duration::ZERO,
            },
        }
    }
}
