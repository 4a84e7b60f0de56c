//! Target metadata: environments, servers and the Tomcat / Actuator targets
//! hosted on them.
//!
//! The scan core only reads this data. [`Inventory`] is the in-memory
//! implementation loaded from a TOML file; anything else that can answer the
//! [`InventoryStore`] lookups can stand in for it.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::Role;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub name: String,
}

/// A Tomcat instance polled through its manager HTML console.
#[derive(Clone, PartialEq, Eq)]
pub struct TomcatTarget {
    pub id: Uuid,
    pub server_id: Uuid,
    pub role: Role,
    /// `scheme://host` only; the port lives in [`port`](Self::port).
    pub base_url: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl fmt::Debug for TomcatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TomcatTarget")
            .field("id", &self.id)
            .field("server_id", &self.server_id)
            .field("role", &self.role)
            .field("base_url", &self.base_url)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// A service exposing a Spring-Boot-style actuator under `/{profile}/actuator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorTarget {
    pub id: Uuid,
    pub server_id: Uuid,
    pub role: Role,
    pub base_url: String,
    pub port: u16,
    pub profile: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

/// Read-only lookups over target metadata.
pub trait InventoryStore: Send + Sync {
    fn environments(&self) -> Result<Vec<Environment>, AppError>;
    fn environment(&self, id: Uuid) -> Result<Option<Environment>, AppError>;
    fn servers_in_environment(&self, environment_id: Uuid) -> Result<Vec<Server>, AppError>;
    fn server(&self, id: Uuid) -> Result<Option<Server>, AppError>;

    fn tomcat_target(&self, id: Uuid) -> Result<Option<TomcatTarget>, AppError>;
    fn tomcat_targets_for_servers(&self, server_ids: &[Uuid]) -> Result<Vec<TomcatTarget>, AppError>;

    fn actuator_target(&self, id: Uuid) -> Result<Option<ActuatorTarget>, AppError>;
    fn actuator_targets_for_servers(
        &self,
        server_ids: &[Uuid],
    ) -> Result<Vec<ActuatorTarget>, AppError>;
}

/// Immutable in-memory inventory. Lookups preserve file order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    environments: Vec<Environment>,
    servers: Vec<Server>,
    tomcat_targets: Vec<TomcatTarget>,
    actuator_targets: Vec<ActuatorTarget>,
}

impl Inventory {
    pub fn new(
        environments: Vec<Environment>,
        servers: Vec<Server>,
        tomcat_targets: Vec<TomcatTarget>,
        actuator_targets: Vec<ActuatorTarget>,
    ) -> Self {
        Self { environments, servers, tomcat_targets, actuator_targets }
    }

    /// Read and validate an inventory file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Inventory(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
            .map_err(|e| match e {
                AppError::Inventory(msg) => AppError::Inventory(format!("{}: {msg}", path.display())),
                other => other,
            })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let parsed: RawInventory = toml::from_str(raw)
            .map_err(|e| AppError::Inventory(format!("parse error: {e}")))?;

        let mut inventory = Inventory::default();
        let mut seen = HashSet::new();

        for raw_env in parsed.environments {
            let env_id = claim_id(&mut seen, raw_env.id)?;
            let env_name = required("environment name", &raw_env.name)?;

            for raw_server in raw_env.servers {
                let server_id = claim_id(&mut seen, raw_server.id)?;
                let server_name = required("server name", &raw_server.name)?;

                for t in raw_server.tomcat_targets {
                    let label = format!("tomcat target on server '{server_name}'");
                    inventory.tomcat_targets.push(TomcatTarget {
                        id: claim_id(&mut seen, t.id)?,
                        server_id,
                        role: t.role,
                        base_url: required(&format!("{label} base_url"), &t.base_url)?,
                        port: port(&label, t.port)?,
                        username: t.username,
                        password: t.password,
                        connect_timeout_ms: timeout(&label, "connect_timeout_ms", t.connect_timeout_ms)?,
                        request_timeout_ms: timeout(&label, "request_timeout_ms", t.request_timeout_ms)?,
                    });
                }

                for t in raw_server.actuator_targets {
                    let label = format!("actuator target '{}' on server '{server_name}'", t.profile);
                    inventory.actuator_targets.push(ActuatorTarget {
                        id: claim_id(&mut seen, t.id)?,
                        server_id,
                        role: t.role,
                        base_url: required(&format!("{label} base_url"), &t.base_url)?,
                        port: port(&label, t.port)?,
                        profile: t.profile,
                        connect_timeout_ms: timeout(&label, "connect_timeout_ms", t.connect_timeout_ms)?,
                        request_timeout_ms: timeout(&label, "request_timeout_ms", t.request_timeout_ms)?,
                    });
                }

                inventory.servers.push(Server {
                    id: server_id,
                    environment_id: env_id,
                    name: server_name,
                });
            }

            inventory.environments.push(Environment { id: env_id, name: env_name });
        }

        Ok(inventory)
    }

    /// Find an environment by id string or by (case-insensitive) name.
    pub fn find_environment(&self, key: &str) -> Option<&Environment> {
        let key = key.trim();
        let by_id = Uuid::parse_str(key).ok();
        self.environments
            .iter()
            .find(|e| Some(e.id) == by_id || e.name.eq_ignore_ascii_case(key))
    }

    pub fn target_count(&self) -> usize {
        self.tomcat_targets.len() + self.actuator_targets.len()
    }
}

impl InventoryStore for Inventory {
    fn environments(&self) -> Result<Vec<Environment>, AppError> {
        Ok(self.environments.clone())
    }

    fn environment(&self, id: Uuid) -> Result<Option<Environment>, AppError> {
        Ok(self.environments.iter().find(|e| e.id == id).cloned())
    }

    fn servers_in_environment(&self, environment_id: Uuid) -> Result<Vec<Server>, AppError> {
        Ok(self
            .servers
            .iter()
            .filter(|s| s.environment_id == environment_id)
            .cloned()
            .collect())
    }

    fn server(&self, id: Uuid) -> Result<Option<Server>, AppError> {
        Ok(self.servers.iter().find(|s| s.id == id).cloned())
    }

    fn tomcat_target(&self, id: Uuid) -> Result<Option<TomcatTarget>, AppError> {
        Ok(self.tomcat_targets.iter().find(|t| t.id == id).cloned())
    }

    fn tomcat_targets_for_servers(&self, server_ids: &[Uuid]) -> Result<Vec<TomcatTarget>, AppError> {
        Ok(self
            .tomcat_targets
            .iter()
            .filter(|t| server_ids.contains(&t.server_id))
            .cloned()
            .collect())
    }

    fn actuator_target(&self, id: Uuid) -> Result<Option<ActuatorTarget>, AppError> {
        Ok(self.actuator_targets.iter().find(|t| t.id == id).cloned())
    }

    fn actuator_targets_for_servers(
        &self,
        server_ids: &[Uuid],
    ) -> Result<Vec<ActuatorTarget>, AppError> {
        Ok(self
            .actuator_targets
            .iter()
            .filter(|t| server_ids.contains(&t.server_id))
            .cloned()
            .collect())
    }
}

// ── validation helpers ────────────────────────────────────────────────────────

fn claim_id(seen: &mut HashSet<Uuid>, id: Option<Uuid>) -> Result<Uuid, AppError> {
    let id = id.unwrap_or_else(Uuid::new_v4);
    if !seen.insert(id) {
        return Err(AppError::Inventory(format!("duplicate id {id}")));
    }
    Ok(id)
}

fn required(what: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Inventory(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

fn port(label: &str, raw: u32) -> Result<u16, AppError> {
    match u16::try_from(raw) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(AppError::Inventory(format!("{label}: port must be 1..65535, got {raw}"))),
    }
}

fn timeout(label: &str, field: &str, ms: u64) -> Result<u64, AppError> {
    if ms == 0 {
        return Err(AppError::Inventory(format!("{label}: {field} must be > 0")));
    }
    Ok(ms)
}

// ── raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawInventory {
    #[serde(default)]
    environments: Vec<RawEnvironment>,
}

#[derive(Deserialize)]
struct RawEnvironment {
    #[serde(default)]
    id: Option<Uuid>,
    name: String,
    #[serde(default)]
    servers: Vec<RawServer>,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default)]
    id: Option<Uuid>,
    name: String,
    #[serde(default)]
    tomcat_targets: Vec<RawTomcatTarget>,
    #[serde(default)]
    actuator_targets: Vec<RawActuatorTarget>,
}

#[derive(Deserialize)]
struct RawTomcatTarget {
    #[serde(default)]
    id: Option<Uuid>,
    role: Role,
    base_url: String,
    port: u32,
    username: String,
    password: String,
    #[serde(default = "default_connect_timeout_ms")]
    connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

#[derive(Deserialize)]
struct RawActuatorTarget {
    #[serde(default)]
    id: Option<Uuid>,
    role: Role,
    base_url: String,
    port: u32,
    profile: String,
    #[serde(default = "default_connect_timeout_ms")]
    connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 { DEFAULT_CONNECT_TIMEOUT_MS }
fn default_request_timeout_ms() -> u64 { DEFAULT_REQUEST_TIMEOUT_MS }
