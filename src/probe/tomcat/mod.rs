//! Tomcat manager client: one authenticated `GET /manager/html` per scan.

pub mod parser;

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::inventory::TomcatTarget;
use super::{build_client, endpoint_url, fetch_text, FetchError};

pub use parser::{parse_snapshot, ParseError};

const MANAGER_PATH: &str = "/manager/html";

/// A deployed web application as listed by the manager console.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WebApp {
    pub path: String,
    pub name: String,
    pub version: Option<String>,
}

/// Everything a successful Tomcat scan records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TomcatSnapshot {
    /// Sorted case-insensitively by path, no duplicates.
    pub webapps: Vec<WebApp>,
    pub tomcat_version: Option<String>,
    pub java_version: Option<String>,
    pub os: Option<String>,
}

/// Stateless; a fresh HTTP client is built per fetch so that each target's
/// connect timeout applies.
#[derive(Debug, Clone, Default)]
pub struct TomcatManagerClient;

impl TomcatManagerClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn fetch(&self, target: &TomcatTarget) -> Result<TomcatSnapshot, FetchError> {
        let url = endpoint_url(&target.base_url, target.port, MANAGER_PATH)?;
        let client = build_client(target.connect_timeout_ms)?;
        debug!(target_id = %target.id, %url, "fetching tomcat manager page");

        let request = client
            .get(url)
            .basic_auth(&target.username, Some(&target.password))
            .timeout(Duration::from_millis(target.request_timeout_ms));
        let html = fetch_text(request).await?;

        parse_snapshot(&html).map_err(|e| FetchError::parse(e.0))
    }
}
