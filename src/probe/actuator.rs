//! Actuator client: four JSON GETs per scan under `/{profile}/actuator/…`.
//!
//! The calls run in a fixed order (health, info, cpu, memory) and the first
//! failure ends the scan. All four URLs are validated before any request.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::inventory::ActuatorTarget;
use super::{build_client, endpoint_url, fetch_text, FetchError};

const HEALTH: &str = "actuator/health";
const INFO: &str = "actuator/info";
const CPU_USAGE: &str = "actuator/metrics/system.cpu.usage";
const MEMORY_USED: &str = "actuator/metrics/jvm.memory.used";

/// Everything a successful actuator scan records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuatorSnapshot {
    /// As reported, e.g. `"UP"`.
    pub health_status: String,
    pub app_name: String,
    pub build_version: Option<String>,
    /// Ratio, normally `0.0..=1.0`; kept as reported when above 1.
    pub cpu_usage: f64,
    pub memory_used_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ActuatorClient;

impl ActuatorClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn fetch(&self, target: &ActuatorTarget) -> Result<ActuatorSnapshot, FetchError> {
        let profile = validate_profile(&target.profile)?;
        let url = |suffix: &str| {
            endpoint_url(&target.base_url, target.port, &format!("/{profile}/{suffix}"))
        };
        let (health_url, info_url, cpu_url, mem_url) =
            (url(HEALTH)?, url(INFO)?, url(CPU_USAGE)?, url(MEMORY_USED)?);

        let client = build_client(target.connect_timeout_ms)?;
        let timeout = Duration::from_millis(target.request_timeout_ms);
        debug!(target_id = %target.id, %profile, "fetching actuator endpoints");

        let health = get_json(&client, health_url, timeout).await?;
        let health_status = required_text(&health, "status")?;

        let info = get_json(&client, info_url, timeout).await?;
        let app = &info["app"];
        let app_name = required_text(app, "name")?;
        let build_version = app["build"]["version"]
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let cpu = get_json(&client, cpu_url, timeout).await?;
        let cpu_usage = measurement(&cpu)?
            .as_f64()
            .ok_or_else(|| FetchError::parse("Missing measurement value"))?;

        let mem = get_json(&client, mem_url, timeout).await?;
        let mem_value = measurement(&mem)?;
        let memory_used_bytes = mem_value
            .as_u64()
            .or_else(|| mem_value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| FetchError::parse("Missing measurement value"))?;

        Ok(ActuatorSnapshot { health_status, app_name, build_version, cpu_usage, memory_used_bytes })
    }
}

/// Trimmed profile; must be a single path segment of `[A-Za-z0-9_-]`.
pub fn validate_profile(raw: &str) -> Result<&str, FetchError> {
    let profile = raw.trim();
    if profile.is_empty() {
        return Err(FetchError::unknown("profile is required"));
    }
    if !profile.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(FetchError::unknown("profile must match [a-zA-Z0-9_-]+"));
    }
    Ok(profile)
}

async fn get_json(client: &Client, url: Url, timeout: Duration) -> Result<Value, FetchError> {
    let body = fetch_text(client.get(url).timeout(timeout)).await?;
    serde_json::from_str(&body).map_err(|_| FetchError::parse("Invalid JSON"))
}

/// Non-blank string field; the value itself is kept untrimmed.
fn required_text(node: &Value, field: &str) -> Result<String, FetchError> {
    match node.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(FetchError::parse(format!("Missing field: {field}"))),
    }
}

/// `measurements[0].value` of a metrics response, which must be numeric.
fn measurement(metric: &Value) -> Result<&Value, FetchError> {
    let first = metric
        .get("measurements")
        .and_then(Value::as_array)
        .and_then(|m| m.first())
        .ok_or_else(|| FetchError::parse("Missing measurements"))?;
    first
        .get("value")
        .filter(|v| v.is_number())
        .ok_or_else(|| FetchError::parse("Missing measurement value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::model::{Role, ScanErrorKind};

    fn target_for(server: &MockServer, profile: &str) -> ActuatorTarget {
        let addr = server.address();
        ActuatorTarget {
            id: Uuid::new_v4(),
            server_id: Uuid::new_v4(),
            role: Role::Services,
            base_url: format!("http://{}", addr.ip()),
            port: addr.port(),
            profile: profile.into(),
            connect_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
        }
    }

    async fn mount_json(server: &MockServer, p: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_healthy(server: &MockServer) {
        mount_json(server, "/orders/actuator/health", json!({ "status": "UP" })).await;
        mount_json(
            server,
            "/orders/actuator/info",
            json!({ "app": { "name": "orders-svc", "build": { "version": " 3.2.1 " } } }),
        )
        .await;
        mount_json(
            server,
            "/orders/actuator/metrics/system.cpu.usage",
            json!({ "name": "system.cpu.usage", "measurements": [{ "statistic": "VALUE", "value": 0.42 }] }),
        )
        .await;
        mount_json(
            server,
            "/orders/actuator/metrics/jvm.memory.used",
            json!({ "name": "jvm.memory.used", "measurements": [{ "statistic": "VALUE", "value": 524288000 }] }),
        )
        .await;
    }

    #[tokio::test]
    async fn fetch_collects_all_four_endpoints() {
        let server = MockServer::start().await;
        mount_healthy(&server).await;

        let snap = ActuatorClient::new().fetch(&target_for(&server, " orders ")).await.unwrap();
        assert_eq!(snap.health_status, "UP");
        assert_eq!(snap.app_name, "orders-svc");
        assert_eq!(snap.build_version.as_deref(), Some("3.2.1"));
        assert!((snap.cpu_usage - 0.42).abs() < f64::EPSILON);
        assert_eq!(snap.memory_used_bytes, 524_288_000);
    }

    #[tokio::test]
    async fn float_memory_value_is_accepted() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "DOWN" })).await;
        mount_json(&server, "/orders/actuator/info", json!({ "app": { "name": "orders-svc" } })).await;
        mount_json(
            &server,
            "/orders/actuator/metrics/system.cpu.usage",
            json!({ "measurements": [{ "value": 1 }] }),
        )
        .await;
        mount_json(
            &server,
            "/orders/actuator/metrics/jvm.memory.used",
            json!({ "measurements": [{ "value": 1.2e9 }] }),
        )
        .await;

        let snap = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap();
        assert_eq!(snap.health_status, "DOWN");
        assert_eq!(snap.build_version, None);
        assert_eq!(snap.memory_used_bytes, 1_200_000_000);
        assert!((snap.cpu_usage - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn first_failure_stops_the_pipeline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/actuator/health"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orders/actuator/info"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::new(ScanErrorKind::Http, "HTTP 500"));
    }

    #[tokio::test]
    async fn missing_status_is_a_parse_error() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "  " })).await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Missing field: status"));
    }

    #[tokio::test]
    async fn missing_app_name_is_a_parse_error() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "UP" })).await;
        mount_json(&server, "/orders/actuator/info", json!({})).await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Missing field: name"));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/actuator/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Invalid JSON"));
    }

    #[tokio::test]
    async fn empty_measurements_are_rejected() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "UP" })).await;
        mount_json(&server, "/orders/actuator/info", json!({ "app": { "name": "x" } })).await;
        mount_json(&server, "/orders/actuator/metrics/system.cpu.usage", json!({ "measurements": [] })).await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Missing measurements"));
    }

    #[tokio::test]
    async fn non_numeric_measurement_is_rejected() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "UP" })).await;
        mount_json(&server, "/orders/actuator/info", json!({ "app": { "name": "x" } })).await;
        mount_json(
            &server,
            "/orders/actuator/metrics/system.cpu.usage",
            json!({ "measurements": [{ "value": "high" }] }),
        )
        .await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Missing measurement value"));
    }

    #[tokio::test]
    async fn negative_memory_is_rejected() {
        let server = MockServer::start().await;
        mount_json(&server, "/orders/actuator/health", json!({ "status": "UP" })).await;
        mount_json(&server, "/orders/actuator/info", json!({ "app": { "name": "x" } })).await;
        mount_json(
            &server,
            "/orders/actuator/metrics/system.cpu.usage",
            json!({ "measurements": [{ "value": 1.25 }] }),
        )
        .await;
        mount_json(
            &server,
            "/orders/actuator/metrics/jvm.memory.used",
            json!({ "measurements": [{ "value": -1 }] }),
        )
        .await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err, FetchError::parse("Missing measurement value"));
    }

    #[tokio::test]
    async fn forbidden_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = ActuatorClient::new().fetch(&target_for(&server, "orders")).await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Auth);
    }

    #[test]
    fn profile_validation() {
        assert_eq!(validate_profile(" pay_v2-eu ").unwrap(), "pay_v2-eu");
        assert_eq!(validate_profile("   ").unwrap_err().message, "profile is required");
        assert_eq!(
            validate_profile("a/b").unwrap_err().message,
            "profile must match [a-zA-Z0-9_-]+"
        );
    }

    #[tokio::test]
    async fn invalid_profile_fails_without_network() {
        let target = ActuatorTarget {
            id: Uuid::new_v4(),
            server_id: Uuid::new_v4(),
            role: Role::Services,
            base_url: "http://127.0.0.1".into(),
            port: 1,
            profile: "../etc".into(),
            connect_timeout_ms: 10,
            request_timeout_ms: 10,
        };
        let err = ActuatorClient::new().fetch(&target).await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Unknown);
    }
}
