//! Protocol clients for the two management surfaces we poll.
//!
//! - [`tomcat`]: Tomcat manager HTML console (`/manager/html`).
//! - [`actuator`]: Spring-Boot-style actuator JSON endpoints.
//!
//! Both clients share the plumbing in this module: base-URL validation,
//! per-target HTTP client construction (connect timeout, redirects off) and
//! response classification into the [`ScanErrorKind`] taxonomy. Clients never
//! return anything but `Result<Snapshot, FetchError>`: every transport, status
//! or body problem is converted before it leaves the client.

pub mod actuator;
pub mod tomcat;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::ScanErrorKind;

/// A classified fetch failure, ready to be stored as an error outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ScanErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Unknown, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Parse, message)
    }

    /// The fetch task was aborted or panicked before producing a result.
    pub fn interrupted() -> Self {
        Self::unknown("Interrupted")
    }
}

/// Validate `base_url` and return `{scheme}://{host}:{port}{path}`.
///
/// `base_url` must be an absolute http/https URL with a host and nothing
/// else: no userinfo, no port (the port is a separate target field) and no
/// path beyond `/`. Query and fragment are dropped. Violations are `UNKNOWN`
/// errors raised before any network traffic.
pub fn endpoint_url(base_url: &str, port: u16, path: &str) -> Result<Url, FetchError> {
    let raw = base_url.trim();
    if raw.is_empty() {
        return Err(FetchError::unknown("baseUrl is required"));
    }
    if !path.starts_with('/') {
        return Err(FetchError::unknown("path must start with '/'"));
    }
    if port == 0 {
        return Err(FetchError::unknown("port must be 1..65535"));
    }

    let mut url = Url::parse(raw).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => FetchError::unknown("baseUrl must be absolute"),
        _ => FetchError::unknown("baseUrl is invalid"),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(FetchError::unknown("baseUrl scheme must be http/https"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(FetchError::unknown("baseUrl must not include userinfo"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::unknown("baseUrl must include host"));
    }
    // `Url::port` hides an explicit default port (`http://h:80`), so look at
    // the authority text as well.
    if url.port().is_some() || has_explicit_port(raw) {
        return Err(FetchError::unknown(
            "baseUrl must not include port; use explicit port field",
        ));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(FetchError::unknown("baseUrl must not include a path"));
    }

    url.set_port(Some(port))
        .map_err(|_| FetchError::unknown("Invalid endpoint URI"))?;
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn has_explicit_port(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    if let Some(v6) = host_port.strip_prefix('[') {
        return v6.split_once(']').is_some_and(|(_, tail)| tail.starts_with(':'));
    }
    host_port.contains(':')
}

/// Client for a single target: connect timeout from the target, no redirects.
pub(crate) fn build_client(connect_timeout_ms: u64) -> Result<Client, FetchError> {
    Client::builder()
        .connect_timeout(Duration::from_millis(connect_timeout_ms))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| FetchError::unknown(format!("failed to build HTTP client: {e}")))
}

/// Send one prepared GET and return the body of a 2xx response.
///
/// The request timeout must already be set on `request`.
pub(crate) async fn fetch_text(request: RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await.map_err(classify_transport)?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::new(ScanErrorKind::Auth, "Unauthorized"));
    }
    if !status.is_success() {
        return Err(FetchError::new(ScanErrorKind::Http, format!("HTTP {}", status.as_u16())));
    }

    response.text().await.map_err(classify_transport)
}

/// Timeouts (connect or request) first, then connect failures; everything
/// else on the wire is generic I/O.
fn classify_transport(e: reqwest::Error) -> FetchError {
    debug!(error = %e, url = ?e.url().map(Url::as_str), "transport failure");
    if e.is_timeout() {
        FetchError::new(ScanErrorKind::Timeout, "Timeout")
    } else if e.is_connect() {
        FetchError::new(ScanErrorKind::Connectivity, "Connection failed")
    } else if e.is_builder() {
        FetchError::unknown(format!("invalid request: {e}"))
    } else {
        FetchError::new(ScanErrorKind::Connectivity, "I/O error")
    }
}
