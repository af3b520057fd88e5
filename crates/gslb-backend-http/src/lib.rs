// # HTTP Control-Channel Backend
//
// This crate provides the `Backend` implementation that talks to the remote
// authority over its HTTP control channel.
//
// ## Behavior
//
// - ✅ One HTTP request per engine call
// - ✅ Full error propagation to the engine (the next tick is the retry)
// - ✅ Client-side request timeout
// - ✅ Specific error mapping for HTTP status codes (401/403, 404, 429, 5xx)
// - ✅ `304 Not Modified` and `{"unchanged": true}` both mean "no change"
// - ❌ NO retry logic (owned by the sync loop)
// - ❌ NO caching (state owned by the record cache)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - The shared secret NEVER appears in logs or `Debug` output
// - Construction fails fast if the secret or endpoint is empty
//
// ## API Reference
//
// - Full snapshot: GET `/dns/snapshot?zone=<zone>[&node_ip=<ip>]`
// - Change check:  GET `/dns/changes?zone=<zone>&since=<version>[&node_ip=<ip>]`
// - Authentication: `X-Gslb-Secret: <secret>`

use async_trait::async_trait;
use gslb_core::config::BackendConfig;
use gslb_core::traits::{Backend, ChangeCheck, Snapshot};
use gslb_core::{Error, RawRecord, Result};
use serde::Deserialize;
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-Gslb-Secret";

const BACKEND_NAME: &str = "http";

/// Body of a snapshot or change-check response
///
/// Every field is optional on the wire so that missing fields are reported
/// as malformed responses rather than decode errors.
#[derive(Debug, Deserialize)]
struct WireSnapshot {
    #[serde(default)]
    unchanged: bool,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    version_hash: String,
    #[serde(default)]
    records: Vec<RawRecord>,
}

impl WireSnapshot {
    fn into_snapshot(self, what: &str) -> Result<Snapshot> {
        if self.zone.is_empty() {
            return Err(Error::malformed(format!("missing zone in {}", what)));
        }
        if self.version_hash.is_empty() {
            return Err(Error::malformed(format!("missing version_hash in {}", what)));
        }
        Ok(Snapshot::new(self.zone, self.version_hash, self.records))
    }
}

/// HTTP backend
///
/// # Trust Level: Untrusted
///
/// Isolated, stateless and single-shot. The sync engine owns scheduling
/// and wraps every call in its own timeout as well.
///
/// # Security
///
/// The Debug implementation does NOT expose the shared secret.
pub struct HttpBackend {
    /// Base URL without trailing slash
    endpoint: String,

    /// Shared secret
    /// ⚠️ NEVER log this value
    secret: String,

    /// Node address reported to the backend
    node_ip: Option<String>,

    /// HTTP client for control-channel requests
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("endpoint", &self.endpoint)
            .field("secret", &"<REDACTED>")
            .field("node_ip", &self.node_ip)
            .finish()
    }
}

impl HttpBackend {
    /// Create a new HTTP backend
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Base URL of the control channel
    /// - `secret`: Shared secret sent with every request
    /// - `node_ip`: Optional node address reported to the backend
    /// - `timeout`: Per-request timeout
    /// - `tls_skip_verify`: Accept invalid TLS certificates
    ///
    /// # Errors
    ///
    /// `Config` if the endpoint or secret is empty, or the HTTP client
    /// cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        secret: impl Into<String>,
        node_ip: Option<String>,
        timeout: Duration,
        tls_skip_verify: bool,
    ) -> Result<Self> {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        let secret = secret.into();

        if endpoint.is_empty() {
            return Err(Error::config("Backend endpoint cannot be empty"));
        }
        if secret.is_empty() {
            return Err(Error::config("Backend secret cannot be empty"));
        }

        if tls_skip_verify {
            tracing::warn!("TLS certificate verification is disabled for the backend");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(tls_skip_verify)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            secret,
            node_ip: node_ip.filter(|ip| !ip.trim().is_empty()),
            client,
        })
    }

    /// Create a backend from the shared configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.secret.clone(),
            config.node_ip.clone(),
            config.timeout(),
            config.tls_skip_verify,
        )
    }

    /// Base URL (without trailing slash)
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one GET request with the common query and headers
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.endpoint, path);

        let mut request = self
            .client
            .get(&url)
            .header(SECRET_HEADER, &self.secret)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);

        if let Some(ref node_ip) = self.node_ip {
            request = request.query(&[("node_ip", node_ip.as_str())]);
        }

        request.send().await.map_err(|e| {
            let kind = if e.is_timeout() { "timed out" } else { "failed" };
            Error::backend_unavailable(format!("GET {} {}: {}", path, kind, e.without_url()))
        })
    }

    /// Read and decode a success body
    async fn decode(response: reqwest::Response) -> Result<WireSnapshot> {
        let body = response
            .text()
            .await
            .map_err(|e| Error::backend_unavailable(format!("Failed to read response body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::malformed(format!("Failed to decode response: {}", e)))
    }
}

/// Map a non-success status to an engine error
async fn status_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Error::backend(
            BACKEND_NAME,
            format!("Authentication failed: invalid secret. Status: {}", status),
        ),
        404 => Error::backend(
            BACKEND_NAME,
            format!("Zone not found on backend. Status: {}", status),
        ),
        429 => Error::backend_unavailable(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::backend_unavailable(format!(
            "Backend server error (transient): {} - {}",
            status, error_text
        )),
        _ => Error::backend(
            BACKEND_NAME,
            format!("Unexpected status: {} - {}", status, error_text),
        ),
    }
}

/// Zone name as the control channel expects it (no trailing dot)
fn api_zone(zone: &str) -> &str {
    zone.trim().trim_end_matches('.')
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_snapshot(&self, zone: &str) -> Result<Snapshot> {
        let zone = api_zone(zone);
        tracing::debug!(zone, "fetching zone snapshot");

        let response = self.get("/dns/snapshot", &[("zone", zone)]).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let snapshot = Self::decode(response).await?.into_snapshot("snapshot")?;
        tracing::debug!(
            version = %snapshot.version_tag,
            records = snapshot.records.len(),
            "snapshot received"
        );
        Ok(snapshot)
    }

    async fn check_changes(&self, zone: &str, since: &str) -> Result<ChangeCheck> {
        let zone = api_zone(zone);
        tracing::debug!(zone, since, "checking for changes");

        let response = self
            .get("/dns/changes", &[("zone", zone), ("since", since)])
            .await?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(ChangeCheck::Unchanged);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let wire = Self::decode(response).await?;
        if wire.unchanged {
            return Ok(ChangeCheck::Unchanged);
        }

        Ok(ChangeCheck::Changed(wire.into_snapshot("changes")?))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}
