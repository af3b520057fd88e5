//! Configuration types for the GSLB system
//!
//! This module defines all configuration structures used throughout the crate.
//! `validate()` only checks structural consistency; the daemon layers its
//! production minimums on top.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::builder::normalize_domain;

/// Main GSLB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GslbConfig {
    /// Zone this instance is authoritative for (e.g. "gslb.example")
    pub zone: String,

    /// Remote authority connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Push/inspection/health listener settings
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl GslbConfig {
    /// Create a configuration for a zone with defaults everywhere else
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            backend: BackendConfig::default(),
            sync: SyncConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }

    /// Fully qualified, lowercase zone name
    pub fn normalized_zone(&self) -> String {
        normalize_domain(&self.zone)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("Zone cannot be empty"));
        }

        self.sync.validate()?;

        if self.webhook.enabled && self.webhook.listen_addr.trim().is_empty() {
            return Err(crate::Error::config(
                "Webhook listen address cannot be empty when the webhook is enabled",
            ));
        }

        Ok(())
    }
}

/// Remote authority connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the control channel (e.g. "https://controller:8080")
    #[serde(default)]
    pub endpoint: String,

    /// Shared secret sent with every request
    #[serde(default)]
    pub secret: String,

    /// Optional node address reported to the backend
    #[serde(default)]
    pub node_ip: Option<String>,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub tls_skip_verify: bool,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            secret: String::new(),
            node_ip: None,
            timeout_secs: default_request_timeout_secs(),
            tls_skip_verify: false,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("secret", &"<redacted>")
            .field("node_ip", &self.node_ip)
            .field("timeout_secs", &self.timeout_secs)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .finish()
    }
}

/// Synchronization engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// TTL used for records that carry none (in seconds)
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Interval between change checks (in seconds)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Upper bound for a single backend call (in seconds)
    ///
    /// Must be shorter than the sync interval so that ticks never pile up.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the sync settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_ttl == 0 {
            return Err(crate::Error::config("Default TTL must be > 0"));
        }
        if self.sync_interval_secs == 0 {
            return Err(crate::Error::config("Sync interval must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if self.sync_interval_secs <= self.request_timeout_secs {
            return Err(crate::Error::config(format!(
                "Sync interval ({}s) must be greater than the request timeout ({}s)",
                self.sync_interval_secs, self.request_timeout_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            sync_interval_secs: default_sync_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Push/inspection/health listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Whether to start the listener
    #[serde(default)]
    pub enabled: bool,

    /// Socket address to bind (e.g. "0.0.0.0:8053")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_ttl() -> u32 {
    300
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_listen_addr() -> String {
    "0.0.0.0:8053".to_string()
}
