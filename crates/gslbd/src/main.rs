// # gslbd - GSLB Zone Server Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add record, cache or sync logic here (it lives in gslb-core)
// - Configuration is via environment variables ONLY
//
// The gslbd daemon is responsible for:
// 1. Reading and validating configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the HTTP backend and the sync engine
// 4. Running the initial sync, the sync loop and the webhook listener
// 5. Shutting everything down on SIGTERM / SIGINT
//
// ## Configuration
//
// ### Zone and backend
// - `GSLB_ZONE`: Zone this node answers for (required)
// - `GSLB_ENDPOINT`: Base URL of the control channel (required)
// - `GSLB_SECRET`: Shared secret, at least 8 characters (required)
// - `GSLB_NODE_IP`: Address reported to the backend (optional)
// - `GSLB_TLS_SKIP_VERIFY`: Accept invalid TLS certificates (default: false)
//
// ### Sync
// - `GSLB_TTL`: Default TTL for records without one (default: 300)
// - `GSLB_SYNC_INTERVAL`: Seconds between syncs, at least 60 (default: 300)
// - `GSLB_TIMEOUT`: Per-request timeout in seconds (default: 10)
//
// ### Webhook
// - `GSLB_WEBHOOK_ENABLED`: Start the push/inspection/health listener (default: false)
// - `GSLB_WEBHOOK_ADDR`: Listen address (default: 0.0.0.0:8053)
//
// ### Logging
// - `GSLB_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export GSLB_ZONE=gslb.example.com
// export GSLB_ENDPOINT=https://controller.internal:8443
// export GSLB_SECRET=s3cr3t-from-controller
// export GSLB_WEBHOOK_ENABLED=true
//
// gslbd
// ```

use anyhow::{Context, Result};
use gslb_backend_http::HttpBackend;
use gslb_core::{GslbConfig, SyncEngine, SyncEvent, SyncOutcome};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for the sync loop and the listener to stop after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum GslbExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<GslbExitCode> for ExitCode {
    fn from(code: GslbExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    zone: String,
    endpoint: String,
    secret: String,
    node_ip: Option<String>,
    tls_skip_verify: bool,
    ttl: u32,
    sync_interval_secs: u64,
    timeout_secs: u64,
    webhook_enabled: bool,
    webhook_addr: String,
    log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("zone", &self.zone)
            .field("endpoint", &self.endpoint)
            .field("secret", &"<REDACTED>")
            .field("node_ip", &self.node_ip)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .field("ttl", &self.ttl)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("webhook_enabled", &self.webhook_enabled)
            .field("webhook_addr", &self.webhook_addr)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            zone: get("GSLB_ZONE").unwrap_or_default(),
            endpoint: get("GSLB_ENDPOINT").unwrap_or_default(),
            secret: get("GSLB_SECRET").unwrap_or_default(),
            node_ip: get("GSLB_NODE_IP"),
            tls_skip_verify: parse_bool("GSLB_TLS_SKIP_VERIFY", get("GSLB_TLS_SKIP_VERIFY"))?,
            ttl: parse_or("GSLB_TTL", get("GSLB_TTL"), 300)?,
            sync_interval_secs: parse_or("GSLB_SYNC_INTERVAL", get("GSLB_SYNC_INTERVAL"), 300)?,
            timeout_secs: parse_or("GSLB_TIMEOUT", get("GSLB_TIMEOUT"), 10)?,
            webhook_enabled: parse_bool("GSLB_WEBHOOK_ENABLED", get("GSLB_WEBHOOK_ENABLED"))?,
            webhook_addr: get("GSLB_WEBHOOK_ADDR").unwrap_or_else(|| "0.0.0.0:8053".to_string()),
            log_level: get("GSLB_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Covers required fields, secret strength, numeric ranges and the log
    /// level. Structural checks shared with the library run again in
    /// [`GslbConfig::validate`].
    fn validate(&self) -> Result<()> {
        if self.zone.is_empty() {
            anyhow::bail!(
                "GSLB_ZONE is required. \
                Set it via: export GSLB_ZONE=gslb.example.com"
            );
        }
        validate_domain_name(self.zone.trim_end_matches('.'))
            .with_context(|| format!("GSLB_ZONE '{}' is not a valid zone", self.zone))?;

        if self.endpoint.is_empty() {
            anyhow::bail!(
                "GSLB_ENDPOINT is required. \
                Set it via: export GSLB_ENDPOINT=https://controller:8443"
            );
        }
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            anyhow::bail!(
                "GSLB_ENDPOINT must use HTTP or HTTPS scheme. Got: {}",
                self.endpoint
            );
        }
        if self.endpoint.starts_with("http://") {
            eprintln!(
                "WARNING: GSLB_ENDPOINT uses HTTP (not HTTPS). \
                      The shared secret is sent in clear text."
            );
        }

        if self.secret.is_empty() {
            anyhow::bail!(
                "GSLB_SECRET is required. \
                Set it via: export GSLB_SECRET=your_shared_secret"
            );
        }
        if self.secret.len() < 8 {
            anyhow::bail!(
                "GSLB_SECRET is too short ({} chars, minimum 8)",
                self.secret.len()
            );
        }
        let secret_lower = self.secret.to_lowercase();
        if secret_lower.contains("your_shared_secret")
            || secret_lower.contains("replace_me")
            || secret_lower == "changeme"
        {
            anyhow::bail!(
                "GSLB_SECRET appears to be a placeholder. \
                Use the secret configured on the controller."
            );
        }

        if self.ttl == 0 {
            anyhow::bail!("GSLB_TTL must be greater than 0");
        }

        if self.sync_interval_secs < 60 {
            anyhow::bail!(
                "GSLB_SYNC_INTERVAL must be at least 60 seconds. Got: {}",
                self.sync_interval_secs
            );
        }

        if self.timeout_secs < 1 {
            anyhow::bail!("GSLB_TIMEOUT must be at least 1 second");
        }

        if self.sync_interval_secs <= self.timeout_secs {
            anyhow::bail!(
                "GSLB_SYNC_INTERVAL ({}) must be greater than GSLB_TIMEOUT ({})",
                self.sync_interval_secs,
                self.timeout_secs
            );
        }

        if self.webhook_enabled && self.webhook_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!(
                "GSLB_WEBHOOK_ADDR '{}' is not a valid socket address",
                self.webhook_addr
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GSLB_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Library configuration for the engine and the backend
    fn to_gslb_config(&self) -> GslbConfig {
        let mut config = GslbConfig::new(self.zone.clone());

        config.backend.endpoint = self.endpoint.clone();
        config.backend.secret = self.secret.clone();
        config.backend.node_ip = self.node_ip.clone();
        config.backend.timeout_secs = self.timeout_secs;
        config.backend.tls_skip_verify = self.tls_skip_verify;

        config.sync.default_ttl = self.ttl;
        config.sync.sync_interval_secs = self.sync_interval_secs;
        config.sync.request_timeout_secs = self.timeout_secs;

        config.webhook.enabled = self.webhook_enabled;
        config.webhook.listen_addr = self.webhook_addr.clone();

        config
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, raw, e)),
    }
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} '{}' is not a valid boolean", key, other),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common mistakes, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return GslbExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return GslbExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GslbExitCode::ConfigError.into();
    }

    info!("Starting gslbd daemon");
    debug!(?config, "configuration loaded");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GslbExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => GslbExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                GslbExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                GslbExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failure phase, mapped to an exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let gslb_config = config.to_gslb_config();

    let backend = HttpBackend::from_config(&gslb_config.backend)
        .context("Failed to create HTTP backend")
        .map_err(DaemonError::Startup)?;
    info!(endpoint = %backend.endpoint(), "HTTP backend configured");

    let (engine, events) = SyncEngine::new(Box::new(backend), gslb_config)
        .context("Failed to create sync engine")
        .map_err(DaemonError::Startup)?;
    let engine = Arc::new(engine);

    let event_logger = tokio::spawn(log_events(events));

    // A failed initial sync is not fatal: the loop keeps retrying
    match engine.initial_sync().await {
        SyncOutcome::Loaded { version_tag } => {
            info!(version = %version_tag, "initial sync complete");
        }
        SyncOutcome::Failed => {
            warn!("initial sync failed, serving no records until the next successful sync");
        }
        SyncOutcome::Unchanged => {}
    }

    let (sync_tx, sync_rx) = oneshot::channel();
    let sync_handle = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run_with_shutdown(Some(sync_rx)).await })
    };

    #[cfg(feature = "webhook")]
    let webhook = if config.webhook_enabled {
        let listener = tokio::net::TcpListener::bind(&config.webhook_addr)
            .await
            .with_context(|| format!("Failed to bind webhook listener on {}", config.webhook_addr))
            .map_err(DaemonError::Startup)?;

        let (webhook_tx, webhook_rx) = oneshot::channel();
        let state = gslb_webhook::WebhookState::new(Arc::clone(&engine), config.secret.as_str());
        let handle = tokio::spawn(gslb_webhook::serve(listener, state, webhook_rx));
        Some((webhook_tx, handle))
    } else {
        None
    };

    #[cfg(not(feature = "webhook"))]
    if config.webhook_enabled {
        warn!("GSLB_WEBHOOK_ENABLED is set but gslbd was built without the webhook feature");
    }

    info!(zone = %engine.zone(), "Daemon initialized successfully");

    let signal = wait_for_shutdown()
        .await
        .map_err(DaemonError::Runtime)?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    let _ = sync_tx.send(());

    #[cfg(feature = "webhook")]
    if let Some((webhook_tx, handle)) = webhook {
        let _ = webhook_tx.send(());
        match join_or_abort(handle, SHUTDOWN_TIMEOUT).await {
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(e))) => warn!("Webhook listener stopped with error: {}", e),
            Some(Err(e)) => warn!("Webhook listener task failed: {}", e),
            None => warn!("Webhook listener did not stop within {:?}, aborted", SHUTDOWN_TIMEOUT),
        }
    }

    let sync_result = join_or_abort(sync_handle, SHUTDOWN_TIMEOUT)
        .await
        .ok_or_else(|| anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))
        .map_err(DaemonError::Runtime)?;

    match sync_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(DaemonError::Runtime(e.into())),
        Err(e) => {
            return Err(DaemonError::Runtime(anyhow::anyhow!(
                "Sync loop task failed: {}",
                e
            )));
        }
    }

    // The engine owns the event sender; once it is gone the logger drains and exits
    drop(engine);
    if join_or_abort(event_logger, SHUTDOWN_TIMEOUT).await.is_none() {
        warn!("Event logger did not stop within {:?}, aborted", SHUTDOWN_TIMEOUT);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for a task to finish, aborting it once `timeout` has passed
///
/// Returns `None` when the task was aborted. An aborted task has been
/// dropped by the time this returns, together with everything it held.
async fn join_or_abort<T>(mut handle: JoinHandle<T>, timeout: Duration) -> Option<Result<T, JoinError>> {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(result) => Some(result),
        Err(_) => {
            handle.abort();
            let _ = handle.await;
            None
        }
    }
}

/// Log engine events until the engine is dropped
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::SyncFailed { error } => warn!(%error, "sync failed"),
            SyncEvent::SnapshotLoaded {
                version_tag,
                domains,
            } => info!(version = %version_tag, domains, "generation loaded"),
            other => debug!(event = ?other, "engine event"),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
