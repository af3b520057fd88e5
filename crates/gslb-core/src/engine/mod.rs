//! Synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Loading the zone from the remote authority at startup
//! - Polling for changes on a fixed interval, gated by the version tag
//! - Applying push notifications (partial merge and deletion)
//! - Recording every sync outcome in the [`SyncStatus`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Backend   │◄── fetch_snapshot / check_changes ──┐
//! └─────────────┘                                      │
//!                                             ┌──────────────┐
//!            push notifications ─────────────►│  SyncEngine  │
//!                                             └──────────────┘
//!                                                      │
//!         ┌────────────────────────────┬───────────────┴───────────┐
//!         │                            │                           │
//!         ▼                            ▼                           ▼
//! ┌─────────────┐             ┌──────────────┐            ┌─────────────┐
//! │ RecordCache │             │  SyncStatus  │            │   Events    │
//! │ (replace /  │             │  (outcome)   │            │  (notify)   │
//! │  merge)     │             └──────────────┘            └─────────────┘
//! └─────────────┘
//!        ▲
//!        │ lookups
//! ┌─────────────┐
//! │  Resolver   │
//! └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. No version tag loaded yet → full snapshot fetch
//! 2. Otherwise ask the backend for changes since the loaded tag
//! 3. `Unchanged` → record success, leave the cache alone
//! 4. `Changed` → replace the cache with the new generation
//! 5. Any failure → record failure, keep serving the last generation
//!
//! The engine never retries on its own; the next tick is the retry.

use chrono::{DateTime, Utc};
use hickory_proto::rr::RecordType;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::cache::RecordCache;
use crate::config::GslbConfig;
use crate::error::{Error, Result};
use crate::record::{DeleteRecord, RawRecord};
use crate::resolver::Resolver;
use crate::status::{SyncState, SyncStatus};
use crate::traits::{Backend, ChangeCheck, Snapshot};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Sync loop started
    Started {
        zone: String,
    },

    /// A full generation was loaded into the cache
    SnapshotLoaded {
        version_tag: String,
        domains: usize,
    },

    /// The backend reported no change since the loaded tag
    Unchanged {
        version_tag: String,
    },

    /// A sync attempt failed; the cache was left untouched
    SyncFailed {
        error: String,
    },

    /// A push notification was applied
    PushApplied {
        updated: usize,
        deleted: usize,
    },

    /// Sync loop stopped
    Stopped {
        reason: String,
    },
}

/// Outcome of a single sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new generation was loaded
    Loaded {
        version_tag: String,
    },
    /// The loaded generation is still current
    Unchanged,
    /// The attempt failed and was recorded in the sync status
    Failed,
}

/// Partial update pushed by the remote authority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    /// Records to merge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RawRecord>,

    /// Records to delete (applied after the merge)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletes: Vec<DeleteRecord>,
}

/// Counts reported back for a push notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub updated: usize,
    pub deleted: usize,
}

/// Filter for [`SyncEngine::inspect`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
    /// Keep records whose name contains this substring
    #[serde(default)]
    pub name: Option<String>,

    /// Keep records of this type (case-insensitive)
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
}

impl RecordFilter {
    fn matches(&self, record: &RawRecord) -> bool {
        let name_ok = match self.name.as_deref() {
            Some(name) if !name.is_empty() => record.name.contains(name),
            _ => true,
        };
        let type_ok = match self.record_type.as_deref() {
            Some(t) if !t.is_empty() => record.record_type.eq_ignore_ascii_case(t.trim()),
            _ => true,
        };
        name_ok && type_ok
    }
}

/// Flat view of the cache content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub zone: String,
    pub version_hash: String,
    pub domain_count: usize,
    pub count: usize,
    pub records: Vec<RawRecord>,
}

/// Raw health data; classification is left to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub zone: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_status: SyncState,
    pub last_error: String,
    pub domain_count: usize,
    pub record_count: usize,
    pub version_hash: String,
    #[serde(skip)]
    pub sync_interval: Duration,
}

/// Zone synchronization engine
///
/// The engine owns the record cache and the sync status. It drives both
/// from the backend and from push notifications, and hands out cheap
/// clones of the cache (or a [`Resolver`]) to the query path.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Load the zone with [`SyncEngine::initial_sync()`]
/// 3. Start the poll loop with [`SyncEngine::run()`]
/// 4. Loop runs until a shutdown signal is received
///
/// ## Failure Handling
///
/// No sync-path error escapes the engine. Failures end up in the sync
/// status and as [`SyncEvent::SyncFailed`]; the cache keeps serving the
/// last generation it loaded.
pub struct SyncEngine {
    /// Remote authority
    backend: Box<dyn Backend>,

    /// Records served to the query path
    cache: RecordCache,

    /// Outcome of the last sync attempt
    status: SyncStatus,

    /// Normalized zone name
    zone: String,

    /// TTL for records that carry none
    default_ttl: u32,

    /// Time between change checks
    sync_interval: Duration,

    /// Upper bound for each backend call
    request_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `backend`: Remote authority implementation
    /// - `config`: GSLB configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        backend: Box<dyn Backend>,
        config: GslbConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.sync.event_channel_capacity);
        let zone = config.normalized_zone();

        let engine = Self {
            backend,
            cache: RecordCache::new(&zone),
            status: SyncStatus::new(),
            zone,
            default_ttl: config.sync.default_ttl,
            sync_interval: config.sync.sync_interval(),
            request_timeout: config.sync.request_timeout(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Record cache handle (shares state with the engine)
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Sync status handle (shares state with the engine)
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Resolver over this engine's cache
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.cache.clone())
    }

    /// Normalized zone name
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Configured interval between change checks
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Load the whole zone from the backend
    ///
    /// Called once at startup. On failure the cache stays empty, the
    /// failure is recorded and queries are misses until a tick succeeds.
    pub async fn initial_sync(&self) -> SyncOutcome {
        info!(zone = %self.zone, backend = self.backend.backend_name(), "initial sync");
        self.full_sync().await
    }

    /// Perform one poll cycle
    pub async fn sync_once(&self) -> SyncOutcome {
        let current = self.cache.version_tag();
        if current.is_empty() {
            debug!("no generation loaded yet, fetching full snapshot");
            return self.full_sync().await;
        }

        match self.call(self.backend.check_changes(&self.zone, &current)).await {
            Ok(ChangeCheck::Unchanged) => {
                debug!(version = %current, "zone unchanged");
                self.status.record_success();
                self.emit_event(SyncEvent::Unchanged {
                    version_tag: current,
                });
                SyncOutcome::Unchanged
            }
            Ok(ChangeCheck::Changed(snapshot)) => self.load(snapshot),
            Err(e) => self.fail(e),
        }
    }

    /// Run the poll loop
    ///
    /// Runs until Ctrl-C is received. The first tick fires one interval
    /// after the loop starts.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the poll loop until the given signal fires
    ///
    /// Used by the daemon (which owns OS signal handling) and by tests.
    /// Passing `None` behaves like [`SyncEngine::run()`]. A dropped sender
    /// also stops the loop.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(SyncEvent::Started {
            zone: self.zone.clone(),
        });

        let mut interval =
            tokio::time::interval_at(Instant::now() + self.sync_interval, self.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        info!(zone = %self.zone, interval = ?self.sync_interval, "sync loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SyncEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    let outcome = self.sync_once().await;
                    debug!(?outcome, "sync tick finished");
                }
            }
        }

        info!("sync loop stopped");
        Ok(())
    }

    /// Apply a push notification: merge the records, then the deletions
    ///
    /// Leaves the version tag and the sync status untouched.
    pub fn apply_push(&self, notification: &PushNotification) -> Result<PushOutcome> {
        let updated = self.cache.merge_updates(&notification.records, self.default_ttl)?;
        let deleted = self.cache.delete_records(&notification.deletes)?;

        info!(updated, deleted, "push notification applied");
        self.emit_event(SyncEvent::PushApplied { updated, deleted });

        Ok(PushOutcome { updated, deleted })
    }

    /// Flat view of the cache, filtered
    pub fn inspect(&self, filter: &RecordFilter) -> Inventory {
        let records: Vec<RawRecord> = self
            .cache
            .all_records()
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();

        Inventory {
            zone: self.zone.clone(),
            version_hash: self.cache.version_tag(),
            domain_count: self.cache.domain_count(),
            count: records.len(),
            records,
        }
    }

    /// Current sync status and cache counters
    pub fn health(&self) -> HealthReport {
        let status = self.status.get();

        HealthReport {
            zone: self.zone.clone(),
            last_sync: status.last_sync,
            last_sync_status: status.last_sync_status,
            last_error: status.last_error,
            domain_count: self.cache.domain_count(),
            record_count: self.cache.record_count(),
            version_hash: self.cache.version_tag(),
            sync_interval: self.sync_interval,
        }
    }

    /// Answer a query directly (convenience over [`SyncEngine::resolver()`])
    pub fn resolve(&self, name: &str, query_type: RecordType) -> crate::resolver::Answer {
        self.resolver().resolve(name, query_type)
    }

    async fn full_sync(&self) -> SyncOutcome {
        match self.call(self.backend.fetch_snapshot(&self.zone)).await {
            Ok(snapshot) => self.load(snapshot),
            Err(e) => self.fail(e),
        }
    }

    fn load(&self, snapshot: Snapshot) -> SyncOutcome {
        if let Err(e) =
            self.cache
                .replace_from_snapshot(&snapshot.records, &snapshot.version_tag, self.default_ttl)
        {
            return self.fail(e);
        }

        let domains = self.cache.domain_count();
        info!(
            version = %snapshot.version_tag,
            records = snapshot.records.len(),
            domains,
            "loaded zone snapshot"
        );

        self.status.record_success();
        self.emit_event(SyncEvent::SnapshotLoaded {
            version_tag: snapshot.version_tag.clone(),
            domains,
        });

        SyncOutcome::Loaded {
            version_tag: snapshot.version_tag,
        }
    }

    fn fail(&self, error: Error) -> SyncOutcome {
        warn!(
            zone = %self.zone,
            backend = self.backend.backend_name(),
            error = %error,
            "sync failed, serving last known records"
        );

        self.status.record_failure(&error);
        self.emit_event(SyncEvent::SyncFailed {
            error: error.to_string(),
        });

        SyncOutcome::Failed
    }

    /// Bound a backend call by the request timeout
    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(Error::backend_unavailable(format!(
                "{} request timed out after {:?}",
                self.backend.backend_name(),
                self.request_timeout
            ))),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
