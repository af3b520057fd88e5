//! Sync status tracking
//!
//! Records the outcome of the most recent synchronization attempt. Guarded
//! by its own lock, independent of the record cache.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Outcome of the most recent sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No attempt has completed yet
    Initial,
    /// Last attempt succeeded (including "unchanged")
    Success,
    /// Last attempt failed
    Failed,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::Initial => "initial",
            SyncState::Success => "success",
            SyncState::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the sync status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusSnapshot {
    /// When the last attempt finished (None before the first attempt)
    pub last_sync: Option<DateTime<Utc>>,

    /// Outcome of the last attempt
    pub last_sync_status: SyncState,

    /// Error of the last attempt, empty unless it failed
    pub last_error: String,
}

impl Default for SyncStatusSnapshot {
    fn default() -> Self {
        Self {
            last_sync: None,
            last_sync_status: SyncState::Initial,
            last_error: String::new(),
        }
    }
}

/// Thread-safe sync status holder
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    inner: Arc<RwLock<SyncStatusSnapshot>>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite time, state and error together
    ///
    /// The error is only kept when `state` is [`SyncState::Failed`].
    pub fn update(&self, state: SyncState, error: impl Into<String>) {
        let last_error = match state {
            SyncState::Failed => error.into(),
            _ => String::new(),
        };

        *self.inner.write() = SyncStatusSnapshot {
            last_sync: Some(Utc::now()),
            last_sync_status: state,
            last_error,
        };
    }

    pub fn record_success(&self) {
        self.update(SyncState::Success, "");
    }

    pub fn record_failure(&self, error: impl fmt::Display) {
        self.update(SyncState::Failed, error.to_string());
    }

    pub fn get(&self) -> SyncStatusSnapshot {
        self.inner.read().clone()
    }
}
