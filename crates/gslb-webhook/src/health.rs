//! Health classification
//!
//! A node is `degraded` when its last sync attempt failed and that attempt
//! is older than two sync intervals. A single failed tick stays `healthy`:
//! the cache still serves the previous generation and the next tick retries.

use chrono::{DateTime, TimeDelta, Utc};
use gslb_core::{HealthReport, SyncState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn is_degraded(self) -> bool {
        self == HealthStatus::Degraded
    }
}

/// Classify a health report as of `now`
pub fn classify(report: &HealthReport, now: DateTime<Utc>) -> HealthStatus {
    if report.last_sync_status != SyncState::Failed {
        return HealthStatus::Healthy;
    }

    let Some(last_sync) = report.last_sync else {
        return HealthStatus::Healthy;
    };

    let Ok(grace) = TimeDelta::from_std(report.sync_interval * 2) else {
        return HealthStatus::Healthy;
    };

    if now.signed_duration_since(last_sync) > grace {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
