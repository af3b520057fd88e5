use crate::errors::ApiError;
use crate::health::{HealthStatus, classify};
use crate::state::WebhookState;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use gslb_core::{Inventory, PushNotification, RawRecord, RecordFilter, SyncState};
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: &'static str,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub zone: String,
    pub version_hash: String,
    pub count: usize,
    pub records: Vec<RawRecord>,
}

impl From<Inventory> for RecordsResponse {
    fn from(inventory: Inventory) -> Self {
        Self {
            zone: inventory.zone,
            version_hash: inventory.version_hash,
            count: inventory.count,
            records: inventory.records,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub zone: String,
    pub records_count: usize,
    pub version_hash: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_status: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Apply a push notification to the cache
#[instrument(skip_all)]
pub async fn notify(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, ApiError> {
    let notification: PushNotification = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid notification body: {}", e)))?;

    debug!(
        records = notification.records.len(),
        deletes = notification.deletes.len(),
        "push notification received"
    );

    let outcome = state.engine.apply_push(&notification)?;

    Ok(Json(NotifyResponse {
        status: "ok",
        updated: outcome.updated,
        deleted: outcome.deleted,
    }))
}

#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<WebhookState>,
    Query(filter): Query<RecordFilter>,
) -> Json<RecordsResponse> {
    Json(state.engine.inspect(&filter).into())
}

pub async fn health(State(state): State<WebhookState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.engine.health();
    let status = classify(&report, Utc::now());

    let code = if status.is_degraded() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let error = status.is_degraded().then(|| report.last_error.clone());

    (
        code,
        Json(HealthResponse {
            status,
            zone: report.zone,
            records_count: report.domain_count,
            version_hash: report.version_hash,
            last_sync: report.last_sync,
            last_sync_status: report.last_sync_status,
            error,
        }),
    )
}
