// # gslb-core
//
// Record cache and synchronization engine for a GSLB zone server.
//
// ## Architecture Overview
//
// This library answers name/type lookups for one delegated zone from memory
// and keeps that memory in step with a remote authority:
// - **Backend**: Trait for fetching snapshots and change checks
// - **builder**: Turns backend records into ready-to-serve resource records
// - **RecordCache**: Concurrent store with atomic replace and partial merge
// - **SyncStatus**: Outcome of the most recent sync attempt
// - **SyncEngine**: Startup load, hash-gated polling and push updates
// - **Resolver**: Query classification with failover precedence
//
// ## Design Principles
//
// 1. **Serve from memory**: The query path never touches the backend
// 2. **Whole generations**: A full sync replaces the cache in one swap
// 3. **Stale over empty**: Backend failures keep the last good generation
// 4. **Library-First**: All core functionality can be used as a library

pub mod builder;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod resolver;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use cache::RecordCache;
pub use config::{BackendConfig, GslbConfig, SyncConfig, WebhookConfig};
pub use engine::{
    HealthReport, Inventory, PushNotification, PushOutcome, RecordFilter, SyncEngine, SyncEvent,
    SyncOutcome,
};
pub use error::{Error, Result};
pub use record::{DeleteRecord, RawRecord, RecordKind};
pub use resolver::{Answer, Resolver};
pub use status::{SyncState, SyncStatus, SyncStatusSnapshot};
pub use traits::{Backend, ChangeCheck, Snapshot};
