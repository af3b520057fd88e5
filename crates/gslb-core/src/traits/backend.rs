// # Backend Trait
//
// Defines the interface to the remote authority that owns the zone's records.
//
// ## Implementations
//
// - HTTP control channel: `gslb-backend-http` crate
//
// ## Usage
//
// ```rust,ignore
// use gslb_core::{Backend, ChangeCheck};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* Backend implementation */;
//
//     let snapshot = backend.fetch_snapshot("gslb.example.").await?;
//     match backend.check_changes("gslb.example.", &snapshot.version_tag).await? {
//         ChangeCheck::Unchanged => {}
//         ChangeCheck::Changed(next) => println!("new version {}", next.version_tag),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::RawRecord;

/// A full generation of the zone's records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Zone the snapshot belongs to
    pub zone: String,

    /// Opaque tag identifying this generation
    #[serde(rename = "version_hash")]
    pub version_tag: String,

    /// Every record of the zone
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

impl Snapshot {
    pub fn new(zone: impl Into<String>, version_tag: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            zone: zone.into(),
            version_tag: version_tag.into(),
            records,
        }
    }
}

/// Result of asking the backend whether the zone changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCheck {
    /// The given version tag is still current
    Unchanged,
    /// A newer generation exists; always the full record list, never a diff
    Changed(Snapshot),
}

/// Trait for remote authority implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Backends perform exactly one request per call and return the outcome.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to their endpoint only
/// - ✅ Parse backend-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry or back off (the next tick is the retry)
/// - ❌ Touch the record cache or sync status (owned by `SyncEngine`)
/// - ❌ Cache responses between calls
///
/// The engine wraps every call in its own request timeout, so a backend
/// that hangs is reported as unavailable rather than stalling the loop.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch the full record set of a zone
    ///
    /// Idempotent. The returned snapshot must carry a non-empty zone and
    /// version tag.
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone name (fully qualified)
    async fn fetch_snapshot(&self, zone: &str) -> Result<Snapshot, crate::Error>;

    /// Ask whether the zone changed since a version tag
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone name (fully qualified)
    /// - `since`: The version tag currently loaded
    ///
    /// # Returns
    ///
    /// - `Ok(ChangeCheck::Unchanged)`: `since` is still current
    /// - `Ok(ChangeCheck::Changed(snapshot))`: the full new generation
    /// - `Err(Error)`: the request failed
    async fn check_changes(&self, zone: &str, since: &str) -> Result<ChangeCheck, crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}
