//! Record cache
//!
//! The in-memory store the query path reads from:
//! normalized domain → record type → pre-built resource records,
//! plus the version tag of the snapshot generation currently loaded.
//!
//! ## Locking
//!
//! One `parking_lot::RwLock` guards the whole [`CacheState`]. All record
//! building happens before the lock is taken; the write lock only covers
//! the in-memory swap (full replace) or the bucket mutations of one batch
//! (merge/delete). The lock is synchronous and is never held across an
//! `.await`.
//!
//! ## Buckets
//!
//! A domain holds at most one address bucket per type (A, AAAA) and one
//! indirection (CNAME) bucket. The indirection bucket remembers which
//! address kinds produced it. A write or delete of an owning kind clears
//! it, so a record that switches between addresses and failover never
//! leaves the other form behind, while the other address family is left
//! alone.

use chrono::{DateTime, Utc};
use hickory_proto::rr::{RData, Record, RecordType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::builder::{self, in_zone, normalize_domain};
use crate::error::{Error, Result};
use crate::record::{DeleteRecord, RawRecord, RecordKind};

type Buckets = HashMap<RecordType, Vec<Record>>;

/// One generation of cache content
#[derive(Debug, Default)]
struct CacheState {
    /// domain -> record type -> records
    records: HashMap<String, Buckets>,

    /// Version tag of the loaded snapshot ("" = never synchronized)
    version_tag: String,

    /// Last time the content changed
    updated_at: Option<DateTime<Utc>>,

    /// domain -> address kinds whose failover produced the CNAME bucket
    indirection_owners: HashMap<String, Vec<RecordKind>>,
}

impl CacheState {
    /// Replace the indirection of `domain`; `kind` becomes its only owner
    fn store_indirection(&mut self, domain: &str, kind: RecordKind, records: Vec<Record>) {
        let buckets = self.records.entry(domain.to_string()).or_default();
        buckets.remove(&kind.record_type());
        buckets.insert(RecordType::CNAME, records);
        self.indirection_owners.insert(domain.to_string(), vec![kind]);
    }

    /// Replace the `kind` address bucket of `domain`
    fn store_addresses(&mut self, domain: &str, kind: RecordKind, records: Vec<Record>) {
        self.remove_owned_indirection(domain, kind);
        self.records
            .entry(domain.to_string())
            .or_default()
            .insert(kind.record_type(), records);
    }

    /// Remove the `kind` address bucket and an indirection owned by `kind`
    fn remove_kind(&mut self, domain: &str, kind: RecordKind) -> bool {
        let removed_indirection = self.remove_owned_indirection(domain, kind);
        let removed_addresses = self
            .records
            .get_mut(domain)
            .is_some_and(|buckets| buckets.remove(&kind.record_type()).is_some());
        self.prune(domain);
        removed_indirection || removed_addresses
    }

    /// Remove the indirection bucket whatever its owner
    fn remove_indirection(&mut self, domain: &str) -> bool {
        self.indirection_owners.remove(domain);
        let removed = self
            .records
            .get_mut(domain)
            .is_some_and(|buckets| buckets.remove(&RecordType::CNAME).is_some());
        self.prune(domain);
        removed
    }

    fn remove_owned_indirection(&mut self, domain: &str, kind: RecordKind) -> bool {
        let owned = self
            .indirection_owners
            .get(domain)
            .is_some_and(|owners| owners.contains(&kind));
        owned && self.remove_indirection(domain)
    }

    /// Drop the domain entry once it has no buckets left
    fn prune(&mut self, domain: &str) {
        if self.records.get(domain).is_some_and(|buckets| buckets.is_empty()) {
            self.records.remove(domain);
            self.indirection_owners.remove(domain);
        }
    }
}

/// A raw record turned into its answer set, ready to be stored
struct Prepared {
    domain: String,
    kind: RecordKind,
    records: Vec<Record>,
}

impl Prepared {
    fn is_indirection(&self) -> bool {
        self.records
            .first()
            .is_some_and(|r| r.record_type() == RecordType::CNAME)
    }
}

/// Thread-safe record cache for one zone
#[derive(Debug, Clone)]
pub struct RecordCache {
    zone: String,
    inner: Arc<RwLock<CacheState>>,
}

impl RecordCache {
    /// Create an empty cache for the given zone
    pub fn new(zone: &str) -> Self {
        Self {
            zone: normalize_domain(zone),
            inner: Arc::new(RwLock::new(CacheState::default())),
        }
    }

    /// The zone this cache is authoritative for (normalized)
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Replace the whole cache with a snapshot generation
    ///
    /// The new mapping is built without holding the lock. Records that are
    /// out of zone or fail to build are logged and left out. Several records
    /// for the same domain and type are appended in input order.
    ///
    /// # Errors
    ///
    /// `InvalidSnapshot` if the version tag is empty. The cache is not
    /// touched in that case.
    pub fn replace_from_snapshot(
        &self,
        records: &[RawRecord],
        version_tag: &str,
        default_ttl: u32,
    ) -> Result<()> {
        if version_tag.trim().is_empty() {
            return Err(Error::invalid_snapshot("snapshot has no version tag"));
        }

        let mut mapping: HashMap<String, Buckets> = HashMap::new();
        let mut owners: HashMap<String, Vec<RecordKind>> = HashMap::new();
        let mut skipped = 0usize;

        for raw in records {
            let Some(prepared) = self.prepare(raw, default_ttl) else {
                skipped += 1;
                continue;
            };

            if prepared.is_indirection() {
                let kinds = owners.entry(prepared.domain.clone()).or_default();
                if !kinds.contains(&prepared.kind) {
                    kinds.push(prepared.kind);
                }
            }

            let buckets = mapping.entry(prepared.domain).or_default();
            for record in prepared.records {
                buckets.entry(record.record_type()).or_default().push(record);
            }
        }

        mapping.retain(|_, buckets| !buckets.is_empty());

        let domains = mapping.len();
        {
            let mut guard = self.inner.write();
            *guard = CacheState {
                records: mapping,
                version_tag: version_tag.to_string(),
                updated_at: Some(Utc::now()),
                indirection_owners: owners,
            };
        }

        info!(
            zone = %self.zone,
            version = %version_tag,
            domains,
            skipped,
            "cache replaced from snapshot"
        );

        Ok(())
    }

    /// Merge records into the cache without changing the version tag
    ///
    /// Each record replaces the bucket it owns (see the module docs).
    /// Records that are out of zone, fail to build or build to nothing are
    /// logged and skipped; the cache keeps what it had for them.
    ///
    /// # Returns
    ///
    /// The number of records applied.
    pub fn merge_updates(&self, records: &[RawRecord], default_ttl: u32) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let prepared: Vec<Prepared> = records
            .iter()
            .filter_map(|raw| self.prepare(raw, default_ttl))
            .filter(|prepared| {
                if prepared.records.is_empty() {
                    debug!(domain = %prepared.domain, kind = %prepared.kind, "update builds no records, skipping");
                }
                !prepared.records.is_empty()
            })
            .collect();

        let applied = prepared.len();
        let mut guard = self.inner.write();

        for prepared in prepared {
            let indirection = prepared.is_indirection();
            let Prepared {
                domain,
                kind,
                records,
            } = prepared;

            if indirection {
                guard.store_indirection(&domain, kind, records);
                debug!(domain = %domain, kind = %kind, "failover indirection stored");
            } else {
                guard.store_addresses(&domain, kind, records);
                debug!(domain = %domain, kind = %kind, "address records stored");
            }
        }

        guard.updated_at = Some(Utc::now());
        drop(guard);

        debug!(zone = %self.zone, applied, "merged updates");
        Ok(applied)
    }

    /// Remove records from the cache without changing the version tag
    ///
    /// An `A`/`AAAA` deletion removes that bucket, plus the domain's
    /// indirection when that kind owns it; a `CNAME` deletion removes only
    /// the indirection. Missing entries are ignored, unsupported types are
    /// logged.
    ///
    /// # Returns
    ///
    /// How many deletions actually removed something.
    pub fn delete_records(&self, deletions: &[DeleteRecord]) -> Result<usize> {
        if deletions.is_empty() {
            return Ok(0);
        }

        let mut removed = 0usize;
        let mut guard = self.inner.write();

        for deletion in deletions {
            let domain = normalize_domain(&deletion.name);

            let hit = match deletion.record_type.trim().to_ascii_uppercase().as_str() {
                "A" => guard.remove_kind(&domain, RecordKind::A),
                "AAAA" => guard.remove_kind(&domain, RecordKind::Aaaa),
                "CNAME" => guard.remove_indirection(&domain),
                other => {
                    warn!(name = %deletion.name, record_type = %other, "unsupported record type for deletion, skipping");
                    continue;
                }
            };

            if hit {
                debug!(domain = %domain, record_type = %deletion.record_type, "record deleted");
                removed += 1;
            }
        }

        guard.updated_at = Some(Utc::now());
        Ok(removed)
    }

    /// Look up the records stored for a name and type
    ///
    /// The name is normalized before lookup. Returns a copy of the bucket.
    pub fn lookup(&self, name: &str, record_type: RecordType) -> Option<Vec<Record>> {
        let domain = normalize_domain(name);
        let guard = self.inner.read();
        guard
            .records
            .get(&domain)
            .and_then(|buckets| buckets.get(&record_type))
            .filter(|records| !records.is_empty())
            .cloned()
    }

    /// Version tag of the loaded generation ("" before the first full sync)
    pub fn version_tag(&self) -> String {
        self.inner.read().version_tag.clone()
    }

    /// Number of domains with at least one bucket
    pub fn domain_count(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Total number of resource records across all buckets
    pub fn record_count(&self) -> usize {
        self.inner
            .read()
            .records
            .values()
            .flat_map(|buckets| buckets.values())
            .map(Vec::len)
            .sum()
    }

    /// When the content last changed
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().updated_at
    }

    /// Flat projection of every bucket, sorted by name then type
    ///
    /// Names lose their trailing dot. Indirection buckets are projected as
    /// type `CNAME` with the target in `failover`.
    pub fn all_records(&self) -> Vec<RawRecord> {
        let mut flat = {
            let guard = self.inner.read();
            guard
                .records
                .iter()
                .flat_map(|(domain, buckets)| {
                    buckets
                        .iter()
                        .filter(|(_, records)| !records.is_empty())
                        .map(move |(record_type, records)| project(domain, *record_type, records))
                })
                .collect::<Vec<_>>()
        };

        flat.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.record_type.cmp(&b.record_type))
        });
        flat
    }

    fn prepare(&self, raw: &RawRecord, default_ttl: u32) -> Option<Prepared> {
        let domain = normalize_domain(&raw.name);

        if !in_zone(&domain, &self.zone) {
            warn!(name = %raw.name, zone = %self.zone, "record outside zone, skipping");
            return None;
        }

        let kind = match raw.kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(name = %raw.name, error = %e, "skipping record");
                return None;
            }
        };

        match builder::build(raw, default_ttl) {
            Ok(records) => Some(Prepared {
                domain,
                kind,
                records,
            }),
            Err(e) => {
                warn!(name = %raw.name, error = %e, "failed to build records, skipping");
                None
            }
        }
    }
}

fn project(domain: &str, record_type: RecordType, records: &[Record]) -> RawRecord {
    let name = domain.trim_end_matches('.').to_string();
    let ttl = records.first().map(Record::ttl).unwrap_or_default();

    let mut ips = Vec::new();
    let mut failover = String::new();
    for record in records {
        match record.data() {
            RData::A(a) => ips.push(a.0.to_string()),
            RData::AAAA(aaaa) => ips.push(aaaa.0.to_string()),
            RData::CNAME(target) => {
                failover = target.0.to_ascii().trim_end_matches('.').to_string();
            }
            _ => {}
        }
    }

    RawRecord {
        name,
        record_type: record_type.to_string(),
        ttl,
        ips,
        enabled: true,
        failover,
    }
}
