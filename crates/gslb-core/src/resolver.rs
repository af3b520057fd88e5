//! Answer resolver
//!
//! Classifies a query against the record cache. A/AAAA queries check the
//! failover indirection first, so a name that has been failed over never
//! leaks its address records.

use hickory_proto::rr::{Record, RecordType};

use crate::cache::RecordCache;

/// Outcome of resolving a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Records to return, in stored order
    Hit(Vec<Record>),
    /// The type is served here but nothing is stored for the name
    Miss,
    /// The type is not served here; hand the query to the next handler
    Unsupported,
}

impl Answer {
    pub fn is_hit(&self) -> bool {
        matches!(self, Answer::Hit(_))
    }
}

/// Read-side view of the record cache
#[derive(Debug, Clone)]
pub struct Resolver {
    cache: RecordCache,
}

impl Resolver {
    pub fn new(cache: RecordCache) -> Self {
        Self { cache }
    }

    /// Resolve a query name and type
    pub fn resolve(&self, name: &str, query_type: RecordType) -> Answer {
        let found = match query_type {
            RecordType::A | RecordType::AAAA => self
                .cache
                .lookup(name, RecordType::CNAME)
                .or_else(|| self.cache.lookup(name, query_type)),
            RecordType::CNAME => self.cache.lookup(name, RecordType::CNAME),
            _ => return Answer::Unsupported,
        };

        match found {
            Some(records) => Answer::Hit(records),
            None => Answer::Miss,
        }
    }
}
