//! Backend record descriptions
//!
//! These are the wire shapes the remote authority speaks. They are turned
//! into ready-to-serve resource records by [`crate::builder`].

use hickory_proto::rr::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Address record types the backend can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordKind {
    /// The DNS record type stored in the cache for this kind
    pub fn record_type(self) -> RecordType {
        match self {
            RecordKind::A => RecordType::A,
            RecordKind::Aaaa => RecordType::AAAA,
        }
    }

    /// Canonical upper-case name (`A` / `AAAA`)
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordKind::A),
            "AAAA" => Ok(RecordKind::Aaaa),
            other => Err(Error::unsupported_type(other.to_string())),
        }
    }
}

/// A record as supplied by the remote authority
///
/// `record_type` is kept as a string so that one unknown type in a
/// snapshot only excludes that record instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Owner name (e.g. "listener1.gslb.example")
    pub name: String,

    /// Record type ("A" or "AAAA")
    #[serde(rename = "type")]
    pub record_type: String,

    /// TTL in seconds, 0 means "use the configured default"
    #[serde(default)]
    pub ttl: u32,

    /// Addresses in serving order
    #[serde(default)]
    pub ips: Vec<String>,

    /// Whether the record serves its addresses
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// CNAME target used when the record is disabled or has no addresses
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failover: String,
}

impl RawRecord {
    /// Create an enabled record with no addresses
    pub fn new(name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            name: name.into(),
            record_type: kind.as_str().to_string(),
            ttl: 0,
            ips: Vec::new(),
            enabled: true,
            failover: String::new(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the addresses
    pub fn with_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ips = ips.into_iter().map(Into::into).collect();
        self
    }

    /// Set the failover target
    pub fn with_failover(mut self, failover: impl Into<String>) -> Self {
        self.failover = failover.into();
        self
    }

    /// Enable or disable the record
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parse the record type
    pub fn kind(&self) -> Result<RecordKind, Error> {
        self.record_type.parse()
    }
}

fn default_enabled() -> bool {
    true
}

/// A `{name, type}` pair to remove from the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    /// Owner name
    pub name: String,

    /// Record type ("A", "AAAA" or "CNAME")
    #[serde(rename = "type")]
    pub record_type: String,
}

impl DeleteRecord {
    /// Create a deletion
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
        }
    }
}
