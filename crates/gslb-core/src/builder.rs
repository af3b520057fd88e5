//! Record builder
//!
//! Turns one [`RawRecord`] into the resource records the cache serves.
//! This is the only place where TTL defaults, failover substitution and
//! address-family checks are decided. It performs no I/O and touches no
//! shared state, so it is safe to call from any task.

use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{RawRecord, RecordKind};

/// Why a record resolves to its failover target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverReason {
    Disabled,
    NoAddresses,
}

/// The serving decision for a raw record
#[derive(Debug, PartialEq, Eq)]
enum Plan<'a> {
    /// Serve a single CNAME to the target
    Failover {
        target: &'a str,
        reason: FailoverReason,
    },
    /// Serve one address record per parsable address
    Addresses(&'a [String]),
    /// Serve nothing
    Drop,
}

fn plan(raw: &RawRecord) -> Result<Plan<'_>> {
    let failover = raw.failover.trim();

    if !raw.enabled {
        if failover.is_empty() {
            return Err(Error::invalid_record(format!(
                "{}: disabled record without failover target",
                raw.name
            )));
        }
        return Ok(Plan::Failover {
            target: failover,
            reason: FailoverReason::Disabled,
        });
    }

    if raw.ips.is_empty() {
        if failover.is_empty() {
            return Ok(Plan::Drop);
        }
        return Ok(Plan::Failover {
            target: failover,
            reason: FailoverReason::NoAddresses,
        });
    }

    Ok(Plan::Addresses(&raw.ips))
}

/// Build the resource records for a raw record
///
/// # Returns
///
/// - `Ok(records)`: the answer set, possibly empty when the record is dropped
/// - `Err(UnsupportedType)`: type is neither A nor AAAA
/// - `Err(InvalidRecord)`: disabled without failover, or an unusable name
/// - `Err(NoValidAddresses)`: none of the addresses could be served
pub fn build(raw: &RawRecord, default_ttl: u32) -> Result<Vec<Record>> {
    let kind = raw.kind()?;
    let owner = parse_name(&raw.name)?;
    let ttl = effective_ttl(raw.ttl, default_ttl);

    match plan(raw)? {
        Plan::Failover { target, reason } => {
            let target = parse_name(target)?;
            debug!(name = %owner, target = %target, ?reason, "building failover CNAME");
            Ok(vec![cname_record(owner, ttl, target)])
        }
        Plan::Drop => {
            debug!(name = %owner, "record has no addresses and no failover, dropping");
            Ok(Vec::new())
        }
        Plan::Addresses(ips) => address_records(owner, ttl, kind, ips),
    }
}

/// TTL to serve: the record's own value unless it is zero
pub fn effective_ttl(ttl: u32, default_ttl: u32) -> u32 {
    if ttl == 0 { default_ttl } else { ttl }
}

/// Normalize a domain name: trimmed, lowercase, fully qualified
pub fn normalize_domain(domain: &str) -> String {
    let mut normalized = domain.trim().to_lowercase();
    if !normalized.ends_with('.') {
        normalized.push('.');
    }
    normalized
}

/// Whether a normalized domain equals the zone or is a subdomain of it
pub fn in_zone(domain: &str, zone: &str) -> bool {
    if zone == "." || domain == zone {
        return true;
    }
    domain.len() > zone.len()
        && domain.ends_with(zone)
        && domain.as_bytes()[domain.len() - zone.len() - 1] == b'.'
}

fn parse_name(name: &str) -> Result<Name> {
    let normalized = normalize_domain(name);
    if normalized == "." {
        return Err(Error::invalid_record("empty domain name"));
    }
    Name::from_ascii(&normalized)
        .map_err(|e| Error::invalid_record(format!("{}: invalid domain name: {}", name, e)))
}

fn address_records(owner: Name, ttl: u32, kind: RecordKind, ips: &[String]) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(ips.len());

    for ip_str in ips {
        let ip: IpAddr = match ip_str.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                warn!(name = %owner, ip = %ip_str, "invalid IP address, skipping");
                continue;
            }
        };

        let rdata = match (kind, ip) {
            (RecordKind::A, IpAddr::V4(v4)) => RData::A(A::from(v4)),
            (RecordKind::A, IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
                Some(v4) => RData::A(A::from(v4)),
                None => {
                    warn!(name = %owner, ip = %ip_str, "IP is not IPv4, skipping for A record");
                    continue;
                }
            },
            (RecordKind::Aaaa, IpAddr::V6(v6)) if v6.to_ipv4_mapped().is_none() => {
                RData::AAAA(AAAA::from(v6))
            }
            (RecordKind::Aaaa, _) => {
                warn!(name = %owner, ip = %ip_str, "IP is IPv4, skipping for AAAA record");
                continue;
            }
        };

        let mut record = Record::from_rdata(owner.clone(), ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        records.push(record);
    }

    if records.is_empty() {
        return Err(Error::no_valid_addresses(format!(
            "no valid {} addresses for {}",
            kind, owner
        )));
    }

    Ok(records)
}

fn cname_record(owner: Name, ttl: u32, target: Name) -> Record {
    let mut record = Record::from_rdata(owner, ttl, RData::CNAME(CNAME(target)));
    record.set_dns_class(DNSClass::IN);
    record
}
