//! Test doubles and common utilities for contract tests
//!
//! The controlled backend replays scripted replies in order and counts the
//! calls it receives, so tests can assert exactly how the engine talks to
//! the remote authority.

#![allow(dead_code)]

use gslb_core::error::{Error, Result};
use gslb_core::traits::{Backend, ChangeCheck, Snapshot};
use gslb_core::{GslbConfig, RawRecord, RecordKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ZONE: &str = "gslb.example";

/// One scripted backend reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Full generation (answer to either call)
    Snapshot(Snapshot),
    /// "Nothing changed" (answer to a change check)
    Unchanged,
    /// Backend could not be reached
    Unavailable(String),
    /// Backend answered with an error status
    Rejected(String),
    /// Never answer
    Hang,
}

/// A backend that replays scripted replies
pub struct ControlledBackend {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    snapshot_calls: Arc<AtomicUsize>,
    change_calls: Arc<AtomicUsize>,
    seen_since: Arc<Mutex<Vec<String>>>,
}

impl ControlledBackend {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            snapshot_calls: Arc::new(AtomicUsize::new(0)),
            change_calls: Arc::new(AtomicUsize::new(0)),
            seen_since: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a backend with replies queued up front
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let backend = Self::new();
        for reply in replies {
            backend.push(reply);
        }
        backend
    }

    /// Create a new ControlledBackend that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            replies: Arc::clone(&other.replies),
            snapshot_calls: Arc::clone(&other.snapshot_calls),
            change_calls: Arc::clone(&other.change_calls),
            seen_since: Arc::clone(&other.seen_since),
        }
    }

    /// Queue a reply
    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Number of fetch_snapshot() calls
    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    /// Number of check_changes() calls
    pub fn change_calls(&self) -> usize {
        self.change_calls.load(Ordering::SeqCst)
    }

    /// The `since` tags passed to check_changes(), in order
    pub fn seen_since(&self) -> Vec<String> {
        self.seen_since.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Option<Reply> {
        self.replies.lock().unwrap().pop_front()
    }
}

#[async_trait::async_trait]
impl Backend for ControlledBackend {
    async fn fetch_snapshot(&self, _zone: &str) -> Result<Snapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);

        match self.next_reply() {
            Some(Reply::Snapshot(snapshot)) => Ok(snapshot),
            Some(Reply::Unchanged) => Err(Error::malformed("unchanged reply to snapshot fetch")),
            Some(Reply::Unavailable(msg)) => Err(Error::backend_unavailable(msg)),
            Some(Reply::Rejected(msg)) => Err(Error::backend("controlled", msg)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(Error::backend_unavailable("no scripted reply")),
        }
    }

    async fn check_changes(&self, _zone: &str, since: &str) -> Result<ChangeCheck> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_since.lock().unwrap().push(since.to_string());

        match self.next_reply() {
            Some(Reply::Snapshot(snapshot)) => Ok(ChangeCheck::Changed(snapshot)),
            Some(Reply::Unchanged) => Ok(ChangeCheck::Unchanged),
            Some(Reply::Unavailable(msg)) => Err(Error::backend_unavailable(msg)),
            Some(Reply::Rejected(msg)) => Err(Error::backend("controlled", msg)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(Error::backend_unavailable("no scripted reply")),
        }
    }

    fn backend_name(&self) -> &'static str {
        "controlled"
    }
}

/// Address record in the test zone
pub fn a_record(host: &str, ips: &[&str]) -> RawRecord {
    RawRecord::new(format!("{}.{}", host, ZONE), RecordKind::A).with_ips(ips.iter().copied())
}

/// Snapshot of the test zone
pub fn snapshot(version: &str, records: Vec<RawRecord>) -> Snapshot {
    Snapshot::new(ZONE, version, records)
}

/// Configuration with a short interval, suitable for paused-time tests
pub fn minimal_config() -> GslbConfig {
    let mut config = GslbConfig::new(ZONE);
    config.sync.sync_interval_secs = 60;
    config.sync.request_timeout_secs = 5;
    config.sync.event_channel_capacity = 100;
    config
}
