//! Core traits for the GSLB system
//!
//! - [`Backend`]: Fetch snapshots and change checks from the remote authority

pub mod backend;

pub use backend::{Backend, ChangeCheck, Snapshot};
