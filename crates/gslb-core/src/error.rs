//! Error types for the GSLB core
//!
//! Errors fall into two levels:
//! - **Record level** (`InvalidRecord`, `NoValidAddresses`, `UnsupportedType`):
//!   absorbed by the record cache, which logs and excludes the record.
//! - **Sync level** (`BackendUnavailable`, `Backend`, `MalformedResponse`):
//!   absorbed by the sync engine into the sync status.
//!
//! Neither level is ever fatal to the serving path.

use thiserror::Error;

/// Result type alias for GSLB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the GSLB system
#[derive(Error, Debug)]
pub enum Error {
    /// Record violates a policy (e.g. disabled without a failover target)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// None of the record's addresses survived parsing
    #[error("No valid addresses: {0}")]
    NoValidAddresses(String),

    /// Record type is not served by this engine
    #[error("Unsupported record type: {0}")]
    UnsupportedType(String),

    /// Snapshot cannot be applied as a generation
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Remote authority could not be reached (network failure, timeout, 5xx)
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Remote authority answered with a non-success status
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Remote authority answered with a body we cannot use
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a "no valid addresses" error
    pub fn no_valid_addresses(msg: impl Into<String>) -> Self {
        Self::NoValidAddresses(msg.into())
    }

    /// Create an unsupported type error
    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    /// Create an invalid snapshot error
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a backend-specific error
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that only exclude a single record from a generation
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidRecord(_) | Self::NoValidAddresses(_) | Self::UnsupportedType(_)
        )
    }

    /// True for errors that fail a whole sync cycle
    pub fn is_sync_level(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::Backend { .. } | Self::MalformedResponse(_)
        )
    }
}
