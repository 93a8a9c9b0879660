//! Error types for the Fabric Zone Manager
//!
//! Provides structured error types for every zoning component: the switch
//! session client, the fabric state reader, the reconciliation engine, the
//! command executor and the zone driver facade.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the zone manager
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Cannot reach fabric switch {host}: {reason}")]
    Connectivity { host: String, reason: String },

    #[error("Fabric rejected command `{command}`: {reason}")]
    Command { command: String, reason: String },

    #[error("Command `{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    // =========================================================================
    // Fabric State Errors
    // =========================================================================
    #[error("Malformed output from `{command}`: {reason}")]
    MalformedOutput { command: String, reason: String },

    #[error("Zoning session already active on fabric {fabric} (session: {session})")]
    ConcurrentSession { fabric: String, session: String },

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error("Unsupported zoning policy: {0}")]
    UnsupportedPolicy(String),

    #[error("Invalid WWN: {wwn}")]
    InvalidWwn { wwn: String },

    #[error("Zone name for initiator {initiator} is empty after sanitization")]
    InvalidZoneName { initiator: String },

    #[error("Zone name {zone} resolves for both {first} and {second}")]
    ZoneNameCollision {
        zone: String,
        first: String,
        second: String,
    },

    #[error("{} zoning failures: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<Error>),

    // =========================================================================
    // Driver Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fabric not configured: {fabric}")]
    FabricNotFound { fabric: String },

    #[error("Timed out waiting {after:?} for zoning lock on fabric {fabric}")]
    LockTimeout { fabric: String, after: Duration },

    // =========================================================================
    // IO / Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a caller should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Transient transport failure, retry with backoff
    Retry,
    /// Someone else owns the fabric right now, skip this cycle
    Skip,
    /// Surface to the caller
    Fail,
}

impl Error {
    /// Determine what to do with this error
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Error::Connectivity { .. } => ErrorDisposition::Retry,
            Error::ConcurrentSession { .. } => ErrorDisposition::Skip,
            // Rejected edits are left for the next attach/detach cycle
            _ => ErrorDisposition::Fail,
        }
    }

    /// Check if this error is retryable at the transport layer
    pub fn is_retryable(&self) -> bool {
        matches!(self.disposition(), ErrorDisposition::Retry)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Connectivity { .. })
    }

    /// Collapse a list of collected failures into one error
    pub fn collect(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Aggregate(errors)),
        }
    }
}

/// Result type alias for the zone manager
pub type Result<T> = std::result::Result<T, Error>;
