//! Error types shared across the authdns crates

use thiserror::Error;

/// Result type used throughout the server
pub type DnsResult<T> = Result<T, DnsError>;

/// Error taxonomy for zone management, replication, and the wire codec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DnsError {
    /// Zone or file absent. A distinguished signal, not a failure: callers
    /// routinely branch on it (activation, delete, remote fetch).
    #[error("not found")]
    NotFound,

    #[error("zone already exists: {zone}")]
    ZoneExists { zone: String },

    #[error("version is required")]
    VersionRequired,

    #[error("zone version is missing")]
    VersionMissing,

    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("invalid zone: {message}")]
    Validation { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    /// Quorum not met. Carries the peers that acknowledged the aborted
    /// change so the caller can drive compensating rollback.
    #[error("replication quorum not met ({acks}/{required} acks)")]
    QuorumFailed {
        acks: usize,
        required: usize,
        acked_peers: Vec<String>,
    },

    #[error("malformed message: {message}")]
    Wire { message: String },

    #[error("peer transport error: {message}")]
    Transport { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DnsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    pub fn wire(message: impl Into<String>) -> Self {
        Self::Wire { message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// True for the absent-zone signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Storage { message: err.to_string() },
        }
    }
}

impl From<serde_json::Error> for DnsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation { message: err.to_string() }
    }
}
