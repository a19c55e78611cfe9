//! Error types shared across the node.
//!
//! Each layer has its own enum so callers can tell a flaky peer apart from a
//! broken disk. The HTTP handlers are the only place these get turned into
//! status codes.

use thiserror::Error;

/// Failure of the metadata persistence layer.
///
/// A lookup that finds nothing is never an error; only a failed snapshot write is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Metadata persistence failed: {0}")]
    Persistence(String),
}

/// Failure of an outbound call to another node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeerError {
    /// Network failure, including timeouts, after the retry was spent.
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    /// The peer answered, but not with something we understand.
    #[error("Unexpected response from {peer}: {reason}")]
    Protocol { peer: String, reason: String },
}

/// Errors surfaced by [`crate::node::service::Node`] operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File {0} not found")]
    NotFound(String),

    /// A write named an existing file but carried different bytes.
    #[error("File {0} already exists with different content")]
    AlreadyExists(String),

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("Peer {peer} returned an unexpected response: {reason}")]
    PeerProtocol { peer: String, reason: String },

    /// The destination answered the clone-write with a non-created status.
    #[error("Peer {peer} rejected the write with status {status}")]
    PeerRejected { peer: String, status: u16 },

    #[error("Destination cannot fit {needed} bytes ({space_left} left)")]
    CapacityExceeded { needed: u64, space_left: i64 },

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Local storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PeerError> for NodeError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Unreachable { peer, reason } => NodeError::PeerUnreachable { peer, reason },
            PeerError::Protocol { peer, reason } => NodeError::PeerProtocol { peer, reason },
        }
    }
}

/// Errors raised while assembling the node configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
