use serde::{Deserialize, Serialize};
use std::fmt;

/// Size recorded for a holder discovered by probing, whose copy we never saw.
pub const UNKNOWN_SIZE: i64 = -1;

/// Distance of a peer whose routing cost has not been computed.
pub const UNKNOWN_DISTANCE: i64 = -1;

/// Opaque identifier of a stored file, assigned at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub String);

impl FileId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Whether the id is safe to use as a file name in the upload directory.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 128
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A node known to hold a copy of a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: FileId,
    pub holder: String,
    /// Bytes, or [`UNKNOWN_SIZE`].
    pub size: i64,
}

/// Another node this node knows about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: String,
    /// Routing-cost estimate, or [`UNKNOWN_DISTANCE`].
    pub distance: i64,
}

/// Order in which [`crate::metadata::store::MetadataStore::list_peers`] yields peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerOrder {
    /// The order peers were registered in.
    #[default]
    Registration,
    /// Ascending distance; unknown distances last, ties in registration order.
    Distance,
}

/// The persisted part of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub files: Vec<FileRecord>,
    pub peers: Vec<PeerRecord>,
}
