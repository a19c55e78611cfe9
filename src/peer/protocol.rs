//! Node HTTP Protocol
//!
//! Endpoint paths and query-string DTOs shared by the axum handlers (inbound) and
//! the [`super::client::HttpPeerClient`] (outbound). Clients and peers speak the
//! same API; the privileged operations (transfer, replicate, delete) are simply
//! not meant to be exposed to ordinary clients.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Liveness check.
pub const ENDPOINT_ROOT: &str = "/";
/// Multipart upload. Also the target of clone-writes between nodes.
pub const ENDPOINT_WRITE: &str = "/write";
/// Read with routing resolution (200, 302 or 404).
pub const ENDPOINT_READ: &str = "/read";
/// Existence probe: answers only for the local copy, never redirects.
pub const ENDPOINT_FILE_EXISTS: &str = "/file_exists";
/// Move a file to another node.
pub const ENDPOINT_TRANSFER: &str = "/transfer";
/// Copy a file to another node.
pub const ENDPOINT_REPLICATE: &str = "/replicate";
/// Delete the local copy.
pub const ENDPOINT_DELETE: &str = "/delete";
/// Whether a file of a given size would fit.
pub const ENDPOINT_CAN_MOVE_FILE: &str = "/can_move_file";
/// The configured storage limit.
pub const ENDPOINT_CAPACITY: &str = "/capacity";
/// Access-log download.
pub const ENDPOINT_LOGS: &str = "/logs";

/// Multipart field carrying the file bytes.
pub const MULTIPART_FILE_FIELD: &str = "file";

// --- Query parameters ---

/// Query for `/write`.
///
/// `uuid` is privileged: it is set only on clone-writes between nodes, so the
/// copy keeps the source's id. A `uuid` naming different local bytes gets 409.
/// `ip` overrides the requester identity recorded in the access log.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteQuery {
    pub uuid: Option<String>,
    pub ip: Option<String>,
}

/// Query for `/read`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadQuery {
    pub uuid: String,
    pub ip: Option<String>,
    /// Artificial delay in seconds before serving a local copy.
    pub delay: Option<f64>,
}

/// Query for `/file_exists` and `/delete`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileQuery {
    pub uuid: String,
}

/// Query for `/transfer` and `/replicate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MoveQuery {
    pub uuid: String,
    pub destination: String,
    pub ip: Option<String>,
}

/// Query for `/can_move_file`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CapacityQuery {
    pub file_size: u64,
}

/// Query for `/logs`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogQuery {
    pub date: Option<String>,
}

/// Location a reader is redirected to when `address` holds the file.
pub fn read_location(address: &str, file_id: &str) -> String {
    format!("http://{}{}?uuid={}", address, ENDPOINT_READ, file_id)
}
