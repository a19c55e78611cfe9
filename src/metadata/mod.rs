//! Metadata Store Module
//!
//! The authoritative local view of "who holds what" for this node.
//!
//! ## Core Concepts
//! - **Holders**: `(fileId, address, size)` records. A file may have several holders (replicas);
//!   a `(fileId, address)` pair appears at most once.
//! - **Peers**: the ordered registry of other nodes, bootstrapped from the server list.
//! - **Active requests**: ephemeral `(fileId, requester)` records counting in-flight reads,
//!   released through [`store::ActiveRequestGuard`] on every exit path.
//!
//! Holders and peers can be snapshotted to a JSON file so they survive restarts;
//! active requests never are.

pub mod store;
pub mod types;
