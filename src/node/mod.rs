//! Node Module
//!
//! The request-facing half of a storage node.
//!
//! ## Responsibilities
//! - **Write**: store an upload under a fresh `FileId` and record ourselves as holder.
//! - **Read**: resolve to a local copy, a known holder, a holder discovered by probing
//!   peers in order, or not found. Reads are tracked as active requests while in
//!   flight and may trigger replica placement (see [`crate::replication`]).
//! - **Privileged operations**: transfer, replicate and delete of the local copy,
//!   plus capacity queries and access-log download.
//!
//! [`service::Node`] holds the logic; [`handlers`] is a thin axum binding that maps
//! [`types::ReadOutcome`] and [`crate::error::NodeError`] onto status codes.

pub mod handlers;
pub mod service;
pub mod types;
