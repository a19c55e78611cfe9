//! Peer-to-Peer File Storage Node Library
//!
//! This library crate defines the modules that make up a storage node. It serves as
//! the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! A node stores whole files and cooperates with peers listed in a static server
//! list. There is no central coordinator; every node keeps its own view of who
//! holds what.
//!
//! - **`metadata`**: The per-node source of truth. Maps file ids to holders, keeps
//!   the ordered peer list and counts in-flight reads per file.
//! - **`storage`**: Local file bytes on disk.
//! - **`peer`**: The HTTP protocol nodes speak and the client used to call peers
//!   (existence probes, clone-writes, capacity queries).
//! - **`replication`**: Load-triggered replica placement. Picks a target by majority
//!   vote of the active readers and copies the file there.
//! - **`node`**: Request orchestration (write, read routing, transfer, replicate,
//!   delete, capacity) and its axum binding.
//! - **`access_log`**: One tab-separated line per resolved request, in daily files.
//! - **`config`** / **`cli`**: Startup configuration folded into one immutable value.
//! - **`error`**: Error enums per layer.

pub mod access_log;
pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod node;
pub mod peer;
pub mod replication;
pub mod storage;
