//! Local Storage Module
//!
//! Whole files on the node's own disk, one per `FileId`.
//!
//! ## Core Concepts
//! - **Bytes only**: the blob store knows nothing about holders; whether a file is
//!   *recorded* here lives in [`crate::metadata`]. A read checks both.
//! - **Atomic writes**: an upload becomes visible only once it is fully on disk.
//! - **Accounting**: `used_bytes` feeds the capacity answer given to peers.

pub mod blobs;

#[cfg(test)]
mod tests;
