//! Replication Module
//!
//! Load-triggered replica placement.
//!
//! ## Workflow
//! 1. **Trigger**: a read finds `concurrent_count(fileId) >= k` and hands over a
//!    snapshot of the active requesters.
//! 2. **Vote**: every active requester votes for its nearest peer (see [`distance`]);
//!    the peer with most votes wins, ties go to the earlier peer.
//! 3. **Capacity gate**: the target is asked whether it can fit the file. A refusal
//!    ends the attempt; there is no fallback candidate and no retry.
//! 4. **Clone**: the bytes are written to the target and, on acknowledgement, the
//!    target is recorded as an additional holder.
//!
//! The same clone-write path backs the explicit transfer and replicate operations.

pub mod controller;
pub mod distance;

#[cfg(test)]
mod tests;
