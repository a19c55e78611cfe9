//! Peer Client Module
//!
//! Outbound communication with other nodes: existence probes, clone-writes and
//! capacity queries. The [`client::PeerClient`] trait is the seam between the
//! routing core and the network; the HTTP implementation lives next to it and
//! tests substitute an in-memory cluster.

pub mod client;
pub mod protocol;
