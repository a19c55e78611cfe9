//! Requester-to-peer distance estimate.
//!
//! For two IPv4 hosts the distance is the number of low-order bits that differ
//! after their longest common prefix, so `10.0.0.7` is nearer to `10.0.0.2` (3)
//! than to `10.1.0.2` (17). Anything else (hostnames, IPv6) falls back to the
//! same idea over the raw host strings. Ports are ignored.

use std::net::Ipv4Addr;

/// Strips the port from `host:port` or `[v6]:port`.
pub fn host_part(address: &str) -> &str {
    let address = address.trim();
    if let Some(rest) = address.strip_prefix('[')
        && let Some(end) = rest.find(']')
    {
        return &rest[..end];
    }
    match address.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':') && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            host
        }
        _ => address,
    }
}

pub fn distance(from: &str, to: &str) -> u32 {
    let a = host_part(from);
    let b = host_part(to);

    match (a.parse::<Ipv4Addr>(), b.parse::<Ipv4Addr>()) {
        (Ok(a), Ok(b)) => {
            let common_bits = (u32::from(a) ^ u32::from(b)).leading_zeros();
            32 - common_bits
        }
        _ => {
            let common = a
                .bytes()
                .zip(b.bytes())
                .take_while(|(x, y)| x == y)
                .count();
            (a.len().max(b.len()) - common) as u32
        }
    }
}

/// Index of the peer nearest to `requester`; ties go to the earlier peer.
pub fn nearest_peer(requester: &str, peers: &[String]) -> Option<usize> {
    peers
        .iter()
        .enumerate()
        .min_by_key(|(_, peer)| distance(requester, peer))
        .map(|(idx, _)| idx)
}
