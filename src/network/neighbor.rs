//! Neighbor table and kernel ARP cache parsing.
//!
//! Two sources feed the resolver:
//! - the live neighbor table printed by `ip neigh` (or a compatible command)
//! - the kernel ARP cache pseudo-file (`/proc/net/arp`)
//!
//! Both are best effort: lines that do not carry a well-formed hardware
//! address are skipped silently, since incomplete records are normal.

use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use pnet::util::MacAddr;

use super::mac::{is_unresolved, parse_mac};

/// Token preceding the hardware address in `ip neigh` output.
const LLADDR_MARKER: &str = "lladdr";

/// Column of the hardware address when no marker is present.
const NEIGHBOR_MAC_COLUMN: usize = 4;

/// Column of the hardware address in the kernel ARP cache.
const ARP_CACHE_MAC_COLUMN: usize = 3;

/// A resolved `IP -> hardware address` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// Parse the output of the neighbor table command.
///
/// Supports the two layouts seen in the wild:
///
/// ```text
/// 192.168.1.1 dev wlan0 lladdr aa:bb:cc:dd:ee:ff REACHABLE
/// 192.168.1.1 dev wlan0 FAILED aa:bb:cc:dd:ee:ff
/// ```
///
/// The `lladdr` marker is used when present; otherwise the fifth field is
/// taken as the hardware address.
pub fn parse_neighbor_table<I, S>(lines: I) -> Vec<NeighborEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| parse_neighbor_line(line.as_ref()))
        .collect()
}

fn parse_neighbor_line(line: &str) -> Option<NeighborEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let ip = tokens.first()?.parse::<Ipv4Addr>().ok()?;

    let candidate = match tokens.iter().position(|token| *token == LLADDR_MARKER) {
        Some(marker) => tokens.get(marker + 1)?,
        None => tokens.get(NEIGHBOR_MAC_COLUMN)?,
    };

    entry(ip, candidate)
}

/// Parse the content of the kernel ARP cache.
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.1.1      0x1         0x2         aa:bb:cc:dd:ee:ff     *        wlan0
/// ```
pub fn parse_arp_cache(content: &str) -> Vec<NeighborEntry> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let ip = fields.first()?.parse::<Ipv4Addr>().ok()?;
            entry(ip, fields.get(ARP_CACHE_MAC_COLUMN)?)
        })
        .collect()
}

/// Read and parse the kernel ARP cache.
///
/// A missing file is not an error: it yields no entries.
pub async fn read_arp_cache(path: &Path) -> io::Result<Vec<NeighborEntry>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(parse_arp_cache(&content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

/// Find the hardware address recorded for `ip`.
pub fn find_entry(entries: &[NeighborEntry], ip: Ipv4Addr) -> Option<MacAddr> {
    entries
        .iter()
        .find(|entry| entry.ip == ip)
        .map(|entry| entry.mac)
}

fn entry(ip: Ipv4Addr, candidate: &str) -> Option<NeighborEntry> {
    let mac = parse_mac(candidate)?;
    if is_unresolved(mac) {
        return None;
    }
    Some(NeighborEntry { ip, mac })
}
