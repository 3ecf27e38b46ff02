//! Read the kernel neighbor (ARP) cache.
//!
//! Two sources are understood: the `/proc/net/arp` table and the output of
//! `arp -n <ip>`. Both are scanned for tokens shaped like a MAC address, six
//! colon separated groups of one or two hex digits. BSD-style tools drop
//! leading zeros (`0:d:9c:...`), hence the one-digit groups.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;

use crate::addr::{parse_ipv4, MacAddr};
use crate::config::Config;
use crate::Result;

const MAC_PATTERN: &str = r"(?i)\b(?:[0-9a-f]{1,2}:){5}[0-9a-f]{1,2}\b";

/// A resolved entry of the neighbor cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub device: Option<String>,
}

/// Parse a `/proc/net/arp` style table.
///
/// The first column is the IP address; the hardware address is whichever
/// column looks like a MAC address. The header, malformed rows and
/// incomplete entries (all-zero hardware address) are skipped.
///
/// # Errors
///
/// Fails when reading from `reader` fails.
pub fn parse_arp_table<R: BufRead>(reader: R) -> Result<Vec<Neighbor>> {
    let mut neighbors = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let columns: Vec<&str> = line.split_whitespace().collect();
        let Some(ip) = columns.first().and_then(|c| parse_ipv4(c).ok()) else {
            continue;
        };
        let Some(mac) = columns.iter().find_map(|c| exact_mac(c)) else {
            continue;
        };
        if mac.is_zero() {
            continue;
        }
        let device = (columns.len() >= 6).then(|| columns[5].to_string());
        neighbors.push(Neighbor { ip, mac, device });
    }
    Ok(neighbors)
}

/// Look `ip` up in the neighbor table named in `config`.
///
/// # Errors
///
/// Fails when the table cannot be opened or read.
pub fn lookup(config: &Config, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
    let reader = BufReader::new(File::open(&config.arp_table)?);
    let found = parse_arp_table(reader)?
        .into_iter()
        .find(|neighbor| neighbor.ip == ip)
        .map(|neighbor| neighbor.mac);
    Ok(found)
}

/// Extract the first non-zero MAC address printed by `arp -n`.
#[must_use]
pub fn parse_arp_command_output(output: &str) -> Option<MacAddr> {
    mac_pattern()
        .find_iter(output)
        .filter_map(|m| loose_mac(m.as_str()))
        .find(|mac| !mac.is_zero())
}

fn mac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(MAC_PATTERN).expect("mac pattern is valid"))
}

// A whole column that is a MAC address, nothing more.
fn exact_mac(column: &str) -> Option<MacAddr> {
    let m = mac_pattern().find(column)?;
    if m.start() == 0 && m.end() == column.len() {
        loose_mac(column)
    } else {
        None
    }
}

fn loose_mac(text: &str) -> Option<MacAddr> {
    let mut octets = [0u8; 6];
    let mut groups = text.split(':');
    for octet in &mut octets {
        *octet = u8::from_str_radix(groups.next()?, 16).ok()?;
    }
    groups.next().is_none().then(|| MacAddr::from(octets))
}
