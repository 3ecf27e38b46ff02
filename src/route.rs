//! Find the default gateway in the kernel routing table.
//!
//! The table is read in `/proc/net/route` format: a header line, then one
//! whitespace separated row per route with the interface, destination,
//! gateway and flags in the first four columns. Addresses are written as
//! hex in host (little-endian) byte order.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::config::Config;
use crate::{Error, Result};

/// `RTF_GATEWAY`: the route goes through a gateway.
pub const RTF_GATEWAY: u32 = 0x2;

/// One row of the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub interface: String,
    pub destination: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub flags: u32,
}

impl Route {
    /// Parse a data row. Returns `None` for the header and malformed rows.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut columns = line.split_whitespace();
        let interface = columns.next()?.to_string();
        let destination = parse_hex_ipv4(columns.next()?)?;
        let gateway = parse_hex_ipv4(columns.next()?)?;
        let flags = u32::from_str_radix(columns.next()?, 16).ok()?;
        Some(Self {
            interface,
            destination,
            gateway,
            flags,
        })
    }

    /// A default route: all-zero destination and the gateway flag set.
    #[must_use]
    pub fn is_default_gateway(&self) -> bool {
        self.destination.is_unspecified() && self.flags & RTF_GATEWAY != 0
    }
}

/// Read the default gateway from the routing table named in `config`.
///
/// # Errors
///
/// [`Error::IoError`] when the table cannot be read, [`Error::NotFound`] when
/// no row describes a default gateway.
pub fn default_gateway(config: &Config) -> Result<Ipv4Addr> {
    default_gateway_route(config).map(|route| route.gateway)
}

/// Like [`default_gateway`], returning the whole row so callers also learn
/// which interface the gateway sits behind.
///
/// # Errors
///
/// See [`default_gateway`].
pub fn default_gateway_route(config: &Config) -> Result<Route> {
    let route = find_default_route(open(&config.route_table)?)?;
    log::debug!("default gateway {} via {}", route.gateway, route.interface);
    Ok(route)
}

/// Scan a routing table for the default gateway.
///
/// # Errors
///
/// [`Error::IoError`] on read failure, [`Error::NotFound`] when no row
/// matches.
pub fn parse_default_gateway<R: BufRead>(reader: R) -> Result<Ipv4Addr> {
    find_default_route(reader).map(|route| route.gateway)
}

fn find_default_route<R: BufRead>(reader: R) -> Result<Route> {
    for line in reader.lines() {
        if let Some(route) = Route::parse(&line?) {
            if route.is_default_gateway() {
                return Ok(route);
            }
        }
    }
    Err(Error::NotFound("default gateway"))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

// Route addresses are the raw in_addr printed with %08X on a little-endian
// host, so the bytes come out reversed.
fn parse_hex_ipv4(column: &str) -> Option<Ipv4Addr> {
    if column.len() != 8 {
        return None;
    }
    let value = u32::from_str_radix(column, 16).ok()?;
    Some(Ipv4Addr::from(value.to_le_bytes()))
}
