//! ARP discovery, forgery and host network-state control.
//!
//! The crate is split the same way the work is:
//!
//! * [`addr`] converts MAC and IPv4 addresses between text, hex and binary.
//! * [`enet`] and [`arp`] read and write the Ethernet and ARP headers in
//!   place, on top of which [`forge`] builds complete ARP frames.
//! * [`route`] finds the default gateway in the kernel routing table.
//! * [`resolve`] finds MAC addresses for interfaces and IP addresses, trying
//!   each strategy in a fixed order.
//! * [`netstate`] mutates the host: IP forwarding, interface MAC address and
//!   the networking service.
//! * [`vendor`] maps manufacturer names to MAC prefixes.
//!
//! ## Side effects
//!
//! Everything in [`addr`], [`enet`], [`arp`] and [`forge`] is pure. Anything
//! that touches the OS goes through either the filesystem paths in
//! [`Config`](crate::config::Config), the [`CommandRunner`](crate::exec::CommandRunner)
//! trait, or an [`ArpTransport`](crate::resolve::ArpTransport). Tests swap
//! those out for fakes.
//!
//! Nothing here sends a forged frame on its own. Callers pick the transport,
//! which on Linux is usually [`socket::RawSocket`].
#![warn(clippy::pedantic)]
#![allow(clippy::double_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::len_without_is_empty)]

pub mod addr;
pub mod arp;
pub mod config;
pub mod enet;
pub mod exec;
pub mod forge;
pub mod neigh;
pub mod netstate;
pub mod resolve;
pub mod route;
#[cfg(target_os = "linux")]
pub mod socket;
pub mod vendor;

use std::net::Ipv4Addr;
use std::path::PathBuf;

pub use addr::MacAddr;
pub use config::Config;
pub use forge::ArpPacket;

/// Utility wrapper for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while parsing, resolving, forging or
/// mutating host state.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed address text or binary.
    #[error("cannot parse {kind} from {input:?}")]
    ParseFailure { kind: &'static str, input: String },
    /// Malformed wire data.
    #[error("invalid argument: {0}")]
    CannotParse(&'static str),
    #[error("not enough space: {0}")]
    NotEnoughSpace(&'static str),
    /// A lookup that reads a single table found no matching entry.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// Every resolution strategy ran and none produced an address.
    #[error("unable to resolve a MAC address for {0}")]
    Unresolved(String),
    /// A bounded wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The host has no usable route or interface to reach the target.
    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),
    /// A packet was requested without one of its mandatory fields.
    #[error("cannot build packet: {0}")]
    ConstructionError(&'static str),
    /// A state mutation was given a value it cannot apply.
    #[error("invalid value {value:?} for {target}")]
    InvalidValue { target: &'static str, value: String },
    /// The OS refused a state write, usually for lack of privilege.
    #[error("cannot write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A subordinate command was missing or exited unsuccessfully.
    #[error("{step} failed: `{program}` {}", describe_status(.status, .stderr))]
    ExternalToolFailure {
        step: exec::Step,
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (*status, stderr.is_empty()) {
        (Some(code), true) => format!("exited with status {code}"),
        (Some(code), false) => format!("exited with status {code}: {stderr}"),
        (None, true) => "could not be run".to_string(),
        (None, false) => format!("could not be run: {stderr}"),
    }
}
