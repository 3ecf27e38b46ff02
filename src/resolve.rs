//! Find MAC addresses for interfaces and IP addresses.
//!
//! Each lookup tries its strategies in a fixed order and falls through on
//! failure. A lookup only fails once every strategy has been tried, and
//! then with an error saying so rather than an empty value.
//!
//! | lookup                           | strategies, in order                                  |
//! |----------------------------------|-------------------------------------------------------|
//! | [`Resolver::resolve_device_mac`] | interface `ioctl`, host identifier ([`DeviceMac::Approximated`]) |
//! | [`Resolver::resolve_ip_mac`]     | ICMP probe + neighbor cache, `arp -n`                 |
//! | [`Resolver::resolve_ip_mac_default`] | as above, bounded by [`Config::probe_timeout`]    |
//! | [`Resolver::resolve_ip_mac_active`] | broadcast ARP request, first matching reply        |
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

use crate::addr::MacAddr;
use crate::arp::Operation;
use crate::config::Config;
use crate::exec::{run_step, CommandRunner, Step, SystemRunner};
use crate::forge::{self, ArpPacket};
use crate::neigh;
use crate::{Error, Result};

/// Sends and receives whole Ethernet frames for the active resolver.
pub trait ArpTransport {
    /// The hardware and protocol address requests are sent from.
    fn source(&self) -> (MacAddr, Ipv4Addr);

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Fails when the frame cannot be handed to the network.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Receive one frame into `buf`, waiting no longer than `timeout`.
    /// `Ok(None)` means nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Fails on any receive error other than the wait elapsing.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;
}

/// The MAC address found for a local interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMac {
    /// Read from the interface itself.
    Hardware(MacAddr),
    /// Derived from a host-wide identifier because the interface could not
    /// be queried. Stable for a given host, but not the interface's real
    /// address and not usable as a frame source that peers will recognise.
    Approximated(MacAddr),
}

impl DeviceMac {
    #[must_use]
    pub fn mac(&self) -> MacAddr {
        match *self {
            DeviceMac::Hardware(mac) | DeviceMac::Approximated(mac) => mac,
        }
    }

    #[must_use]
    pub fn is_approximated(&self) -> bool {
        matches!(self, DeviceMac::Approximated(_))
    }
}

/// Reads an interface's hardware address from the OS.
pub type InterfaceLookup = fn(&str) -> io::Result<MacAddr>;

// Large enough for any frame a packet socket hands us.
const RECV_BUF_LEN: usize = 1536;

/// Runs the MAC resolution strategies against one host.
pub struct Resolver<R: CommandRunner> {
    config: Config,
    runner: R,
    interface_lookup: InterfaceLookup,
}

impl Resolver<SystemRunner> {
    /// A resolver for this host with configuration from the environment.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Config::from_env(), SystemRunner::new())
    }
}

impl<R: CommandRunner> Resolver<R> {
    #[must_use]
    pub fn new(config: Config, runner: R) -> Self {
        Self {
            config,
            runner,
            interface_lookup: default_interface_lookup,
        }
    }

    /// Replace the way interface hardware addresses are read.
    #[must_use]
    pub fn with_interface_lookup(mut self, lookup: InterfaceLookup) -> Self {
        self.interface_lookup = lookup;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Find the MAC address of the local interface `device`.
    ///
    /// The interface is asked first. When that fails, or reports no address
    /// at all (loopback, tunnels), a stand-in is derived from the machine id
    /// and returned as [`DeviceMac::Approximated`].
    ///
    /// # Errors
    ///
    /// [`Error::Unresolved`] when neither source is available.
    pub fn resolve_device_mac(&self, device: &str) -> Result<DeviceMac> {
        match (self.interface_lookup)(device) {
            Ok(mac) if !mac.is_zero() => {
                log::debug!("{device} has hardware address {mac}");
                return Ok(DeviceMac::Hardware(mac));
            }
            Ok(_) => log::debug!("{device} has no hardware address"),
            Err(err) => log::debug!("cannot query {device}: {err}"),
        }

        for path in &self.config.machine_id {
            match fs::read_to_string(path) {
                Ok(id) if !id.trim().is_empty() => {
                    let mac = approximate_mac(id.trim().as_bytes());
                    log::warn!(
                        "using approximated address {mac} for {device}, derived from {}",
                        path.display()
                    );
                    return Ok(DeviceMac::Approximated(mac));
                }
                Ok(_) => log::debug!("{} is empty", path.display()),
                Err(err) => log::debug!("cannot read {}: {err}", path.display()),
            }
        }

        Err(Error::Unresolved(device.to_string()))
    }

    /// Find the MAC address of `ip` through the kernel's neighbor cache.
    ///
    /// 1. Send one ICMP echo (bounded by `timeout`) so the kernel resolves the
    ///    address, then wait the configured settle delay.
    /// 2. Look `ip` up in the neighbor table.
    /// 3. Ask `arp -n` (bounded by `timeout`).
    ///
    /// A failed or unanswered probe is not fatal, the cache may already hold
    /// the entry.
    ///
    /// # Errors
    ///
    /// When nothing was found: [`Error::NoRoute`] if the probe reported the
    /// network unreachable, else [`Error::Timeout`] if the probe or the `arp`
    /// command overran `timeout`, else [`Error::Unresolved`].
    pub fn resolve_ip_mac(&self, ip: Ipv4Addr, timeout: Duration) -> Result<MacAddr> {
        let ip_text = ip.to_string();
        let mut unreachable = false;
        let mut timed_out = false;

        if let Err(err) = self.probe(&ip_text, timeout) {
            log::debug!("probe of {ip} failed: {err}");
            unreachable = is_unreachable(&err);
            timed_out = matches!(err, Error::Timeout(_));
        }
        thread::sleep(self.config.settle_delay);

        match neigh::lookup(&self.config, ip) {
            Ok(Some(mac)) => {
                log::debug!("{ip} is at {mac} (neighbor cache)");
                return Ok(mac);
            }
            Ok(None) => log::debug!("{ip} not in neighbor cache"),
            Err(err) => log::debug!("cannot read neighbor cache: {err}"),
        }

        match run_step(&self.runner, Step::NeighborQuery, "arp", &["-n", &ip_text], Some(timeout)) {
            Ok(output) => {
                if let Some(mac) = neigh::parse_arp_command_output(&output.stdout) {
                    log::debug!("{ip} is at {mac} (arp command)");
                    return Ok(mac);
                }
                log::debug!("arp command has no entry for {ip}");
            }
            Err(err) => {
                log::debug!("arp command failed: {err}");
                timed_out |= matches!(err, Error::Timeout(_));
            }
        }

        if unreachable {
            Err(Error::NoRoute(ip))
        } else if timed_out {
            Err(Error::Timeout(timeout))
        } else {
            Err(Error::Unresolved(ip_text))
        }
    }

    /// [`Resolver::resolve_ip_mac`] bounded by the configured probe timeout.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_ip_mac`].
    pub fn resolve_ip_mac_default(&self, ip: Ipv4Addr) -> Result<MacAddr> {
        self.resolve_ip_mac(ip, self.config.probe_timeout)
    }

    /// Find the MAC address of `ip` by asking the network directly.
    ///
    /// A broadcast ARP request is sent through `transport`, then replies are
    /// read for up to `timeout`. The first reply whose sender protocol
    /// address is `ip` wins and its Ethernet source address is returned;
    /// anything else on the wire is skipped. Without an answer the request is
    /// repeated up to `retries` more times.
    ///
    /// # Errors
    ///
    /// Fails only when the transport does. No answer is `Ok(None)`.
    pub fn resolve_ip_mac_active<T: ArpTransport + ?Sized>(
        &self,
        transport: &mut T,
        ip: Ipv4Addr,
        timeout: Duration,
        retries: u32,
    ) -> Result<Option<MacAddr>> {
        let (source_mac, source_ip) = transport.source();
        let request = forge::build_request(source_mac, source_ip, ip).to_bytes();
        let mut buf = [0u8; RECV_BUF_LEN];

        for attempt in 0..=retries {
            log::debug!("who-has {ip} tell {source_ip} (attempt {})", attempt + 1);
            transport.send(&request)?;

            let deadline = Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let Some(len) = transport.recv(&mut buf, remaining)? else {
                    break;
                };
                match ArpPacket::from_bytes(&buf[..len.min(buf.len())]) {
                    Ok(reply) if reply.arp_op == Operation::Reply && reply.sender_ip == ip => {
                        log::debug!("{ip} is at {}", reply.ether_src);
                        return Ok(Some(reply.ether_src));
                    }
                    Ok(_) => {}
                    Err(err) => log::trace!("skipping frame: {err}"),
                }
            }
        }

        log::debug!("no reply from {ip} after {} attempts", u64::from(retries) + 1);
        Ok(None)
    }

    fn probe(&self, ip: &str, timeout: Duration) -> Result<()> {
        let wait = timeout.as_secs().max(1).to_string();
        run_step(
            &self.runner,
            Step::Probe,
            "ping",
            &["-c", "1", "-W", &wait, ip],
            Some(timeout),
        )?;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn default_interface_lookup(device: &str) -> io::Result<MacAddr> {
    crate::socket::interface_hardware_addr(device)
}

#[cfg(not(target_os = "linux"))]
fn default_interface_lookup(_device: &str) -> io::Result<MacAddr> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "interface queries are only implemented on linux",
    ))
}

fn is_unreachable(err: &Error) -> bool {
    matches!(err, Error::ExternalToolFailure { stderr, .. } if stderr.contains("unreachable"))
}

/// Fold a host identifier into a unicast, locally administered MAC address.
///
/// FNV-1a is used for its stable output: the same identifier always gives
/// the same address, across builds and platforms.
#[must_use]
pub fn approximate_mac(id: &[u8]) -> MacAddr {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = id
        .iter()
        .fold(FNV_OFFSET, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME));

    let bytes = hash.to_be_bytes();
    let mut octets = [0u8; 6];
    octets.copy_from_slice(&bytes[2..]);
    octets[0] = (octets[0] & !0x01) | 0x02;
    MacAddr::from(octets)
}
