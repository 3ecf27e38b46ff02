//! Linux packet socket for sending and receiving ARP frames, plus the
//! `ioctl` lookups for an interface's own addresses.
use std::ffi::CString;
use std::io;
use std::mem::{size_of, zeroed};
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use byteorder::{ByteOrder, NetworkEndian};
use libc::{AF_INET, AF_PACKET, ETH_P_ARP, SOCK_DGRAM, SOCK_RAW};

use crate::addr::MacAddr;
use crate::arp::ETHERNET_ADDR_LEN;
use crate::resolve::ArpTransport;
use crate::Result;

/// An `AF_PACKET` socket bound to one interface and to the ARP EtherType.
///
/// Frames are sent and received whole, Ethernet header included. Opening
/// one needs `CAP_NET_RAW`.
#[derive(Debug)]
pub struct RawSocket {
    fd: OwnedFd,
    ifindex: i32,
    mac: MacAddr,
    ip: Ipv4Addr,
}

impl RawSocket {
    /// Open a socket on `interface`, learning its MAC and IPv4 address.
    ///
    /// # Errors
    ///
    /// Fails when the interface does not exist, has no IPv4 address, or the
    /// socket cannot be created (usually for lack of privilege).
    pub fn open(interface: &str) -> io::Result<Self> {
        let ifindex = interface_index(interface)?;
        let mac = interface_hardware_addr(interface)?;
        let ip = interface_ipv4_addr(interface)?;

        let fd = unsafe { libc::socket(AF_PACKET, SOCK_RAW, i32::from(htons(ETH_P_ARP as u16))) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let addr = link_addr(ifindex, MacAddr::zero());
        let bound = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::addr_of!(addr).cast(),
                size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        if bound < 0 {
            return Err(io::Error::last_os_error());
        }

        log::debug!("packet socket on {interface} (index {ifindex}) as {mac} / {ip}");
        Ok(Self { fd, ifindex, mac, ip })
    }

    #[must_use]
    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    #[must_use]
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Send a complete Ethernet frame. The link-layer destination is taken
    /// from the frame's own header.
    ///
    /// # Errors
    ///
    /// Fails when the frame is shorter than an Ethernet header or `sendto`
    /// fails.
    pub fn send_frame(&self, frame: &[u8]) -> io::Result<usize> {
        if frame.len() < crate::enet::HEADER_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame too short"));
        }
        let mut dest = [0u8; 6];
        dest.copy_from_slice(&frame[..6]);
        let addr = link_addr(self.ifindex, MacAddr::from(dest));

        let sent = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                frame.as_ptr().cast(),
                frame.len(),
                0,
                std::ptr::addr_of!(addr).cast(),
                size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        usize::try_from(sent).map_err(|_| io::Error::last_os_error())
    }

    /// Receive one frame, waiting at most `timeout`. `Ok(None)` means the
    /// wait elapsed.
    ///
    /// # Errors
    ///
    /// Fails when `setsockopt` or `recv` fails for any other reason.
    pub fn recv_frame(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        // A zero SO_RCVTIMEO means "block forever".
        let timeout = timeout.max(Duration::from_micros(1));
        let tv = libc::timeval {
            tv_sec: libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX),
            tv_usec: libc::suseconds_t::try_from(timeout.subsec_micros()).unwrap_or(0),
        };
        let set = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                std::ptr::addr_of!(tv).cast(),
                size_of::<libc::timeval>() as u32,
            )
        };
        if set < 0 {
            return Err(io::Error::last_os_error());
        }

        let read = unsafe { libc::recv(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len(), 0) };
        if read >= 0 {
            return Ok(usize::try_from(read).ok());
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => Ok(None),
            _ => Err(err),
        }
    }
}

impl ArpTransport for RawSocket {
    fn source(&self) -> (MacAddr, Ipv4Addr) {
        (self.mac, self.ip)
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.send_frame(frame)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        Ok(self.recv_frame(buf, timeout)?)
    }
}

/// Read an interface's hardware address with `SIOCGIFHWADDR`.
///
/// # Errors
///
/// Fails when the name is invalid or the `ioctl` fails.
pub fn interface_hardware_addr(interface: &str) -> io::Result<MacAddr> {
    let ifr = interface_ioctl(interface, libc::SIOCGIFHWADDR as _)?;
    let sa = unsafe { &*std::ptr::addr_of!(ifr.ifr_ifru).cast::<libc::sockaddr>() };
    let mut octets = [0u8; 6];
    for (octet, byte) in octets.iter_mut().zip(sa.sa_data.iter()) {
        *octet = *byte as u8;
    }
    Ok(MacAddr::from(octets))
}

/// Read an interface's primary IPv4 address with `SIOCGIFADDR`.
///
/// # Errors
///
/// Fails when the name is invalid, the interface has no IPv4 address, or the
/// `ioctl` fails.
pub fn interface_ipv4_addr(interface: &str) -> io::Result<Ipv4Addr> {
    let ifr = interface_ioctl(interface, libc::SIOCGIFADDR as _)?;
    let sa = unsafe { &*std::ptr::addr_of!(ifr.ifr_ifru).cast::<libc::sockaddr_in>() };
    Ok(Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)))
}

fn interface_index(interface: &str) -> io::Result<i32> {
    let name = interface_name(interface)?;
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::last_os_error());
    }
    i32::try_from(index).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "interface index overflow"))
}

fn interface_name(interface: &str) -> io::Result<CString> {
    if interface.is_empty() || interface.len() >= libc::IFNAMSIZ {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid interface name {interface:?}"),
        ));
    }
    CString::new(interface).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
}

fn interface_ioctl(interface: &str, request: libc::c_ulong) -> io::Result<libc::ifreq> {
    let name = interface_name(interface)?;

    let sock = unsafe { libc::socket(AF_INET, SOCK_DGRAM, 0) };
    if sock < 0 {
        return Err(io::Error::last_os_error());
    }
    let sock = unsafe { OwnedFd::from_raw_fd(sock) };

    let mut ifr: libc::ifreq = unsafe { zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
        *dst = *src as libc::c_char;
    }

    let done = unsafe { libc::ioctl(sock.as_raw_fd(), request as _, &mut ifr) };
    if done < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ifr)
}

fn link_addr(ifindex: i32, dest: MacAddr) -> libc::sockaddr_ll {
    let mut addr: libc::sockaddr_ll = unsafe { zeroed() };
    addr.sll_family = AF_PACKET as u16;
    addr.sll_protocol = htons(ETH_P_ARP as u16);
    addr.sll_ifindex = ifindex;
    addr.sll_halen = ETHERNET_ADDR_LEN;
    addr.sll_addr[..6].copy_from_slice(&dest.octets());
    addr
}

fn htons(val: u16) -> u16 {
    let mut bytes = [0, 0];
    NetworkEndian::write_u16(&mut bytes, val);
    u16::from_ne_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htons_gives_network_order_in_memory() {
        assert_eq!(htons(0x0806).to_ne_bytes(), [0x08, 0x06]);
    }

    #[test]
    fn rejects_oversized_interface_name() {
        assert!(interface_hardware_addr("an-interface-name-too-long").is_err());
        assert!(interface_hardware_addr("").is_err());
    }

    #[test]
    fn loopback_has_zero_hardware_addr() -> io::Result<()> {
        assert!(interface_hardware_addr("lo")?.is_zero());
        Ok(())
    }
}
