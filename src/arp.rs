//! Read and write ARP messages for IPv4 over Ethernet.
//!
//! # Standards conformance
//!
//! Follows [RFC 826](https://www.rfc-editor.org/rfc/rfc826.html), restricted
//! to 48-bit hardware addresses and 32-bit protocol addresses. The address
//! fields therefore sit at fixed offsets and the message is always
//! [`HEADER_LEN`] bytes long. Messages advertising other lengths can still
//! be wrapped, but [`Packet::is_ethernet_ipv4`] returns `false` for them and
//! their address accessors are meaningless.
use crate::addr::MacAddr;
use crate::enet::EtherType;
use crate::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian};
use std::net::Ipv4Addr;

/// An ARP message.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Packet<B: AsRef<[u8]>> {
    buf: B,
}

impl<B: AsRef<[u8]>> Packet<B> {
    /// Wrap a buffer holding an ARP message.
    ///
    /// # Errors
    ///
    /// Fails when the buffer is shorter than 28 bytes.
    #[inline]
    pub fn new(buf: B) -> Result<Self> {
        if buf.as_ref().len() >= HEADER_LEN {
            Ok(Self { buf })
        } else {
            Err(Error::CannotParse("arp message too short"))
        }
    }

    /// Start building a message in `buf`.
    ///
    /// # Errors
    ///
    /// See [`PacketBuilder::new`].
    pub fn builder<T>(buf: T) -> Result<PacketBuilder<T>>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        PacketBuilder::new(buf)
    }

    /// Extract the hardware type.
    #[inline]
    pub fn hardware_type(&self) -> HardwareType {
        NetworkEndian::read_u16(&self.buf.as_ref()[offsets::HARDWARE_TYPE]).into()
    }

    /// Extract the protocol type.
    #[inline]
    pub fn protocol_type(&self) -> EtherType {
        NetworkEndian::read_u16(&self.buf.as_ref()[offsets::PROTOCOL_TYPE]).into()
    }

    /// Extract the hardware address length.
    #[inline]
    pub fn hardware_addr_len(&self) -> u8 {
        self.buf.as_ref()[offsets::HARDWARE_ADDR_LEN]
    }

    /// Extract the protocol address length.
    #[inline]
    pub fn protocol_addr_len(&self) -> u8 {
        self.buf.as_ref()[offsets::PROTOCOL_ADDR_LEN]
    }

    /// Extract the operation.
    #[inline]
    pub fn operation(&self) -> Operation {
        NetworkEndian::read_u16(&self.buf.as_ref()[offsets::OPERATION]).into()
    }

    /// True when the header describes Ethernet hardware addresses and IPv4
    /// protocol addresses, the only combination this module can address.
    #[inline]
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.hardware_type() == HardwareType::Ethernet
            && self.protocol_type() == EtherType::Ipv4
            && self.hardware_addr_len() == ETHERNET_ADDR_LEN
            && self.protocol_addr_len() == IPV4_ADDR_LEN
    }

    /// Extract the sender hardware address.
    #[inline]
    pub fn sender_hardware_addr(&self) -> MacAddr {
        self.mac_at(offsets::SENDER_HARDWARE_ADDR)
    }

    /// Extract the sender protocol address.
    #[inline]
    pub fn sender_protocol_addr(&self) -> Ipv4Addr {
        self.ipv4_at(offsets::SENDER_PROTOCOL_ADDR)
    }

    /// Extract the target hardware address.
    #[inline]
    pub fn target_hardware_addr(&self) -> MacAddr {
        self.mac_at(offsets::TARGET_HARDWARE_ADDR)
    }

    /// Extract the target protocol address.
    #[inline]
    pub fn target_protocol_addr(&self) -> Ipv4Addr {
        self.ipv4_at(offsets::TARGET_PROTOCOL_ADDR)
    }

    fn mac_at(&self, range: std::ops::Range<usize>) -> MacAddr {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&self.buf.as_ref()[range]);
        MacAddr::from(octets)
    }

    fn ipv4_at(&self, range: std::ops::Range<usize>) -> Ipv4Addr {
        Ipv4Addr::from(NetworkEndian::read_u32(&self.buf.as_ref()[range]))
    }
}

/// Writes ARP fields into a buffer in place.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PacketBuilder<B: AsRef<[u8]> + AsMut<[u8]>> {
    buf: B,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PacketBuilder<B> {
    /// Create a builder over `buf` and stamp the fixed Ethernet/IPv4 header
    /// (hardware type 1, protocol type `0x0800`, address lengths 6 and 4).
    /// Any of those can still be overwritten afterwards.
    ///
    /// # Errors
    ///
    /// Fails when the buffer is shorter than [`HEADER_LEN`].
    #[inline]
    pub fn new(buf: B) -> Result<Self> {
        if buf.as_ref().len() < HEADER_LEN {
            return Err(Error::NotEnoughSpace("buffer too small for arp message"));
        }
        Ok(PacketBuilder { buf }
            .hardware_type(HardwareType::Ethernet)
            .protocol_type(EtherType::Ipv4)
            .hardware_addr_len(ETHERNET_ADDR_LEN)
            .protocol_addr_len(IPV4_ADDR_LEN))
    }

    /// Set the hardware type.
    #[inline]
    #[must_use]
    pub fn hardware_type(mut self, htype: HardwareType) -> Self {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[offsets::HARDWARE_TYPE], htype.into());
        self
    }

    /// Set the protocol type.
    #[inline]
    #[must_use]
    pub fn protocol_type(mut self, protocol: EtherType) -> Self {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[offsets::PROTOCOL_TYPE], protocol.into());
        self
    }

    /// Set the hardware address length.
    #[inline]
    #[must_use]
    pub fn hardware_addr_len(mut self, len: u8) -> Self {
        self.buf.as_mut()[offsets::HARDWARE_ADDR_LEN] = len;
        self
    }

    /// Set the protocol address length.
    #[inline]
    #[must_use]
    pub fn protocol_addr_len(mut self, len: u8) -> Self {
        self.buf.as_mut()[offsets::PROTOCOL_ADDR_LEN] = len;
        self
    }

    /// Set the operation.
    #[inline]
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        NetworkEndian::write_u16(&mut self.buf.as_mut()[offsets::OPERATION], operation.into());
        self
    }

    /// Set the sender hardware address.
    #[inline]
    #[must_use]
    pub fn sender_hardware_addr(mut self, addr: MacAddr) -> Self {
        self.buf.as_mut()[offsets::SENDER_HARDWARE_ADDR].copy_from_slice(&addr.octets());
        self
    }

    /// Set the sender protocol address.
    #[inline]
    #[must_use]
    pub fn sender_protocol_addr(mut self, addr: Ipv4Addr) -> Self {
        self.buf.as_mut()[offsets::SENDER_PROTOCOL_ADDR].copy_from_slice(&addr.octets());
        self
    }

    /// Set the target hardware address.
    #[inline]
    #[must_use]
    pub fn target_hardware_addr(mut self, addr: MacAddr) -> Self {
        self.buf.as_mut()[offsets::TARGET_HARDWARE_ADDR].copy_from_slice(&addr.octets());
        self
    }

    /// Set the target protocol address.
    #[inline]
    #[must_use]
    pub fn target_protocol_addr(mut self, addr: Ipv4Addr) -> Self {
        self.buf.as_mut()[offsets::TARGET_PROTOCOL_ADDR].copy_from_slice(&addr.octets());
        self
    }

    /// Finish building and return the message.
    #[inline]
    pub fn build(self) -> Packet<B> {
        Packet { buf: self.buf }
    }
}

mod offsets {
    use std::ops::Range;
    pub(crate) const HARDWARE_TYPE: Range<usize> = 0..2;
    pub(crate) const PROTOCOL_TYPE: Range<usize> = 2..4;
    pub(crate) const HARDWARE_ADDR_LEN: usize = 4;
    pub(crate) const PROTOCOL_ADDR_LEN: usize = 5;
    pub(crate) const OPERATION: Range<usize> = 6..8;
    pub(crate) const SENDER_HARDWARE_ADDR: Range<usize> = 8..14;
    pub(crate) const SENDER_PROTOCOL_ADDR: Range<usize> = 14..18;
    pub(crate) const TARGET_HARDWARE_ADDR: Range<usize> = 18..24;
    pub(crate) const TARGET_PROTOCOL_ADDR: Range<usize> = 24..28;
}

/// Interpretation of the hardware type field.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum HardwareType {
    Ethernet,
    Unknown(u16),
}

impl From<u16> for HardwareType {
    fn from(value: u16) -> Self {
        match value {
            1 => HardwareType::Ethernet,
            _ => HardwareType::Unknown(value),
        }
    }
}

impl From<HardwareType> for u16 {
    fn from(value: HardwareType) -> Self {
        match value {
            HardwareType::Ethernet => 1,
            HardwareType::Unknown(value) => value,
        }
    }
}

/// Interpretation of the operation field.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Operation {
    Request,
    Reply,
    Invalid(u16),
}

impl From<u16> for Operation {
    fn from(value: u16) -> Self {
        match value {
            1 => Operation::Request,
            2 => Operation::Reply,
            _ => Operation::Invalid(value),
        }
    }
}

impl From<Operation> for u16 {
    fn from(value: Operation) -> Self {
        match value {
            Operation::Request => 1,
            Operation::Reply => 2,
            Operation::Invalid(op) => op,
        }
    }
}

/// Length of an ARP message carrying 48-bit MAC and 32-bit IPv4 addresses.
pub const HEADER_LEN: usize = 28;

pub const ETHERNET_ADDR_LEN: u8 = 6;
pub const IPV4_ADDR_LEN: u8 = 4;
