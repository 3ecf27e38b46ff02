//! Read and write Ethernet II headers.
//!
//! Only the 14-byte header is interpreted (destination, source and the
//! length/type field). The preamble, SFD and FCS never reach a packet socket,
//! so they are not modelled.
use byteorder::{ByteOrder, NetworkEndian};

use crate::addr::MacAddr;
use crate::{Error, Result};

/// An Ethernet frame borrowed from (or owning) a byte buffer.
///
/// Nothing is parsed until an accessor is called.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Frame<B: AsRef<[u8]>> {
    buf: B,
}

impl<B: AsRef<[u8]>> Frame<B> {
    /// Wrap a buffer holding an Ethernet frame.
    ///
    /// # Errors
    ///
    /// Fails when the buffer is shorter than [`HEADER_LEN`]. The accessors
    /// index straight into the buffer, so this is the only check.
    #[inline]
    pub fn new(buf: B) -> Result<Self> {
        if buf.as_ref().len() >= HEADER_LEN {
            Ok(Self { buf })
        } else {
            Err(Error::CannotParse("ethernet frame too short"))
        }
    }

    /// Start building a frame in `buf`.
    ///
    /// # Errors
    ///
    /// See [`FrameBuilder::new`].
    #[inline]
    pub fn builder<T>(buf: T) -> Result<FrameBuilder<T>>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        FrameBuilder::new(buf)
    }

    /// Extract the destination MAC address.
    #[inline]
    #[must_use]
    pub fn dest(&self) -> MacAddr {
        read_mac(&self.buf.as_ref()[offsets::DEST])
    }

    /// Extract the source MAC address.
    #[inline]
    #[must_use]
    pub fn source(&self) -> MacAddr {
        read_mac(&self.buf.as_ref()[offsets::SOURCE])
    }

    /// Extract the length/type field.
    ///
    /// Values up to 1500 are a payload length, values from 1536 upwards are an
    /// [`EtherType`] (IEEE 802.3 clause 3.2.6).
    #[inline]
    #[must_use]
    pub fn length_type(&self) -> LengthType {
        let data = self.buf.as_ref();
        LengthType::new(NetworkEndian::read_u16(&data[offsets::LENGTH_TYPE]))
    }

    /// Everything after the header, padding included.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[offsets::PAYLOAD]
    }

    /// Length of the whole frame in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }
}

/// Writes Ethernet header fields into a buffer in place.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FrameBuilder<B: AsRef<[u8]> + AsMut<[u8]>> {
    buf: B,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FrameBuilder<B> {
    /// # Errors
    ///
    /// Fails when the buffer is shorter than [`HEADER_LEN`].
    #[inline]
    pub fn new(buf: B) -> Result<Self> {
        if buf.as_ref().len() >= HEADER_LEN {
            Ok(Self { buf })
        } else {
            Err(Error::NotEnoughSpace("buffer too small for ethernet header"))
        }
    }

    /// Set the destination MAC address.
    #[inline]
    #[must_use]
    pub fn dest(mut self, dest: MacAddr) -> Self {
        self.buf.as_mut()[offsets::DEST].copy_from_slice(&dest.octets());
        self
    }

    /// Set the source MAC address.
    #[inline]
    #[must_use]
    pub fn source(mut self, source: MacAddr) -> Self {
        self.buf.as_mut()[offsets::SOURCE].copy_from_slice(&source.octets());
        self
    }

    /// Set the length/type field to `ethertype`.
    #[inline]
    #[must_use]
    pub fn ethertype(mut self, ethertype: EtherType) -> Self {
        let data = self.buf.as_mut();
        NetworkEndian::write_u16(&mut data[offsets::LENGTH_TYPE], ethertype.into());
        self
    }

    /// Copy `payload` in after the header. Bytes past the end of `payload`
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Fails when the buffer cannot hold the payload.
    #[inline]
    pub fn payload(mut self, payload: &[u8]) -> Result<Self> {
        let data = &mut self.buf.as_mut()[offsets::PAYLOAD];
        if data.len() < payload.len() {
            return Err(Error::NotEnoughSpace(
                "buffer not large enough to write payload",
            ));
        }
        data[..payload.len()].copy_from_slice(payload);
        Ok(self)
    }

    /// Finish building and return the frame.
    #[inline]
    pub fn build(self) -> Frame<B> {
        Frame { buf: self.buf }
    }
}

mod offsets {
    use std::ops::{Range, RangeFrom};
    pub(crate) const DEST: Range<usize> = 0..6;
    pub(crate) const SOURCE: Range<usize> = 6..12;
    pub(crate) const LENGTH_TYPE: Range<usize> = 12..14;
    pub(crate) const PAYLOAD: RangeFrom<usize> = 14..;
}

fn read_mac(bytes: &[u8]) -> MacAddr {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(bytes);
    MacAddr::from(octets)
}

/// Interpretation of the length/type field.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum LengthType {
    Length(u16),
    Type(EtherType),
    Invalid(u16),
}

impl LengthType {
    #[inline]
    #[must_use]
    pub fn new(value: u16) -> Self {
        match value {
            len if len <= MAX_LENTYPE_LEN => LengthType::Length(len),
            typ if typ >= MIN_LENTYPE_ETHERTYPE => LengthType::Type(typ.into()),
            _ => LengthType::Invalid(value),
        }
    }
}

/// See the [IANA list of EtherType
/// values](https://www.iana.org/assignments/ieee-802-numbers/ieee-802-numbers.xhtml#ieee-802-numbers-1).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum EtherType {
    Arp,
    Ipv4,
    Unknown(u16),
}

impl From<EtherType> for u16 {
    fn from(value: EtherType) -> Self {
        match value {
            EtherType::Arp => ETHERTYPE_ARP,
            EtherType::Ipv4 => ETHERTYPE_IPV4,
            EtherType::Unknown(typ) => typ,
        }
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            ETHERTYPE_ARP => EtherType::Arp,
            ETHERTYPE_IPV4 => EtherType::Ipv4,
            _ => EtherType::Unknown(value),
        }
    }
}

/// Size of the Ethernet header.
pub const HEADER_LEN: usize = 14;

// At or below this the length/type field is a length.
const MAX_LENTYPE_LEN: u16 = 0x5DC;

// At or above this the length/type field is an EtherType.
const MIN_LENTYPE_ETHERTYPE: u16 = 0x600;

pub(crate) const ETHERTYPE_IPV4: u16 = 0x800;
pub(crate) const ETHERTYPE_ARP: u16 = 0x806;

#[cfg(test)]
mod tests {
    use super::{EtherType, Frame, LengthType, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};
    use std::error::Error;

    // Broadcast ARP request header, captured on a home network.
    const ARP_REQUEST_HEADER: [u8; 14] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xbc, 0xd0, 0x74, 0x0d, 0x9c, 0x12, 0x08, 0x06,
    ];

    #[test]
    fn frame_returns_err_when_byte_slice_too_short() {
        let frame = Frame::new(&[0, 0, 0, 0]);
        assert!(frame.is_err());
    }

    #[test]
    fn frame_has_expected_addresses() -> Result<(), Box<dyn Error>> {
        let frame = Frame::new(&ARP_REQUEST_HEADER[..])?;
        assert_eq!(frame.dest(), MacAddr::BROADCAST);
        assert_eq!(frame.source(), MacAddr::new(0xbc, 0xd0, 0x74, 0x0d, 0x9c, 0x12));
        Ok(())
    }

    #[test]
    fn frame_has_expected_length_type() -> Result<(), Box<dyn Error>> {
        let frame = Frame::new(&ARP_REQUEST_HEADER[..])?;
        assert_eq!(frame.length_type(), LengthType::Type(EtherType::Arp));
        assert!(frame.payload().is_empty());
        Ok(())
    }

    #[test]
    fn frame_builder_returns_expected_frame() -> Result<(), Box<dyn Error>> {
        let mut buf = [0; 64];
        let frame = Frame::<&[u8]>::builder(&mut buf[..])?
            .source(MacAddr::zero())
            .dest(MacAddr::new(10, 10, 10, 10, 10, 10))
            .ethertype(EtherType::Ipv4)
            .payload(&[1, 2, 3])?
            .build();

        assert_eq!(frame.source(), MacAddr::zero());
        assert_eq!(frame.dest(), MacAddr::new(10, 10, 10, 10, 10, 10));
        assert_eq!(frame.length_type(), LengthType::Type(EtherType::Ipv4));
        assert_eq!(&frame.payload()[0..5], &[1, 2, 3, 0, 0]);
        Ok(())
    }

    #[test]
    fn frame_builder_rejects_oversized_payload() {
        let mut buf = [0; 16];
        let result = Frame::<&[u8]>::builder(&mut buf[..]).and_then(|b| b.payload(&[0; 3]));
        assert!(result.is_err());
    }

    #[test]
    fn length_type_has_expected_values() {
        assert_eq!(LengthType::new(100), LengthType::Length(100));
        assert_eq!(LengthType::new(ETHERTYPE_IPV4), LengthType::Type(EtherType::Ipv4));
        assert_eq!(LengthType::new(ETHERTYPE_ARP), LengthType::Type(EtherType::Arp));
        assert_eq!(LengthType::new(1550), LengthType::Type(EtherType::Unknown(1550)));
        assert_eq!(LengthType::new(1530), LengthType::Invalid(1530));
    }
}
