//! Convert MAC and IPv4 addresses between text, hex and binary.
//!
//! Every function in this module is pure. Text is accepted in the forms
//! people and tools actually print, but always rendered in one canonical
//! form: lowercase, colon separated hex pairs for MAC addresses and dotted
//! decimal for IPv4.
use crate::{Error, Result};
use rand::Rng;
use std::fmt::{self, Debug, Display};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A MAC address.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr {
    octets: [u8; 6],
}

impl MacAddr {
    /// The Ethernet broadcast address, `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddr = MacAddr { octets: [0xff; 6] };

    /// Create a new [`MacAddr`] instance.
    #[inline]
    #[must_use]
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            octets: [a, b, c, d, e, f],
        }
    }

    /// The all-zero address, used for "unknown" hardware addresses in ARP.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self { octets: [0; 6] }
    }

    #[inline]
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.octets
    }

    #[inline]
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.octets == [0xff; 6]
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.octets == [0; 6]
    }

    /// Check the I/G bit of the first octet.
    #[inline]
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.octets[0] & 0x01 != 0
    }

    /// Check the U/L bit of the first octet.
    #[inline]
    #[must_use]
    pub fn is_locally_administered(&self) -> bool {
        self.octets[0] & 0x02 != 0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr { octets }
    }
}

impl From<MacAddr> for [u8; 6] {
    fn from(addr: MacAddr) -> Self {
        addr.octets
    }
}

impl TryFrom<&[u8]> for MacAddr {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        binary_to_mac(bytes)
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_mac(s)
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Parse a MAC address written as six hex pairs.
///
/// The pairs may be separated by colons (`aa:bb:cc:dd:ee:ff`), by dashes
/// (`aa-bb-cc-dd-ee-ff`) or not at all (`aabbccddeeff`). Case is ignored and
/// surrounding whitespace is trimmed.
///
/// # Errors
///
/// Fails with [`Error::ParseFailure`] for any other length or format,
/// including mixed separators.
pub fn parse_mac(text: &str) -> Result<MacAddr> {
    let trimmed = text.trim();
    let failure = || Error::ParseFailure {
        kind: "mac address",
        input: text.to_string(),
    };

    let digits = match trimmed.len() {
        BARE_MAC_LEN => trimmed.to_string(),
        SEPARATED_MAC_LEN => {
            let separator = match trimmed.as_bytes()[2] {
                b':' => ':',
                b'-' => '-',
                _ => return Err(failure()),
            };
            let pairs: Vec<&str> = trimmed.split(separator).collect();
            if pairs.len() != 6 || pairs.iter().any(|pair| pair.len() != 2) {
                return Err(failure());
            }
            pairs.concat()
        }
        _ => return Err(failure()),
    };

    let bytes = hex::decode(digits).map_err(|_| failure())?;
    binary_to_mac(&bytes).map_err(|_| failure())
}

/// Render the canonical text form of a MAC address.
#[inline]
#[must_use]
pub fn mac_to_text(mac: MacAddr) -> String {
    mac.to_string()
}

/// Render a MAC address as 12 bare lowercase hex digits.
#[must_use]
pub fn mac_to_hex(mac: MacAddr) -> String {
    binary_to_hex(&mac.octets)
}

/// The 6-byte wire form of a MAC address.
#[inline]
#[must_use]
pub fn mac_to_binary(mac: MacAddr) -> [u8; 6] {
    mac.octets
}

/// Read a MAC address from its 6-byte wire form.
///
/// # Errors
///
/// Fails with [`Error::ParseFailure`] unless `bytes` is exactly 6 bytes long.
pub fn binary_to_mac(bytes: &[u8]) -> Result<MacAddr> {
    let octets: [u8; 6] = bytes.try_into().map_err(|_| Error::ParseFailure {
        kind: "binary mac address",
        input: format!("{bytes:02x?}"),
    })?;
    Ok(MacAddr::from(octets))
}

/// Decode a string of hex digit pairs into bytes.
///
/// # Errors
///
/// Fails with [`Error::ParseFailure`] when the string has an odd length or
/// contains anything other than hex digits.
pub fn hex_to_binary(hex: &str) -> Result<Vec<u8>> {
    hex::decode(hex).map_err(|_| Error::ParseFailure {
        kind: "hex string",
        input: hex.to_string(),
    })
}

/// Encode bytes as lowercase hex digit pairs.
#[must_use]
pub fn binary_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Check whether `text` is a dotted-quad IPv4 address.
///
/// Exactly four groups of one to three decimal digits, each no larger than
/// 255. Leading zeros are tolerated (`010.0.0.1`), anything else is not.
#[must_use]
pub fn is_ipv4(text: &str) -> bool {
    dotted_octets(text).is_some()
}

/// Parse a dotted-quad IPv4 address using the same rules as [`is_ipv4`].
///
/// # Errors
///
/// Fails with [`Error::ParseFailure`] when [`is_ipv4`] would return `false`.
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    dotted_octets(text)
        .map(Ipv4Addr::from)
        .ok_or_else(|| Error::ParseFailure {
            kind: "ipv4 address",
            input: text.to_string(),
        })
}

/// Prefix forced onto locally administered fake addresses.
pub const FAKE_MAC_PREFIX: [u8; 3] = [0x00, 0x16, 0x3e];

// Upper bound for the random octets of a locally administered fake address.
const FAKE_MAC_OCTET_MAX: u8 = 0x7f;

/// Generate a random MAC address.
///
/// With `locally_administered` the first three octets are always
/// [`FAKE_MAC_PREFIX`] and the rest are drawn from `0..=0x7f`, whatever
/// `vendor_prefix` says. Otherwise the vendor prefix (typically from
/// [`vendor`](crate::vendor)) is kept and padded with random octets. Prefixes
/// longer than 6 octets are truncated.
#[must_use]
pub fn generate_fake_mac(vendor_prefix: Option<&[u8]>, locally_administered: bool) -> MacAddr {
    generate_fake_mac_with(&mut rand::thread_rng(), vendor_prefix, locally_administered)
}

/// Same as [`generate_fake_mac`] with a caller-supplied random source.
pub fn generate_fake_mac_with<R: Rng + ?Sized>(
    rng: &mut R,
    vendor_prefix: Option<&[u8]>,
    locally_administered: bool,
) -> MacAddr {
    let mut octets = [0u8; 6];

    if locally_administered {
        octets[..3].copy_from_slice(&FAKE_MAC_PREFIX);
        for octet in &mut octets[3..] {
            *octet = rng.gen_range(0..=FAKE_MAC_OCTET_MAX);
        }
        return MacAddr::from(octets);
    }

    let prefix = vendor_prefix.unwrap_or_default();
    let kept = prefix.len().min(octets.len());
    octets[..kept].copy_from_slice(&prefix[..kept]);
    rng.fill(&mut octets[kept..]);
    MacAddr::from(octets)
}

const BARE_MAC_LEN: usize = 12;
const SEPARATED_MAC_LEN: usize = 17;

fn dotted_octets(text: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut groups = text.split('.');
    for octet in &mut octets {
        let group = groups.next()?;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = u8::try_from(group.parse::<u16>().ok()?).ok()?;
    }
    if groups.next().is_some() {
        return None;
    }
    Some(octets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn parse_mac_accepts_colon_separated() {
        let mac = parse_mac("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac, MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff));
    }

    #[test]
    fn parse_mac_accepts_dash_separated_uppercase() {
        let mac = parse_mac("00-1A-2b-3C-4d-5E").unwrap();
        assert_eq!(mac, MacAddr::new(0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e));
    }

    #[test]
    fn parse_mac_accepts_bare_hex() {
        let mac = parse_mac("001122334455").unwrap();
        assert_eq!(mac, MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55));
    }

    #[test]
    fn parse_mac_trims_whitespace() {
        assert!(parse_mac("  aa:bb:cc:dd:ee:ff\n").is_ok());
    }

    #[test]
    fn parse_mac_rejects_malformed_input() {
        for input in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa:bb-cc:dd:ee:ff",
            "aa:bb:cc:dd:ee:fg",
            "aabbccddeef",
            "aabbccddeeffa",
            "+a:bb:cc:dd:ee:ff",
            "a:bb:cc:dd:ee:fff",
            "aa.bb.cc.dd.ee.ff",
        ] {
            assert!(
                matches!(parse_mac(input), Err(Error::ParseFailure { .. })),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn text_round_trip_gives_canonical_form() {
        for (input, canonical) in [
            ("AA:BB:CC:DD:EE:FF", "aa:bb:cc:dd:ee:ff"),
            ("00-0a-14-05-28-32", "00:0a:14:05:28:32"),
            ("deadbeef0001", "de:ad:be:ef:00:01"),
        ] {
            let binary = mac_to_binary(parse_mac(input).unwrap());
            let text = mac_to_text(binary_to_mac(&binary).unwrap());
            assert_eq!(text, canonical);
        }
    }

    #[test]
    fn binary_to_mac_rejects_wrong_length() {
        assert!(binary_to_mac(&[1, 2, 3, 4, 5]).is_err());
        assert!(binary_to_mac(&[1, 2, 3, 4, 5, 6, 7]).is_err());
    }

    #[test]
    fn macaddr_fmt_gives_expected_value() {
        let addr = MacAddr::new(0, 10, 20, 5, 40, 50);
        assert_eq!(addr.to_string(), "00:0a:14:05:28:32");
        assert_eq!(format!("{addr:?}"), "00:0a:14:05:28:32");
    }

    #[test]
    fn mac_to_hex_strips_separators() {
        let mac = MacAddr::new(0xaa, 0xbb, 0xcc, 0x00, 0x01, 0x02);
        assert_eq!(mac_to_hex(mac), "aabbcc000102");
        assert_eq!(hex_to_binary("aabbcc000102").unwrap(), mac.octets());
    }

    #[test]
    fn hex_to_binary_rejects_odd_length_and_junk() {
        assert!(hex_to_binary("abc").is_err());
        assert!(matches!(
            hex_to_binary("zz"),
            Err(Error::ParseFailure { kind: "hex string", .. })
        ));
    }

    #[test]
    fn hex_helpers_accept_either_case_and_emit_lowercase() {
        assert_eq!(hex_to_binary("3C22fB").unwrap(), [0x3c, 0x22, 0xfb]);
        assert_eq!(binary_to_hex(&[0x3c, 0x22, 0xfb]), "3c22fb");
        assert_eq!(binary_to_hex(&[]), "");
    }

    #[test]
    fn is_ipv4_matches_dotted_quads() {
        assert!(is_ipv4("192.168.1.1"));
        assert!(is_ipv4("0.0.0.0"));
        assert!(is_ipv4("255.255.255.255"));
        assert!(is_ipv4("010.0.0.1"));
    }

    #[test]
    fn is_ipv4_rejects_everything_else() {
        for input in [
            "192.168.1.256",
            "abc",
            "1.2.3",
            "1.2.3.4.5",
            "1.2.3.4 ",
            " 1.2.3.4",
            "1..3.4",
            "1.2.3.+4",
            "1.2.3.0004",
            "",
        ] {
            assert!(!is_ipv4(input), "{input:?} should not be an ipv4 address");
        }
    }

    #[test]
    fn parse_ipv4_returns_address() {
        assert_eq!(parse_ipv4("10.0.0.5").unwrap(), Ipv4Addr::new(10, 0, 0, 5));
        assert!(parse_ipv4("10.0.0").is_err());
    }

    #[test]
    fn fake_mac_locally_administered_has_fixed_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..256 {
            let octets = generate_fake_mac_with(&mut rng, Some(&[0xaa, 0xbb]), true).octets();
            assert_eq!(octets[..3], FAKE_MAC_PREFIX);
            assert!(octets[3..].iter().all(|&o| o <= 0x7f));
        }
    }

    #[test]
    fn fake_mac_keeps_vendor_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        let mac = generate_fake_mac_with(&mut rng, Some(&[0x00, 0x50, 0x56]), false);
        assert_eq!(mac.octets()[..3], [0x00, 0x50, 0x56]);
    }

    #[test]
    fn fake_mac_truncates_long_prefix() {
        let mac = generate_fake_mac(Some(&[1, 2, 3, 4, 5, 6, 7, 8]), false);
        assert_eq!(mac, MacAddr::new(1, 2, 3, 4, 5, 6));
    }

    #[test]
    fn fake_mac_without_prefix_is_random() {
        let mut rng = StdRng::seed_from_u64(1);
        let first = generate_fake_mac_with(&mut rng, None, false);
        let second = generate_fake_mac_with(&mut rng, None, false);
        assert_ne!(first, second);
    }
}
