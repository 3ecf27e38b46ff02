//! Manufacturer MAC prefixes, from a Wireshark `manuf` style table.
//!
//! Each data line starts with a prefix and a short vendor name separated by
//! whitespace, optionally followed by the long name:
//!
//! ```text
//! 00:16:3E	Xensourc	XenSource, Inc.
//! 3C:22:FB	Apple	Apple, Inc.
//! ```
//!
//! Lines starting with `#` and blank lines are ignored.
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use crate::addr::hex_to_binary;
use crate::{Error, Result};

/// Finds the MAC prefixes registered to a manufacturer.
pub trait VendorLookup {
    /// Every prefix whose vendor name contains `vendor`, ignoring case.
    fn lookup_vendor_macs(&self, vendor: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufEntry {
    pub prefix: String,
    pub vendor: String,
}

/// An in-memory manufacturer table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManufTable {
    entries: Vec<ManufEntry>,
}

impl ManufTable {
    /// # Errors
    ///
    /// Fails when reading from `reader` fails.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut columns = line.split_whitespace();
            if let (Some(prefix), Some(vendor)) = (columns.next(), columns.next()) {
                entries.push(ManufEntry {
                    prefix: prefix.to_string(),
                    vendor: vendor.to_string(),
                });
            }
        }
        log::debug!("loaded {} manufacturer prefixes", entries.len());
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// Fails when the file cannot be opened or read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    #[must_use]
    pub fn entries(&self) -> &[ManufEntry] {
        &self.entries
    }
}

impl std::str::FromStr for ManufTable {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(Cursor::new(text))
    }
}

impl VendorLookup for ManufTable {
    // Prefixes of 17 characters or more are full addresses or carry a mask
    // (`00:1B:C5:00:00:00/36`) and cannot be used as a plain prefix.
    fn lookup_vendor_macs(&self, vendor: &str) -> Vec<String> {
        let wanted = vendor.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.prefix.len() > 1 && entry.prefix.len() < 17)
            .filter(|entry| entry.vendor.to_lowercase().contains(&wanted))
            .map(|entry| entry.prefix.clone())
            .collect()
    }
}

/// Turn a prefix such as `00:16:3E` or `00-16-3e` into octets for
/// [`crate::addr::generate_fake_mac`].
///
/// # Errors
///
/// [`Error::ParseFailure`] when the prefix is not whole hex octets or is
/// longer than a MAC address.
pub fn vendor_prefix_octets(prefix: &str) -> Result<Vec<u8>> {
    let hex: String = prefix
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    let octets = hex_to_binary(&hex).map_err(|_| parse_failure(prefix))?;
    if octets.is_empty() || octets.len() > 6 {
        return Err(parse_failure(prefix));
    }
    Ok(octets)
}

fn parse_failure(prefix: &str) -> Error {
    Error::ParseFailure {
        kind: "vendor prefix",
        input: prefix.to_string(),
    }
}
