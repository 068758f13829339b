//! Locator: one immutable generation of the database
//!
//! A [`Locator`] owns the database bytes and the tables decoded from them.
//! It is never mutated after construction; reloading builds a new one (see
//! [`LocatorRegistry`](crate::LocatorRegistry)).
//!
//! # Examples
//!
//! ```no_run
//! use iploc::Locator;
//!
//! let locator = Locator::open("17monipdb.dat")?;
//! let record = locator.find("8.8.8.8")?;
//! println!("{} / {} / {}", record.country, record.region, record.city);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{DecodeError, InvalidAddressError, LookupError, ParseError};
use crate::format::{self, Tables};
use crate::record::{parse_record, LocationRecord, ParseOptions};
use crate::search;
use crate::source::{self, DatabaseSource};
use crate::validation::{self, ValidationLevel, ValidationReport};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Options for loading a locator
///
/// Deserializable so an embedding service can keep it in its own config:
///
/// ```
/// use iploc::LocatorOptions;
///
/// let options = LocatorOptions::from_json_str(r#"{"strict_numeric_fields": true}"#)?;
/// assert!(options.strict_numeric_fields);
/// assert!(options.validation.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorOptions {
    /// Fail lookups whose numeric fields are malformed instead of reading zero
    pub strict_numeric_fields: bool,

    /// Run the validator after decoding and refuse databases that fail it
    pub validation: Option<ValidationLevel>,

    /// Memory-map path sources instead of reading them into the heap
    ///
    /// The file must then not be modified in place while the locator lives;
    /// replace it by renaming a new file over it. Gzip files are always read.
    pub mmap: bool,
}

impl LocatorOptions {
    /// Parse options from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict_numeric_fields: self.strict_numeric_fields,
        }
    }
}

/// Builder for opening a locator with custom configuration
///
/// Created via [`Locator::from_path`] or [`Locator::from_bytes_builder`].
///
/// ```no_run
/// use iploc::{Locator, ValidationLevel};
///
/// let locator = Locator::from_path("17monipdb.dat")
///     .strict_numeric_fields()
///     .validate(ValidationLevel::Standard)
///     .open()?;
/// # Ok::<(), iploc::DecodeError>(())
/// ```
pub struct LocatorOpener {
    source: DatabaseSource,
    options: LocatorOptions,
}

impl LocatorOpener {
    /// Replace all options at once
    pub fn options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject malformed numeric fields at lookup time
    pub fn strict_numeric_fields(mut self) -> Self {
        self.options.strict_numeric_fields = true;
        self
    }

    /// Validate the database before accepting it
    pub fn validate(mut self, level: ValidationLevel) -> Self {
        self.options.validation = Some(level);
        self
    }

    /// Memory-map the file instead of copying it into the heap
    pub fn mmap(mut self) -> Self {
        self.options.mmap = true;
        self
    }

    /// Load the locator
    pub fn open(self) -> Result<Locator, DecodeError> {
        Locator::load(self.source, &self.options)
    }
}

/// Storage for database bytes - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }
}

/// Address span of one range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeInfo {
    /// Range index in the database
    pub index: usize,
    /// First address of the range
    pub first: Ipv4Addr,
    /// Last address of the range (inclusive)
    pub last: Ipv4Addr,
}

/// Size figures for a loaded locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocatorStats {
    /// Number of ranges
    pub ranges: usize,
    /// Size of the text blob in bytes
    pub text_bytes: usize,
    /// Size of the whole database buffer in bytes
    pub buffer_bytes: usize,
}

/// One decoded, immutable database generation
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct Locator {
    data: Storage,
    tables: Tables,
    parse_options: ParseOptions,
}

impl Locator {
    /// Open a database file with default options
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DecodeError> {
        Self::from_path(path).open()
    }

    /// Start configuring a file-backed locator
    pub fn from_path(path: impl Into<PathBuf>) -> LocatorOpener {
        LocatorOpener {
            source: DatabaseSource::Path(path.into()),
            options: LocatorOptions::default(),
        }
    }

    /// Build a locator from an in-memory database with default options
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DecodeError> {
        Self::from_storage(Storage::Owned(data), &LocatorOptions::default())
    }

    /// Start configuring a locator over an in-memory database
    pub fn from_bytes_builder(data: Vec<u8>) -> LocatorOpener {
        LocatorOpener {
            source: DatabaseSource::Bytes(data),
            options: LocatorOptions::default(),
        }
    }

    /// Load a locator from any source
    pub fn load(source: DatabaseSource, options: &LocatorOptions) -> Result<Self, DecodeError> {
        let storage = match source {
            DatabaseSource::Path(path) if options.mmap && !source::is_gzip_path(&path) => {
                let file = File::open(&path).map_err(|e| DecodeError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                // SAFETY: the mapping is read-only; callers are told not to
                // modify the file in place while the locator is alive.
                let mmap = unsafe { Mmap::map(&file) }.map_err(|e| DecodeError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                Storage::Mmap(mmap)
            }
            other => Storage::Owned(other.into_bytes()?),
        };
        Self::from_storage(storage, options)
    }

    fn from_storage(data: Storage, options: &LocatorOptions) -> Result<Self, DecodeError> {
        let tables = format::decode(data.as_slice())?;
        let locator = Self {
            data,
            tables,
            parse_options: options.parse_options(),
        };

        if let Some(level) = options.validation {
            let report = locator.validate(level).into_result()?;
            log::debug!("database validated: {}", report.stats.summary());
        }

        Ok(locator)
    }

    /// Look up an address given as text
    ///
    /// Accepts dotted-quad IPv4 and IPv4-mapped IPv6 (`::ffff:1.2.3.4`).
    pub fn find(&self, addr: &str) -> Result<LocationRecord, LookupError> {
        let addr = parse_address(addr)?;
        self.find_by_u32(addr)
    }

    /// Look up an IPv4 address
    pub fn find_ipv4(&self, addr: Ipv4Addr) -> Result<LocationRecord, LookupError> {
        self.find_by_u32(u32::from(addr))
    }

    /// Look up an address in host integer form
    pub fn find_by_u32(&self, addr: u32) -> Result<LocationRecord, LookupError> {
        let index = search::locate(&self.tables, addr).ok_or(LookupError::EmptyDatabase)?;
        let raw = self.record_bytes(index)?;
        Ok(parse_record(raw, self.parse_options)?)
    }

    /// Range that owns an address
    ///
    /// Addresses above the last stored end belong to the last range, so its
    /// span always reaches 255.255.255.255.
    pub fn range_of(&self, addr: Ipv4Addr) -> Option<RangeInfo> {
        let index = search::locate(&self.tables, u32::from(addr))?;
        let first = match index {
            0 => 0,
            i => self.tables.range_ends[i - 1].saturating_add(1),
        };
        let last = if index + 1 == self.tables.len() {
            u32::MAX
        } else {
            self.tables.range_ends[index]
        };
        Some(RangeInfo {
            index,
            first: Ipv4Addr::from(first),
            last: Ipv4Addr::from(last),
        })
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True if the database holds no ranges
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Size figures
    pub fn stats(&self) -> LocatorStats {
        LocatorStats {
            ranges: self.tables.len(),
            text_bytes: self.text().len(),
            buffer_bytes: self.data.as_slice().len(),
        }
    }

    /// Run the validator over this generation
    pub fn validate(&self, level: ValidationLevel) -> ValidationReport {
        let mut report = validation::validate_tables(&self.tables, self.text(), level);
        report.stats.file_size = self.data.as_slice().len();
        report
    }

    fn text(&self) -> &[u8] {
        &self.data.as_slice()[self.tables.text_start..]
    }

    fn record_bytes(&self, index: usize) -> Result<&[u8], ParseError> {
        let text = self.text();
        let (offset, length) = self.tables.record_span(index);
        text.get(offset..offset + length)
            .ok_or_else(|| ParseError::RecordOutOfBounds {
                index,
                offset,
                length,
                text_len: text.len(),
            })
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match self.data {
            Storage::Owned(_) => "owned",
            Storage::Mmap(_) => "mmap",
        };
        f.debug_struct("Locator")
            .field("storage", &storage)
            .field("stats", &self.stats())
            .field("parse_options", &self.parse_options)
            .finish()
    }
}

/// Parse address text into host integer form
pub fn parse_address(input: &str) -> Result<u32, InvalidAddressError> {
    let invalid = || InvalidAddressError {
        input: input.to_string(),
    };
    match input.parse::<IpAddr>().map_err(|_| invalid())? {
        IpAddr::V4(v4) => Ok(u32::from(v4)),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(u32::from).ok_or_else(invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::test_support::write_database;
    use crate::record::NOT_AVAILABLE;

    fn sample() -> Vec<u8> {
        write_database(&[
            (0x00ff_ffff, "Reserved\t\t\t"),
            (0x0808_07ff, "US\tCA\tLos Angeles\t"),
            (0x0808_08ff, "US\tCA\tMountain View\t\tGoogle"),
            (0x0808_ffff, "CN\t\t\tChinaNet\t1\t2\t3\t4\t5\t"),
            (0xfeff_ffff, "US\tbroken"),
            (u32::MAX, "ZZ\tTop\tEnd\t"),
        ])
    }

    #[test]
    fn test_find_by_text() {
        let locator = Locator::from_bytes(sample()).unwrap();
        let record = locator.find("8.8.8.8").unwrap();
        assert_eq!(record.city, "Mountain View");
        assert_eq!(record.isp, "Google");

        let record = locator.find("8.8.7.255").unwrap();
        assert_eq!(record.city, "Los Angeles");
        assert_eq!(record.isp, NOT_AVAILABLE);
    }

    #[test]
    fn test_find_variants_agree() {
        let locator = Locator::from_bytes(sample()).unwrap();
        let addr = Ipv4Addr::new(8, 8, 9, 1);
        let by_text = locator.find("8.8.9.1").unwrap();
        let by_ip = locator.find_ipv4(addr).unwrap();
        let by_int = locator.find_by_u32(u32::from(addr)).unwrap();
        assert_eq!(by_text, by_ip);
        assert_eq!(by_ip, by_int);
        assert_eq!(by_int.isp, "ChinaNet");
        assert_eq!(by_int.location_id, 5);
    }

    #[test]
    fn test_ipv4_mapped_ipv6_accepted() {
        let locator = Locator::from_bytes(sample()).unwrap();
        let record = locator.find("::ffff:8.8.8.8").unwrap();
        assert_eq!(record.isp, "Google");
    }

    #[test]
    fn test_invalid_addresses() {
        let locator = Locator::from_bytes(sample()).unwrap();
        for input in ["not-an-ip", "", "256.1.1.1", "1.2.3", "2001:db8::1"] {
            match locator.find(input) {
                Err(LookupError::InvalidAddress(e)) => assert_eq!(e.input, input),
                other => panic!("{:?} should be invalid, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_parse_error_is_local_to_lookup() {
        let locator = Locator::from_bytes(sample()).unwrap();
        assert!(matches!(
            locator.find("200.0.0.1"),
            Err(LookupError::Parse(ParseError::UnexpectedSchema { field_count: 2, .. }))
        ));
        // The locator keeps serving other ranges.
        assert_eq!(locator.find("255.255.255.255").unwrap().country, "ZZ");
        assert_eq!(locator.find("8.8.8.8").unwrap().isp, "Google");
    }

    #[test]
    fn test_empty_database() {
        let locator = Locator::from_bytes(write_database(&[])).unwrap();
        assert!(locator.is_empty());
        assert_eq!(locator.find("1.2.3.4"), Err(LookupError::EmptyDatabase));
        assert!(locator.range_of(Ipv4Addr::new(1, 2, 3, 4)).is_none());
    }

    #[test]
    fn test_record_out_of_bounds_is_parse_error() {
        let mut data = write_database(&[(u32::MAX, "US\tCA\tLA\t")]);
        let length_pos = format::MIN_DATABASE_LEN + 7;
        data[length_pos] = 0xff;
        let locator = Locator::from_bytes(data).unwrap();
        assert!(matches!(
            locator.find("1.1.1.1"),
            Err(LookupError::Parse(ParseError::RecordOutOfBounds { index: 0, .. }))
        ));
    }

    #[test]
    fn test_range_of() {
        let locator = Locator::from_bytes(sample()).unwrap();
        let range = locator.range_of(Ipv4Addr::new(8, 8, 8, 8)).unwrap();
        assert_eq!(range.index, 2);
        assert_eq!(range.first, Ipv4Addr::new(8, 8, 8, 0));
        assert_eq!(range.last, Ipv4Addr::new(8, 8, 8, 255));

        let first = locator.range_of(Ipv4Addr::new(0, 0, 0, 0)).unwrap();
        assert_eq!(first.first, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(first.last, Ipv4Addr::new(0, 255, 255, 255));
    }

    #[test]
    fn test_range_of_partial_coverage_contains_address() {
        let data = write_database(&[(0x0000_00ff, "A\tB\tC\t"), (0x7fff_ffff, "D\tE\tF\t")]);
        let locator = Locator::from_bytes(data).unwrap();

        let addr = Ipv4Addr::new(200, 0, 0, 1);
        let range = locator.range_of(addr).unwrap();
        assert_eq!(range.index, 1);
        assert_eq!(range.first, Ipv4Addr::new(0, 0, 1, 0));
        assert_eq!(range.last, Ipv4Addr::BROADCAST);
        assert!(range.first <= addr && addr <= range.last);
        assert_eq!(locator.find_ipv4(addr).unwrap().country, "D");

        // Ranges before the last keep their stored end.
        let head = locator.range_of(Ipv4Addr::new(0, 0, 0, 7)).unwrap();
        assert_eq!(head.last, Ipv4Addr::new(0, 0, 0, 255));
    }

    #[test]
    fn test_strict_numeric_fields_option() {
        let data = write_database(&[(u32::MAX, "CN\tBJ\tBJ\tCU\tx\t2\t3\t4\t5\t")]);

        let lenient = Locator::from_bytes(data.clone()).unwrap();
        assert_eq!(lenient.find("1.1.1.1").unwrap().country_id, 0);

        let strict = Locator::from_bytes_builder(data)
            .strict_numeric_fields()
            .open()
            .unwrap();
        assert!(matches!(
            strict.find("1.1.1.1"),
            Err(LookupError::Parse(ParseError::InvalidNumber {
                field: "country_id",
                ..
            }))
        ));
    }

    #[test]
    fn test_validation_option_rejects_bad_database() {
        let data = write_database(&[(0x0a00_0000, "A\tB\tC\t"), (0x0900_0000, "D\tE\tF\t")]);
        assert!(Locator::from_bytes(data.clone()).is_ok());

        let err = Locator::from_bytes_builder(data)
            .validate(ValidationLevel::Standard)
            .open()
            .unwrap_err();
        assert!(matches!(err, DecodeError::ValidationFailed { error_count: 1, .. }));
    }

    #[test]
    fn test_decode_error_surfaces() {
        assert!(matches!(
            Locator::from_bytes(vec![0u8; 16]),
            Err(DecodeError::TooShort { len: 16, .. })
        ));
    }

    #[test]
    fn test_stats() {
        let data = sample();
        let len = data.len();
        let locator = Locator::from_bytes(data).unwrap();
        let stats = locator.stats();
        assert_eq!(stats.ranges, 6);
        assert_eq!(stats.buffer_bytes, len);
        assert!(stats.text_bytes > format::RESERVED_LEN);
        assert!(format!("{:?}", locator).contains("owned"));
    }

    #[test]
    fn test_options_from_json() {
        let options =
            LocatorOptions::from_json_str(r#"{"validation": "strict", "mmap": true}"#).unwrap();
        assert_eq!(options.validation, Some(ValidationLevel::Strict));
        assert!(options.mmap);
        assert!(!options.strict_numeric_fields);

        assert_eq!(
            LocatorOptions::from_json_str("{}").unwrap(),
            LocatorOptions::default()
        );
    }

    #[test]
    fn test_parse_address_rejects_surrounding_whitespace() {
        assert_eq!(parse_address("1.2.3.4").unwrap(), 0x0102_0304);
        for input in [" 1.2.3.4", "1.2.3.4\n", "\t1.2.3.4 "] {
            assert_eq!(
                parse_address(input),
                Err(InvalidAddressError {
                    input: input.to_string()
                })
            );
        }
    }
}
