//! Location records and the tab-separated record parser
//!
//! Each record in the text blob is a run of tab-separated fields. The field
//! count alone identifies the schema variant:
//!
//! | fields | schema     | layout                                                   |
//! |--------|------------|----------------------------------------------------------|
//! | 4      | `Free`     | country, region, city, (unused)                          |
//! | 5      | `Pay`      | country, region, city, (unused), isp                     |
//! | 10     | `Specific` | country, region, city, isp, 5 numeric ids, (unused)      |
//!
//! Empty text fields become [`NOT_AVAILABLE`].

use crate::error::ParseError;
use memchr::memchr_iter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for text fields the record leaves empty
pub const NOT_AVAILABLE: &str = "N/A";

const FIELD_SEPARATOR: u8 = b'\t';

/// Record layout, identified by field count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// Country, region and city only
    Free,
    /// Adds the ISP name
    Pay,
    /// Adds the ISP name and numeric identifiers
    Specific,
}

impl Schema {
    /// Schema for a given field count
    pub fn from_field_count(count: usize) -> Option<Self> {
        match count {
            4 => Some(Schema::Free),
            5 => Some(Schema::Pay),
            10 => Some(Schema::Specific),
            _ => None,
        }
    }

    /// Number of fields this schema carries
    pub fn field_count(self) -> usize {
        match self {
            Schema::Free => 4,
            Schema::Pay => 5,
            Schema::Specific => 10,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Free => write!(f, "free"),
            Schema::Pay => write!(f, "pay"),
            Schema::Specific => write!(f, "specific"),
        }
    }
}

/// Location of an address range
///
/// Owns all of its data, so it stays valid after the locator that produced
/// it has been replaced or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Country name
    pub country: String,
    /// Region or province name
    pub region: String,
    /// City name
    pub city: String,
    /// Network operator
    pub isp: String,
    /// Country identifier (`Specific` schema only)
    pub country_id: i64,
    /// Province identifier (`Specific` schema only)
    pub province_id: i64,
    /// City identifier (`Specific` schema only)
    pub city_id: i64,
    /// ISP identifier (`Specific` schema only)
    pub isp_id: i64,
    /// Location identifier (`Specific` schema only)
    pub location_id: u64,
    /// Layout the record was decoded from
    pub schema: Schema,
}

impl LocationRecord {
    fn with_text(schema: Schema, country: &[u8], region: &[u8], city: &[u8], isp: &[u8]) -> Self {
        Self {
            country: text_field(country),
            region: text_field(region),
            city: text_field(city),
            isp: text_field(isp),
            country_id: 0,
            province_id: 0,
            city_id: 0,
            isp_id: 0,
            location_id: 0,
            schema,
        }
    }
}

/// Parser knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject malformed numeric fields instead of reading them as zero
    pub strict_numeric_fields: bool,
}

/// Decode one record
pub fn parse_record(raw: &[u8], options: ParseOptions) -> Result<LocationRecord, ParseError> {
    let mut fields: [&[u8]; 10] = [&[]; 10];
    let mut count = 0;
    let mut field_start = 0;
    for pos in memchr_iter(FIELD_SEPARATOR, raw).chain(std::iter::once(raw.len())) {
        if count < fields.len() {
            fields[count] = &raw[field_start..pos];
        }
        count += 1;
        field_start = pos + 1;
    }

    let schema = Schema::from_field_count(count).ok_or_else(|| ParseError::UnexpectedSchema {
        field_count: count,
        record: String::from_utf8_lossy(raw).into_owned(),
    })?;

    let record = match schema {
        Schema::Free => LocationRecord::with_text(schema, fields[0], fields[1], fields[2], &[]),
        Schema::Pay => {
            LocationRecord::with_text(schema, fields[0], fields[1], fields[2], fields[4])
        }
        Schema::Specific => {
            let mut record =
                LocationRecord::with_text(schema, fields[0], fields[1], fields[2], fields[3]);
            record.country_id = numeric_field("country_id", fields[4], options)?;
            record.province_id = numeric_field("province_id", fields[5], options)?;
            record.city_id = numeric_field("city_id", fields[6], options)?;
            record.isp_id = numeric_field("isp_id", fields[7], options)?;
            record.location_id = numeric_field("location_id", fields[8], options)?;
            record
        }
    };

    Ok(record)
}

fn text_field(raw: &[u8]) -> String {
    if raw.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse a decimal field; empty is always zero, garbage is zero unless strict
fn numeric_field<T>(name: &'static str, raw: &[u8], options: ParseOptions) -> Result<T, ParseError>
where
    T: FromStr + Default,
{
    if raw.is_empty() {
        return Ok(T::default());
    }
    let parsed = std::str::from_utf8(raw).ok().and_then(|s| s.parse::<T>().ok());
    match parsed {
        Some(value) => Ok(value),
        None if options.strict_numeric_fields => Err(ParseError::InvalidNumber {
            field: name,
            value: String::from_utf8_lossy(raw).into_owned(),
        }),
        None => Ok(T::default()),
    }
}
