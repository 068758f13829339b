//! Strict validation for untrusted database files
//!
//! Loading never checks more than the size arithmetic of the header (see
//! [`crate::format`]); a structurally valid file with unsorted ranges or
//! dangling record offsets loads fine and returns garbage. Callers that do
//! not trust the producer can run the checks here, either directly or by
//! setting [`LocatorOptions::validation`](crate::LocatorOptions::validation).
//!
//! # Usage
//!
//! ```rust,no_run
//! use iploc::validation::{validate_database, ValidationLevel};
//!
//! let report = validate_database("17monipdb.dat", ValidationLevel::Strict)?;
//!
//! if report.is_valid() {
//!     println!("{}", report.stats.summary());
//! } else {
//!     for error in &report.errors {
//!         eprintln!("  ERROR: {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::DecodeError;
use crate::format::{self, Tables, PREFIX_BUCKETS};
use crate::record::{parse_record, ParseOptions, Schema};
use crate::source;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reports stop collecting individual errors after this many
const MAX_REPORTED_ERRORS: usize = 64;

/// Validation strictness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Table structure: sorted ranges, prefix buckets, record bounds
    Standard,
    /// Standard checks plus decoding every record
    Strict,
}

/// Validation report with detailed findings
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that make lookups return wrong answers or fail
    pub errors: Vec<String>,
    /// Suspicious but harmless findings
    pub warnings: Vec<String>,
    /// Informational messages about the database
    pub info: Vec<String>,
    /// Database statistics
    pub stats: DatabaseStats,
    suppressed_errors: usize,
}

/// Statistics gathered during validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Buffer size in bytes
    pub file_size: usize,
    /// Number of ranges
    pub range_count: usize,
    /// Text blob size in bytes
    pub text_bytes: usize,
    /// Records per schema (free, pay, specific); strict level only
    pub schema_counts: [usize; 3],
    /// Whether the last range ends at 255.255.255.255
    pub covers_full_space: bool,
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Ranges: {}, Text: {} KB, Schemas: {} free / {} pay / {} specific, Size: {} KB",
            self.range_count,
            self.text_bytes / 1024,
            self.schema_counts[0],
            self.schema_counts[1],
            self.schema_counts[2],
            self.file_size / 1024
        )
    }
}

impl ValidationReport {
    /// Check if the database passed all validations (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of errors, including ones not individually recorded
    pub fn error_count(&self) -> usize {
        self.errors.len() + self.suppressed_errors
    }

    fn error(&mut self, msg: impl Into<String>) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(msg.into());
        } else {
            self.suppressed_errors += 1;
        }
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }

    /// Convert a failing report into the load error it causes
    pub(crate) fn into_result(self) -> Result<Self, DecodeError> {
        match self.errors.first() {
            None => Ok(self),
            Some(first) => Err(DecodeError::ValidationFailed {
                error_count: self.error_count(),
                first: first.clone(),
            }),
        }
    }
}

/// Validate a database file
pub fn validate_database(
    path: impl AsRef<Path>,
    level: ValidationLevel,
) -> Result<ValidationReport, DecodeError> {
    let data = source::read_database(path)?;
    validate_bytes(&data, level)
}

/// Validate an in-memory database buffer
///
/// Fails only if the buffer cannot be decoded at all; every other problem is
/// reported in the returned report.
pub fn validate_bytes(data: &[u8], level: ValidationLevel) -> Result<ValidationReport, DecodeError> {
    let tables = format::decode(data)?;
    let mut report = validate_tables(&tables, &data[tables.text_start..], level);
    report.stats.file_size = data.len();
    Ok(report)
}

/// Validate decoded tables against their text blob
pub fn validate_tables(tables: &Tables, text: &[u8], level: ValidationLevel) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.stats.range_count = tables.len();
    report.stats.text_bytes = text.len();
    report.info(format!(
        "{} ranges, {} byte text blob",
        tables.len(),
        text.len()
    ));

    if tables.is_empty() {
        report.warning("Database contains no ranges; every lookup will fail");
        return report;
    }

    let sorted = check_sorted(tables, &mut report);
    if sorted {
        check_prefix_index(tables, &mut report);
    } else {
        report.warning("Skipping prefix index checks on unsorted ranges");
    }
    check_record_bounds(tables, text, &mut report);

    report.stats.covers_full_space = tables.range_ends.last() == Some(&u32::MAX);
    if !report.stats.covers_full_space {
        report.warning(
            "Last range does not end at 255.255.255.255; higher addresses map to the last range",
        );
    }

    if level == ValidationLevel::Strict {
        check_records(tables, text, &mut report);
    }

    report
}

fn check_sorted(tables: &Tables, report: &mut ValidationReport) -> bool {
    let mut sorted = true;
    for (i, pair) in tables.range_ends.windows(2).enumerate() {
        if pair[1] < pair[0] {
            sorted = false;
            report.error(format!(
                "Range {} ends at {:#010x}, before range {} ({:#010x})",
                i + 1,
                pair[1],
                i,
                pair[0]
            ));
        } else if pair[1] == pair[0] {
            report.warning(format!(
                "Range {} is empty (same end {:#010x} as range {})",
                i + 1,
                pair[1],
                i
            ));
        }
    }
    sorted
}

/// Every address in bucket `b` must find its owner inside the bucket's bounds
fn check_prefix_index(tables: &Tables, report: &mut ValidationReport) {
    let ends = &tables.range_ends;
    let last = ends.len() - 1;
    let owner = |addr: u32| ends.partition_point(|&end| end < addr).min(last);

    for bucket in 0..PREFIX_BUCKETS {
        let first_addr = (bucket as u32) << 24;
        let last_addr = first_addr | 0x00ff_ffff;
        // Same clamping the search applies.
        let end = if bucket + 1 < PREFIX_BUCKETS {
            (tables.prefix_index[bucket + 1] as usize).min(last)
        } else {
            last
        };
        let start = (tables.prefix_index[bucket] as usize).min(end);
        let first_owner = owner(first_addr);
        let last_owner = owner(last_addr);

        if start > first_owner {
            report.error(format!(
                "Prefix bucket {} starts at range {}, past the owner ({}) of {}.0.0.0",
                bucket, start, first_owner, bucket
            ));
        } else if start < first_owner {
            report.warning(format!(
                "Prefix bucket {} starts {} range(s) early",
                bucket,
                first_owner - start
            ));
        }

        if end < last_owner {
            report.error(format!(
                "Prefix bucket {} ends at range {}, before the owner ({}) of {}.255.255.255",
                bucket, end, last_owner, bucket
            ));
        }
    }
}

fn check_record_bounds(tables: &Tables, text: &[u8], report: &mut ValidationReport) {
    for index in 0..tables.len() {
        let (offset, length) = tables.record_span(index);
        if offset + length > text.len() {
            report.error(format!(
                "Record {} spans {}+{}, beyond text blob of {} bytes",
                index,
                offset,
                length,
                text.len()
            ));
        } else if offset < format::RESERVED_LEN {
            report.warning(format!(
                "Record {} starts inside the reserved area (offset {})",
                index, offset
            ));
        }
    }
}

fn check_records(tables: &Tables, text: &[u8], report: &mut ValidationReport) {
    let options = ParseOptions {
        strict_numeric_fields: true,
    };
    for index in 0..tables.len() {
        let (offset, length) = tables.record_span(index);
        let Some(raw) = text.get(offset..offset + length) else {
            continue;
        };
        match parse_record(raw, options) {
            Ok(record) => {
                let slot = match record.schema {
                    Schema::Free => 0,
                    Schema::Pay => 1,
                    Schema::Specific => 2,
                };
                report.stats.schema_counts[slot] += 1;
            }
            Err(e) => report.error(format!("Record {}: {}", index, e)),
        }
    }

    let mixed = report.stats.schema_counts.iter().filter(|&&n| n > 0).count();
    if mixed > 1 {
        report.warning("Database mixes record schemas");
    }
}
