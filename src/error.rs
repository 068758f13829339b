//! Error types for the iploc library
//!
//! Failures are split by where they can happen:
//!
//! - [`DecodeError`]: the database buffer could not be turned into a [`Locator`](crate::Locator).
//!   Only size and offset arithmetic is checked on this path.
//! - [`ParseError`]: one record could not be decoded. Local to a single lookup.
//! - [`InvalidAddressError`]: the caller handed us text that is not an IPv4 address.
//! - [`InitError`] / [`ReloadError`]: a [`DecodeError`] seen while installing a
//!   generation into a [`LocatorRegistry`](crate::LocatorRegistry).

use std::io;
use thiserror::Error;

/// Result type alias for lookups
pub type Result<T> = std::result::Result<T, LookupError>;

/// The database buffer is malformed or truncated
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer cannot even hold the offset word and the prefix index
    #[error("database too small: {len} bytes (need at least {required})")]
    TooShort {
        /// Actual buffer size in bytes
        len: usize,
        /// Minimum required size in bytes
        required: usize,
    },

    /// Text offset lies inside the fixed header, so the range count would be negative
    #[error("text offset {text_offset} underflows the header (minimum {required})")]
    TextOffsetUnderflow {
        /// Text offset read from the first four bytes
        text_offset: u32,
        /// Smallest text offset a valid file can carry
        required: usize,
    },

    /// Text offset points past the end of the buffer
    #[error("text offset {text_offset} points past end of {len}-byte database")]
    TextOffsetOutOfBounds {
        /// Text offset read from the first four bytes
        text_offset: u32,
        /// Actual buffer size in bytes
        len: usize,
    },

    /// The byte source failed before decoding started
    #[error("failed to read {path}")]
    Io {
        /// Path being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Strict validation was requested and the database failed it
    #[error("database failed validation with {error_count} error(s); first: {first}")]
    ValidationFailed {
        /// Number of errors in the report
        error_count: usize,
        /// First error message
        first: String,
    },
}

/// One record could not be decoded into a [`LocationRecord`](crate::LocationRecord)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Field count does not match any known schema variant
    #[error("unexpected record schema with {field_count} field(s): {record:?}")]
    UnexpectedSchema {
        /// Number of tab-separated fields found
        field_count: usize,
        /// The raw record, lossily decoded
        record: String,
    },

    /// A numeric field failed to parse while strict numeric parsing is enabled
    #[error("invalid numeric value {value:?} in field {field}")]
    InvalidNumber {
        /// Field name
        field: &'static str,
        /// Raw field contents
        value: String,
    },

    /// Record span points outside the text blob
    #[error("record {index} spans {offset}+{length}, beyond text blob of {text_len} bytes")]
    RecordOutOfBounds {
        /// Range index
        index: usize,
        /// Record offset within the text blob
        offset: usize,
        /// Record length in bytes
        length: usize,
        /// Text blob size
        text_len: usize,
    },
}

/// Address text that does not describe an IPv4 address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ip format: {input:?}")]
pub struct InvalidAddressError {
    /// The rejected input
    pub input: String,
}

/// A lookup against a locator or registry failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Input was not an IPv4 address
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressError),

    /// Owning record could not be decoded
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Database holds no ranges at all
    #[error("database contains no ranges")]
    EmptyDatabase,

    /// Registry has no active locator yet
    #[error("no locator installed; call initialize first")]
    NotInitialized,
}

/// First installation into a registry failed
#[derive(Debug, Error)]
#[error("failed to initialize locator")]
pub struct InitError(#[from] pub DecodeError);

/// Building a replacement generation failed; the active one is untouched
#[derive(Debug, Error)]
#[error("failed to reload locator")]
pub struct ReloadError(#[from] pub DecodeError);
