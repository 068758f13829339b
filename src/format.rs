//! Binary database layout and decoder
//!
//! ```text
//! ┌───────────────────────────────────────────────┐ 0
//! │ text offset (u32, big-endian)                 │
//! ├───────────────────────────────────────────────┤ 4
//! │ prefix index: 256 × u32 little-endian         │
//! ├───────────────────────────────────────────────┤ 1028
//! │ N × 8-byte entries                            │
//! │   [0..4) range end   (u32, big-endian)        │
//! │   [4..7) record offset (u24, little-endian)   │
//! │   [7]    record length (u8)                   │
//! ├───────────────────────────────────────────────┤ text offset - 1024
//! │ text blob (first 1024 bytes reserved)         │
//! └───────────────────────────────────────────────┘ end
//! ```
//!
//! `N = (text offset - 4 - 1024 - 1024) / 8`. Record offsets are relative to
//! the start of the text blob, so the reserved kilobyte is addressable but
//! never referenced by well-formed files.
//!
//! Decoding only guards the arithmetic above. Sortedness and record bounds
//! are trusted; see [`crate::validation`] for the checks we skip here.

use crate::error::DecodeError;
use zerocopy::byteorder::{BigEndian, LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the leading text-offset word
pub const OFFSET_WORD_LEN: usize = 4;

/// Number of prefix buckets (one per top octet)
pub const PREFIX_BUCKETS: usize = 256;

/// Size of the prefix index in bytes
pub const PREFIX_INDEX_LEN: usize = PREFIX_BUCKETS * 4;

/// Reserved bytes at the head of the text blob
pub const RESERVED_LEN: usize = 1024;

/// Size of one range entry
pub const ENTRY_LEN: usize = 8;

/// Smallest buffer that can hold the offset word and prefix index
pub const MIN_DATABASE_LEN: usize = OFFSET_WORD_LEN + PREFIX_INDEX_LEN;

/// Smallest legal text offset (zero ranges)
pub const MIN_TEXT_OFFSET: usize = OFFSET_WORD_LEN + PREFIX_INDEX_LEN + RESERVED_LEN;

/// One on-disk range entry (8 bytes, no alignment requirement)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RangeEntry {
    /// Last address covered by the range
    pub end: U32<BigEndian>,
    /// Record offset into the text blob, 24-bit little-endian
    pub offset: [u8; 3],
    /// Record length in bytes
    pub length: u8,
}

impl RangeEntry {
    /// Record offset as a native integer
    #[inline]
    pub fn record_offset(&self) -> u32 {
        u32::from(self.offset[0]) | u32::from(self.offset[1]) << 8 | u32::from(self.offset[2]) << 16
    }
}

/// Decoded lookup tables
///
/// The three per-range sequences are parallel: entry `i` of each describes
/// range `i`. The text blob itself stays in the caller's buffer, starting at
/// `text_start`.
#[derive(Debug, Clone)]
pub struct Tables {
    /// `prefix_index[b]` is the first range index for top octet `b`
    pub prefix_index: Box<[u32; PREFIX_BUCKETS]>,
    /// Inclusive last address of each range, non-decreasing in valid files
    pub range_ends: Vec<u32>,
    /// Record offsets relative to the text blob
    pub record_offsets: Vec<u32>,
    /// Record lengths in bytes
    pub record_lengths: Vec<u8>,
    /// Byte position of the text blob in the source buffer
    pub text_start: usize,
}

impl Tables {
    /// Number of ranges
    #[inline]
    pub fn len(&self) -> usize {
        self.range_ends.len()
    }

    /// True when the database holds no ranges
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range_ends.is_empty()
    }

    /// Record span `(offset, length)` of range `index`
    #[inline]
    pub fn record_span(&self, index: usize) -> (usize, usize) {
        (
            self.record_offsets[index] as usize,
            self.record_lengths[index] as usize,
        )
    }
}

/// Read the big-endian text offset word
pub fn read_text_offset(data: &[u8]) -> Result<u32, DecodeError> {
    let (word, _) = U32::<BigEndian>::read_from_prefix(data).map_err(|_| DecodeError::TooShort {
        len: data.len(),
        required: MIN_DATABASE_LEN,
    })?;
    Ok(word.get())
}

/// Decode a database buffer into lookup tables
pub fn decode(data: &[u8]) -> Result<Tables, DecodeError> {
    if data.len() < MIN_DATABASE_LEN {
        return Err(DecodeError::TooShort {
            len: data.len(),
            required: MIN_DATABASE_LEN,
        });
    }

    let text_offset = read_text_offset(data)?;
    let text_offset_usize = text_offset as usize;
    if text_offset_usize < MIN_TEXT_OFFSET {
        return Err(DecodeError::TextOffsetUnderflow {
            text_offset,
            required: MIN_TEXT_OFFSET,
        });
    }

    let text_start = text_offset_usize - RESERVED_LEN;
    if text_start > data.len() {
        return Err(DecodeError::TextOffsetOutOfBounds {
            text_offset,
            len: data.len(),
        });
    }

    let prefix =
        <[U32<LittleEndian>]>::ref_from_bytes(&data[OFFSET_WORD_LEN..MIN_DATABASE_LEN])
            .unwrap_or_default();
    debug_assert_eq!(prefix.len(), PREFIX_BUCKETS);
    let mut prefix_index = Box::new([0u32; PREFIX_BUCKETS]);
    for (slot, value) in prefix_index.iter_mut().zip(prefix) {
        *slot = value.get();
    }

    // A trailing remainder shorter than one entry is ignored.
    let count = (text_offset_usize - MIN_TEXT_OFFSET) / ENTRY_LEN;
    let entries_end = MIN_DATABASE_LEN + count * ENTRY_LEN;
    // entries_end <= text_start <= data.len(), so the view always succeeds.
    let entries =
        <[RangeEntry]>::ref_from_bytes(&data[MIN_DATABASE_LEN..entries_end]).unwrap_or_default();
    debug_assert_eq!(entries.len(), count);

    let mut range_ends = Vec::with_capacity(count);
    let mut record_offsets = Vec::with_capacity(count);
    let mut record_lengths = Vec::with_capacity(count);
    for entry in entries {
        range_ends.push(entry.end.get());
        record_offsets.push(entry.record_offset());
        record_lengths.push(entry.length);
    }

    Ok(Tables {
        prefix_index,
        range_ends,
        record_offsets,
        record_lengths,
        text_start,
    })
}
