//! Two-level range search
//!
//! The prefix index narrows the search to the ranges whose bucket matches the
//! address's top octet; a lower-bound binary search over `range_ends` then
//! finds the first range whose inclusive end is at or above the address.
//!
//! Bucket `b` spans `prefix_index[b] ..= prefix_index[b + 1]`. The upper
//! bound is inclusive because a range that straddles the bucket boundary is
//! indexed under the next bucket. Bucket 255 runs to the last range.

use crate::format::{Tables, PREFIX_BUCKETS};

/// Find the range owning `addr`
///
/// Returns `None` only for a database with no ranges. Unsorted tables or a
/// prefix index pointing past the end give a meaningless index, never a
/// panic: both bucket bounds are clamped to the last range.
#[inline]
pub fn locate(tables: &Tables, addr: u32) -> Option<usize> {
    let last = tables.range_ends.len().checked_sub(1)?;
    let bucket = (addr >> 24) as usize;

    let end = if bucket + 1 < PREFIX_BUCKETS {
        (tables.prefix_index[bucket + 1] as usize).min(last)
    } else {
        last
    };
    let start = (tables.prefix_index[bucket] as usize).min(end);

    Some(lower_bound(&tables.range_ends, addr, start, end))
}

/// Binary search `ends[start..=end]` for the first entry `>= addr`
#[inline]
fn lower_bound(ends: &[u32], addr: u32, mut start: usize, mut end: usize) -> usize {
    while start < end {
        let mid = start + (end - start) / 2;
        if addr > ends[mid] {
            start = mid + 1;
        } else {
            end = mid;
        }
    }

    if ends[end] >= addr {
        end
    } else {
        start
    }
}
