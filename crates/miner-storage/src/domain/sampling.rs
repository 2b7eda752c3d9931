//! # Sampling Rules
//!
//! Offset validation and construction of per-item results.

use shared_types::{SampleRequestItem, SampleResponseItem, SampleStatus};

/// Map a requested position onto an object of `size` bytes.
///
/// Returns the byte offset to read, or `OutOfRange` when `position < 0` or
/// `position >= size`.
pub fn resolve_offset(position: i64, size: u64) -> Result<u64, SampleStatus> {
    match u64::try_from(position) {
        Ok(offset) if offset < size => Ok(offset),
        _ => Err(SampleStatus::OutOfRange { position }),
    }
}

/// Result for an item whose object is not retained.
pub fn not_retained(item: &SampleRequestItem) -> SampleResponseItem {
    finish(item, Vec::new(), SampleStatus::NotRetained)
}

/// Result for `item` with the bytes sampled so far.
pub fn finish(item: &SampleRequestItem, sampled_bytes: Vec<u8>, status: SampleStatus) -> SampleResponseItem {
    SampleResponseItem {
        content_id: item.content_id.clone(),
        positions: item.positions.clone(),
        sampled_bytes,
        status,
    }
}
