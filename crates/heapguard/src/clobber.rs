//! Memory clobbering: fills fresh and freed blocks with a recognizable
//! non-zero pattern so that reads of uninitialized or released memory
//! misbehave visibly.
//!
//! The pattern is the 16-bit word `1010101001010101`, laid out byte by byte
//! from the start of the block. Filling a sub-range keeps the phase of the
//! whole block, so a block grown by `reallocate` reads as one continuous
//! pattern past its old end.

use std::ptr::NonNull;

/// Bytes of the clobber word, in block order.
pub const CLOBBER_PATTERN: [u8; 2] = [0b1010_1010, 0b0101_0101];

/// Expected clobber byte at `offset` from the start of a block.
#[inline]
pub const fn pattern_byte(offset: usize) -> u8 {
    CLOBBER_PATTERN[offset % CLOBBER_PATTERN.len()]
}

/// Clobbers bytes `start..end` of the block at `block`.
///
/// # Safety
///
/// `block` must be valid for writes of `end` bytes.
#[inline]
pub(crate) unsafe fn clobber(block: NonNull<u8>, start: usize, end: usize) {
    if start >= end {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts_mut(block.as_ptr().add(start), end - start) };
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = pattern_byte(start + i);
    }
}

/// Whether `bytes`, read from the start of a block, are entirely clobbered.
pub fn is_clobbered(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .all(|(offset, &byte)| byte == pattern_byte(offset))
}
