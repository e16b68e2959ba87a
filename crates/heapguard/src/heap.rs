//! The underlying allocator the facade delegates to.
//!
//! [`RawHeap`] has C heap semantics: blocks are released without telling the
//! heap their size, and a failed request is reported as `None` instead of a
//! null pointer. [`LibcHeap`] forwards to the platform `malloc` family and is
//! the default for [`Tracker`](crate::Tracker).

use std::ffi::c_void;
use std::mem;
use std::ptr::{self, NonNull};

/// Alignment guaranteed by the platform `malloc` for every block.
pub const MIN_ALIGN: usize = 2 * mem::size_of::<usize>();

/// A C-style heap.
///
/// # Safety
///
/// Implementations must return blocks aligned to at least [`MIN_ALIGN`] that
/// are valid for reads and writes of the requested size, and must keep a block
/// valid until it is passed to [`RawHeap::free`] or [`RawHeap::realloc`].
pub unsafe trait RawHeap: Send + Sync {
    fn malloc(&self, size: usize) -> Option<NonNull<u8>>;

    /// Zero-filled block of `count * size` bytes. Implementations must fail
    /// (not wrap) when the product overflows.
    fn calloc(&self, count: usize, size: usize) -> Option<NonNull<u8>>;

    /// Resizes `ptr` to `size` bytes, or allocates when `ptr` is `None`.
    /// On failure the original block is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block from this heap.
    unsafe fn realloc(&self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must be a live block from this heap.
    unsafe fn free(&self, ptr: NonNull<u8>);
}

/// The platform heap, through `libc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcHeap;

unsafe impl RawHeap for LibcHeap {
    #[inline]
    fn malloc(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { libc::malloc(size) }.cast())
    }

    #[inline]
    fn calloc(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        // not every libc checks the product
        count.checked_mul(size)?;
        NonNull::new(unsafe { libc::calloc(count, size) }.cast())
    }

    #[inline]
    unsafe fn realloc(&self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        let old = ptr.map_or(ptr::null_mut(), |p| p.as_ptr().cast::<c_void>());
        NonNull::new(unsafe { libc::realloc(old, size) }.cast())
    }

    #[inline]
    unsafe fn free(&self, ptr: NonNull<u8>) {
        unsafe { libc::free(ptr.as_ptr().cast()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_libc_heap_roundtrip() {
        let heap = LibcHeap;
        let block = heap.malloc(32).expect("malloc");
        assert_eq!(block.as_ptr() as usize % MIN_ALIGN, 0);

        unsafe {
            ptr::write_bytes(block.as_ptr(), 7, 32);
            let grown = heap.realloc(Some(block), 64).expect("realloc");
            assert_eq!(std::slice::from_raw_parts(grown.as_ptr(), 32), &[7u8; 32][..]);
            heap.free(grown);
        }
    }

    #[test]
    fn test_libc_calloc_zeroes_and_rejects_overflow() {
        let heap = LibcHeap;
        let block = heap.calloc(4, 8).expect("calloc");
        unsafe {
            assert!(std::slice::from_raw_parts(block.as_ptr(), 32)
                .iter()
                .all(|&b| b == 0));
            heap.free(block);
        }

        assert!(heap.calloc(usize::MAX, 2).is_none());
    }

    #[test]
    fn test_libc_heap_reports_exhaustion() {
        assert!(LibcHeap.malloc(isize::MAX as usize).is_none());
    }
}
