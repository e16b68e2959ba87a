//! The process-wide default [`Tracker`] and free functions forwarding to it.
//!
//! Code that owns its allocation policy should build its own tracker with
//! [`TrackerBuilder`](crate::TrackerBuilder). These functions exist for
//! drop-in use where threading a tracker through is impractical.

use crate::{AllocError, Tracker};
use std::error::Error;
use std::ffi::{c_char, CStr};
use std::io::Write;
use std::ptr::NonNull;
use std::sync::OnceLock;

static TRACKER: OnceLock<Tracker> = OnceLock::new();

/// The default tracker, built on first use from the crate features and the
/// environment.
pub fn tracker() -> &'static Tracker {
    TRACKER.get_or_init(Tracker::default)
}

#[track_caller]
pub fn allocate(size: usize) -> NonNull<u8> {
    tracker().allocate(size)
}

#[track_caller]
pub fn try_allocate(size: usize) -> Result<NonNull<u8>, AllocError> {
    tracker().try_allocate(size)
}

#[track_caller]
pub fn allocate_zeroed(count: usize, size: usize) -> NonNull<u8> {
    tracker().allocate_zeroed(count, size)
}

#[track_caller]
pub fn try_allocate_zeroed(count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
    tracker().try_allocate_zeroed(count, size)
}

/// # Safety
///
/// See [`Tracker::reallocate`].
#[track_caller]
pub unsafe fn reallocate(ptr: impl Into<Option<NonNull<u8>>>, size: usize) -> NonNull<u8> {
    unsafe { tracker().reallocate(ptr, size) }
}

/// # Safety
///
/// See [`Tracker::try_reallocate`].
#[track_caller]
pub unsafe fn try_reallocate(
    ptr: impl Into<Option<NonNull<u8>>>,
    size: usize,
) -> Result<NonNull<u8>, AllocError> {
    unsafe { tracker().try_reallocate(ptr, size) }
}

/// # Safety
///
/// See [`Tracker::deallocate`].
#[track_caller]
pub unsafe fn deallocate(ptr: impl Into<Option<NonNull<u8>>>) {
    unsafe { tracker().deallocate(ptr) }
}

#[track_caller]
pub fn allocate_typed<T>() -> NonNull<T> {
    tracker().allocate_typed::<T>()
}

#[track_caller]
pub fn duplicate_string(s: &CStr) -> NonNull<c_char> {
    tracker().duplicate_string(s)
}

pub fn report_leaks(out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    tracker().report_leaks(out)
}

#[cfg(all(
    test,
    any(feature = "leak-tracking", feature = "clobber"),
    not(feature = "off")
))]
mod tests {
    use super::*;
    use crate::CallSite;

    // Other tests share the default tracker, so only specific blocks are checked.
    #[test]
    fn test_free_functions_keep_caller_location() {
        let line = line!() + 1;
        let block = allocate(40);

        let record = tracker().allocation(block).expect("record");
        assert_eq!(record.site, CallSite::new(file!(), line));
        assert_eq!(record.size, 40);

        let line = line!() + 1;
        let grown = unsafe { reallocate(block, 80) };
        assert_eq!(tracker().allocation(grown).map(|r| r.site.line), Some(line));

        unsafe { deallocate(grown) };
    }

    #[test]
    fn test_default_tracker_is_shared() {
        let copy = duplicate_string(c"shared");
        assert!(std::ptr::eq(tracker(), tracker()));
        assert_eq!(tracker().allocation(copy.cast()).map(|r| r.size), Some(7));
        unsafe { deallocate(copy.cast()) };
    }
}
