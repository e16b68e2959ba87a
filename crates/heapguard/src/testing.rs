//! Heaps and sinks for unit tests.

use crate::{Diagnostic, Diagnostics, LibcHeap, RawHeap};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

/// A heap that cannot satisfy any request.
pub(crate) struct ExhaustedHeap;

unsafe impl RawHeap for ExhaustedHeap {
    fn malloc(&self, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    fn calloc(&self, _count: usize, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn realloc(&self, _ptr: Option<NonNull<u8>>, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn free(&self, _ptr: NonNull<u8>) {
        unreachable!("nothing was ever allocated");
    }
}

/// The libc heap, except that released blocks stay mapped until the heap is
/// dropped, so a test may read through a dangling pointer.
#[derive(Default)]
pub(crate) struct QuarantineHeap {
    released: Mutex<Vec<usize>>,
}

impl QuarantineHeap {
    pub(crate) fn released(&self) -> usize {
        self.released.lock().unwrap().len()
    }
}

unsafe impl RawHeap for QuarantineHeap {
    fn malloc(&self, size: usize) -> Option<NonNull<u8>> {
        LibcHeap.malloc(size)
    }

    fn calloc(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        LibcHeap.calloc(count, size)
    }

    unsafe fn realloc(&self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        unsafe { LibcHeap.realloc(ptr, size) }
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.released.lock().unwrap().push(ptr.as_ptr() as usize);
    }
}

impl Drop for QuarantineHeap {
    fn drop(&mut self) {
        for address in self.released.get_mut().unwrap().drain(..) {
            if let Some(ptr) = NonNull::new(address as *mut u8) {
                unsafe { LibcHeap.free(ptr) };
            }
        }
    }
}

/// Collects diagnostics; clones share the same buffer.
#[derive(Clone, Default)]
pub(crate) struct CapturedDiagnostics(Arc<Mutex<Vec<Diagnostic>>>);

impl CapturedDiagnostics {
    pub(crate) fn taken(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Diagnostics for CapturedDiagnostics {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.0.lock().unwrap().push(diagnostic.clone());
    }
}
