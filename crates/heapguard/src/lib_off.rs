use crate::diagnostics::out_of_memory;
use crate::{
    AllocError, AllocationRecord, CallSite, Diagnostics, Format, LeakReport, LibcHeap, RawHeap,
    Reporter, Request, StderrDiagnostics, Target, MIN_ALIGN,
};
use std::error::Error;
use std::ffi::{c_char, CStr};
use std::io::Write;
use std::mem;
use std::ptr::{self, NonNull};

/// Pass-through allocation facade: forwards to the heap, keeps no records
/// and never clobbers. Exhaustion of a fail-fast request still terminates
/// the process with a diagnostic.
pub struct Tracker<H: RawHeap = LibcHeap> {
    heap: H,
    diagnostics: Box<dyn Diagnostics>,
}

impl Default for Tracker<LibcHeap> {
    fn default() -> Self {
        TrackerBuilder::new().build()
    }
}

impl<H: RawHeap> Tracker<H> {
    #[track_caller]
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        self.try_allocate(size)
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    #[inline]
    pub fn try_allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.heap.malloc(size.max(1)).ok_or(AllocError {
            request: Request::Bytes(size),
        })
    }

    #[track_caller]
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        self.try_allocate_zeroed(count, size)
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    pub fn try_allocate_zeroed(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        let request = Request::elements(count, size);
        match request.bytes() {
            Some(0) => self.heap.calloc(1, 1),
            Some(_) => self.heap.calloc(count, size),
            None => None,
        }
        .ok_or(AllocError { request })
    }

    /// # Safety
    ///
    /// `ptr` must be `None` or a live block from this tracker, and must not be
    /// used after a successful call unless it is the returned pointer.
    #[track_caller]
    pub unsafe fn reallocate(&self, ptr: impl Into<Option<NonNull<u8>>>, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        unsafe { self.try_reallocate(ptr, size) }
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    /// # Safety
    ///
    /// See [`reallocate`](Self::reallocate).
    pub unsafe fn try_reallocate(
        &self,
        ptr: impl Into<Option<NonNull<u8>>>,
        size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        unsafe { self.heap.realloc(ptr.into(), size.max(1)) }.ok_or(AllocError {
            request: Request::Bytes(size),
        })
    }

    /// # Safety
    ///
    /// `ptr` must be `None` or a live block from this tracker. Misuse is not
    /// detected in this build.
    pub unsafe fn deallocate(&self, ptr: impl Into<Option<NonNull<u8>>>) {
        if let Some(block) = ptr.into() {
            unsafe { self.heap.free(block) };
        }
    }

    #[track_caller]
    pub fn allocate_typed<T>(&self) -> NonNull<T> {
        const {
            assert!(
                mem::align_of::<T>() <= MIN_ALIGN,
                "type is over-aligned for the heap"
            )
        };
        self.allocate(mem::size_of::<T>()).cast()
    }

    #[track_caller]
    pub fn duplicate_string(&self, s: &CStr) -> NonNull<c_char> {
        let bytes = s.to_bytes_with_nul();
        let block = self.allocate(bytes.len());
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), block.as_ptr(), bytes.len()) };
        block.cast()
    }

    pub fn report_leaks(&self, _out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    pub fn report_leaks_as(&self, _out: &mut dyn Write, _format: Format) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    pub fn leak_report(&self) -> LeakReport {
        LeakReport::default()
    }

    pub fn live_allocations(&self) -> Vec<AllocationRecord> {
        Vec::new()
    }

    pub fn allocation(&self, _ptr: NonNull<u8>) -> Option<AllocationRecord> {
        None
    }

    pub fn is_leak_tracking(&self) -> bool {
        false
    }

    pub fn is_clobbering(&self) -> bool {
        false
    }
}

pub struct TrackerBuilder<H: RawHeap = LibcHeap> {
    heap: H,
    diagnostics: Option<Box<dyn Diagnostics>>,
}

impl TrackerBuilder<LibcHeap> {
    pub fn new() -> Self {
        Self {
            heap: LibcHeap,
            diagnostics: None,
        }
    }
}

impl Default for TrackerBuilder<LibcHeap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RawHeap> TrackerBuilder<H> {
    pub fn heap<H2: RawHeap>(self, heap: H2) -> TrackerBuilder<H2> {
        TrackerBuilder {
            heap,
            diagnostics: self.diagnostics,
        }
    }

    pub fn leak_tracking(self, _enabled: bool) -> Self {
        self
    }

    pub fn clobbering(self, _enabled: bool) -> Self {
        self
    }

    pub fn format(self, _format: Format) -> Self {
        self
    }

    pub fn reporter(self, _reporter: Box<dyn Reporter>) -> Self {
        self
    }

    pub fn diagnostics(mut self, diagnostics: Box<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> Tracker<H> {
        Tracker {
            heap: self.heap,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Box::new(StderrDiagnostics)),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReportGuard {}

impl ReportGuard {
    pub fn new() -> Self {
        Self {}
    }

    pub fn format(self, _format: Format) -> Self {
        self
    }

    pub fn target(self, _target: Target) -> Self {
        self
    }
}
