use crate::clobber::clobber;
use crate::diagnostics::{out_of_memory, PREFIX};
use crate::{
    AllocError, AllocationRecord, CallSite, Diagnostic, Diagnostics, Format, LeakReport, LibcHeap,
    RawHeap, Reporter, Request, StderrDiagnostics, Target, MIN_ALIGN,
};
use std::error::Error;
use std::ffi::{c_char, CStr};
use std::io::{self, Write};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

mod registry;
use registry::Registry;

/// Allocation facade that records every live block with its call site.
///
/// Every block handed out is registered under its address. Releasing or
/// resizing an address that is not registered is reported through the
/// installed [`Diagnostics`] sink and otherwise ignored, so misuse never
/// reaches the underlying heap. With clobbering on, fresh memory and memory
/// about to be released are overwritten with the
/// [`CLOBBER_PATTERN`](crate::CLOBBER_PATTERN).
///
/// The registry is created on the first allocation. Its lock is held only
/// while a record is inserted, removed or copied, never across a heap call,
/// so a `Tracker` can be shared between threads.
///
/// # Examples
///
/// ```rust
/// use heapguard::TrackerBuilder;
///
/// let tracker = TrackerBuilder::new().build();
/// let block = tracker.allocate(16);
/// assert_eq!(tracker.live_allocations().len(), 1);
///
/// unsafe { tracker.deallocate(block) };
/// assert!(tracker.live_allocations().is_empty());
/// ```
pub struct Tracker<H: RawHeap = LibcHeap> {
    heap: H,
    registry: OnceLock<Mutex<Registry>>,
    leak_tracking: bool,
    clobbering: bool,
    reporter: Box<dyn Reporter>,
    diagnostics: Box<dyn Diagnostics>,
}

impl Default for Tracker<LibcHeap> {
    fn default() -> Self {
        TrackerBuilder::new().build()
    }
}

impl<H: RawHeap> Tracker<H> {
    /// Allocates `size` uninitialized bytes, terminating the process with a
    /// diagnostic if the heap is exhausted.
    #[track_caller]
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        self.alloc_at(size, site)
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    /// Like [`allocate`](Self::allocate), but hands exhaustion back to the caller.
    #[track_caller]
    pub fn try_allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.alloc_at(size, CallSite::caller())
    }

    /// Allocates `count * size` zeroed bytes. An overflowing product is
    /// treated as exhaustion.
    #[track_caller]
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        self.alloc_zeroed_at(count, size, site)
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    #[track_caller]
    pub fn try_allocate_zeroed(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.alloc_zeroed_at(count, size, CallSite::caller())
    }

    /// Resizes `ptr` to `size` bytes, keeping the common prefix, or allocates
    /// when `ptr` is `None`.
    ///
    /// An address this tracker did not hand out is reported and returned
    /// unchanged.
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after a successful call unless it is the
    /// returned pointer.
    #[track_caller]
    pub unsafe fn reallocate(&self, ptr: impl Into<Option<NonNull<u8>>>, size: usize) -> NonNull<u8> {
        let site = CallSite::caller();
        unsafe { self.realloc_at(ptr.into(), size, site) }
            .unwrap_or_else(|err| out_of_memory(&*self.diagnostics, site, err.request))
    }

    /// Like [`reallocate`](Self::reallocate), but hands exhaustion back to the
    /// caller. On error the original block is still valid.
    ///
    /// # Safety
    ///
    /// See [`reallocate`](Self::reallocate).
    #[track_caller]
    pub unsafe fn try_reallocate(
        &self,
        ptr: impl Into<Option<NonNull<u8>>>,
        size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        unsafe { self.realloc_at(ptr.into(), size, CallSite::caller()) }
    }

    /// Releases a block. `None` is ignored; an address this tracker did not
    /// hand out (or already released) is reported and not released again.
    ///
    /// # Safety
    ///
    /// The block must not be used afterwards.
    #[track_caller]
    pub unsafe fn deallocate(&self, ptr: impl Into<Option<NonNull<u8>>>) {
        let Some(block) = ptr.into() else {
            return;
        };
        let site = CallSite::caller();
        let address = block.as_ptr() as usize;

        let Some(record) = self.untrack(address) else {
            self.diagnostics
                .emit(&Diagnostic::FreeingUnallocated { site, address });
            return;
        };

        if self.clobbering {
            unsafe { clobber(block, 0, record.size) };
        }
        tracing::trace!(target: "heapguard", address, size = record.size, %site, "released");
        unsafe { self.heap.free(block) };
    }

    /// Allocates room for one uninitialized `T`.
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

    /// Copies `s`, terminator included, into a block from this tracker.
    #[track_caller]
    pub fn duplicate_string(&self, s: &CStr) -> NonNull<c_char> {
        let bytes = s.to_bytes_with_nul();
        let block = self.allocate(bytes.len());
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), block.as_ptr(), bytes.len()) };
        block.cast()
    }

    /// Writes the compacted list of live blocks to `out` with the configured
    /// reporter. Does nothing when leak tracking is off. Never modifies the
    /// registry.
    pub fn report_leaks(&self, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
        if !self.leak_tracking {
            return Ok(());
        }
        let leaks = self.leak_report();
        tracing::debug!(target: "heapguard", blocks = leaks.total_blocks, "reporting leaks");
        self.reporter.report(&leaks, out)
    }

    /// [`report_leaks`](Self::report_leaks) with a built-in format instead of
    /// the configured reporter.
    pub fn report_leaks_as(&self, out: &mut dyn Write, format: Format) -> Result<(), Box<dyn Error>> {
        if !self.leak_tracking {
            return Ok(());
        }
        format.reporter().report(&self.leak_report(), out)
    }

    pub fn leak_report(&self) -> LeakReport {
        LeakReport::from_records(self.live_allocations())
    }

    /// Records of all live blocks, ordered by address.
    pub fn live_allocations(&self) -> Vec<AllocationRecord> {
        self.existing_registry()
            .map(|registry| registry.snapshot())
            .unwrap_or_default()
    }

    pub fn allocation(&self, ptr: NonNull<u8>) -> Option<AllocationRecord> {
        self.existing_registry()?.get(ptr.as_ptr() as usize)
    }

    pub fn is_leak_tracking(&self) -> bool {
        self.leak_tracking
    }

    pub fn is_clobbering(&self) -> bool {
        self.clobbering
    }

    fn alloc_at(&self, size: usize, site: CallSite) -> Result<NonNull<u8>, AllocError> {
        let block = self.heap.malloc(size.max(1)).ok_or(AllocError {
            request: Request::Bytes(size),
        })?;
        if self.clobbering {
            unsafe { clobber(block, 0, size) };
        }
        self.track(block, size, site);
        Ok(block)
    }

    fn alloc_zeroed_at(
        &self,
        count: usize,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, AllocError> {
        let request = Request::elements(count, size);
        let Some(bytes) = request.bytes() else {
            return Err(AllocError { request });
        };

        let block = if bytes == 0 {
            self.heap.calloc(1, 1)
        } else {
            self.heap.calloc(count, size)
        }
        .ok_or(AllocError { request })?;

        self.track(block, bytes, site);
        Ok(block)
    }

    unsafe fn realloc_at(
        &self,
        ptr: Option<NonNull<u8>>,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, AllocError> {
        let Some(old) = ptr else {
            return self.alloc_at(size, site);
        };
        let address = old.as_ptr() as usize;

        let Some(record) = self.untrack(address) else {
            self.diagnostics
                .emit(&Diagnostic::ReallocatingUnallocated { site, address });
            return Ok(old);
        };

        if self.clobbering && size < record.size {
            return unsafe { self.shrink_moving(old, record, size, site) };
        }

        match unsafe { self.heap.realloc(Some(old), size.max(1)) } {
            Some(block) => {
                if self.clobbering && size > record.size {
                    unsafe { clobber(block, record.size, size) };
                }
                self.track(block, size, site);
                Ok(block)
            }
            None => {
                // the heap left the old block in place
                self.registry().insert(record);
                Err(AllocError {
                    request: Request::Bytes(size),
                })
            }
        }
    }

    /// Shrinks into a fresh block so that the dropped tail can be clobbered
    /// without touching `old` until the new block exists. The released block
    /// is clobbered whole, like any freed block.
    unsafe fn shrink_moving(
        &self,
        old: NonNull<u8>,
        record: AllocationRecord,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, AllocError> {
        let Some(block) = self.heap.malloc(size.max(1)) else {
            self.registry().insert(record);
            return Err(AllocError {
                request: Request::Bytes(size),
            });
        };

        unsafe {
            ptr::copy_nonoverlapping(old.as_ptr(), block.as_ptr(), size);
            clobber(old, 0, record.size);
            self.heap.free(old);
        }
        self.track(block, size, site);
        Ok(block)
    }

    #[inline]
    fn track(&self, block: NonNull<u8>, size: usize, site: CallSite) {
        let address = block.as_ptr() as usize;
        self.registry().insert(AllocationRecord {
            address,
            size,
            site,
        });
        tracing::trace!(target: "heapguard", address, size, %site, "allocated");
    }

    #[inline]
    fn untrack(&self, address: usize) -> Option<AllocationRecord> {
        self.existing_registry()?.remove(address)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .get_or_init(|| {
                tracing::debug!(target: "heapguard", "allocation registry initialized");
                Mutex::new(Registry::default())
            })
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn existing_registry(&self) -> Option<MutexGuard<'_, Registry>> {
        self.registry
            .get()
            .map(|registry| registry.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

enum ReporterConfig {
    Format(Format),
    Custom(Box<dyn Reporter>),
    None, // HEAPGUARD_FORMAT, then Format::Table
}

/// Builder for a [`Tracker`].
///
/// Leak tracking and clobbering default to the `leak-tracking` and `clobber`
/// cargo features.
///
/// # Examples
///
/// ```rust
/// use heapguard::{Format, TracingDiagnostics, TrackerBuilder};
///
/// let tracker = TrackerBuilder::new()
///     .clobbering(false)
///     .format(Format::Json)
///     .diagnostics(Box::new(TracingDiagnostics))
///     .build();
/// # let _ = tracker;
/// ```
pub struct TrackerBuilder<H: RawHeap = LibcHeap> {
    heap: H,
    leak_tracking: bool,
    clobbering: bool,
    reporter: ReporterConfig,
    diagnostics: Option<Box<dyn Diagnostics>>,
}

impl TrackerBuilder<LibcHeap> {
    pub fn new() -> Self {
        Self {
            heap: LibcHeap,
            leak_tracking: cfg!(feature = "leak-tracking"),
            clobbering: cfg!(feature = "clobber"),
            reporter: ReporterConfig::None,
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
    /// Replaces the underlying heap.
    pub fn heap<H2: RawHeap>(self, heap: H2) -> TrackerBuilder<H2> {
        TrackerBuilder {
            heap,
            leak_tracking: self.leak_tracking,
            clobbering: self.clobbering,
            reporter: self.reporter,
            diagnostics: self.diagnostics,
        }
    }

    /// Whether [`Tracker::report_leaks`] produces output. Misuse detection
    /// stays on either way.
    pub fn leak_tracking(mut self, enabled: bool) -> Self {
        self.leak_tracking = enabled;
        self
    }

    pub fn clobbering(mut self, enabled: bool) -> Self {
        self.clobbering = enabled;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.reporter = ReporterConfig::Format(format);
        self
    }

    /// Custom leak reporter; overrides [`format`](Self::format).
    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = ReporterConfig::Custom(reporter);
        self
    }

    /// Sink for misuse and out-of-memory diagnostics. Default: stderr.
    pub fn diagnostics(mut self, diagnostics: Box<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> Tracker<H> {
        let reporter = match self.reporter {
            ReporterConfig::Format(format) => format.reporter(),
            ReporterConfig::Custom(reporter) => reporter,
            ReporterConfig::None => Format::from_env().unwrap_or_default().reporter(),
        };

        Tracker {
            heap: self.heap,
            registry: OnceLock::new(),
            leak_tracking: self.leak_tracking,
            clobbering: self.clobbering,
            reporter,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Box::new(StderrDiagnostics)),
        }
    }
}

/// Reports the leaks of the default [`tracker`](crate::tracker) when dropped.
///
/// Usually installed by [`#[heapguard::main]`](crate::main) at the top of
/// `main`, so that the report is written after every local of `main` has
/// been dropped.
///
/// # Examples
///
/// ```rust
/// use heapguard::{Format, ReportGuard, Target};
///
/// let _report = ReportGuard::new().format(Format::Json).target(Target::Stdout);
/// ```
#[derive(Debug, Default)]
pub struct ReportGuard {
    format: Option<Format>,
    target: Target,
}

impl ReportGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    fn write_report(&self, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
        let tracker = crate::tracker();
        match self.format {
            Some(format) => tracker.report_leaks_as(out, format)?,
            None => tracker.report_leaks(out)?,
        }
        out.flush()?;
        Ok(())
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        let result = match self.target {
            Target::Stderr => self.write_report(&mut io::stderr().lock()),
            Target::Stdout => self.write_report(&mut io::stdout().lock()),
        };
        if let Err(err) = result {
            eprintln!("{} failed to write leak report: {}", PREFIX, err);
        }
    }
}
