//! Run-time diagnostics for allocator exhaustion and misuse.
//!
//! Misuse diagnostics (double free, resizing a block the tracker never handed
//! out) are non-fatal: the offending operation is skipped and the program
//! keeps running, so one run can surface several bugs. Exhaustion of a
//! fail-fast request is fatal: the diagnostic is emitted and the process exits.

use crate::{CallSite, Request};
#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
use colored::Colorize;
use std::fmt;
use std::io::{self, Write};

pub(crate) const PREFIX: &str = "[heapguard]";

/// Exit status used when a fail-fast request cannot be satisfied.
pub const OUT_OF_MEMORY_EXIT_CODE: i32 = 1;

/// A condition detected by the facade.
///
/// The `Display` output contains the call site and a short description, e.g.
/// `src/main.rs:12: freeing unallocated block 0x5581e2a0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    OutOfMemory { site: CallSite, request: Request },
    FreeingUnallocated { site: CallSite, address: usize },
    ReallocatingUnallocated { site: CallSite, address: usize },
}

impl Diagnostic {
    pub fn site(&self) -> CallSite {
        match *self {
            Diagnostic::OutOfMemory { site, .. }
            | Diagnostic::FreeingUnallocated { site, .. }
            | Diagnostic::ReallocatingUnallocated { site, .. } => site,
        }
    }

    /// Whether the process terminates after this diagnostic.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Diagnostic::OutOfMemory { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OutOfMemory { site, request } => {
                write!(f, "{}: out of memory requesting {}", site, request)
            }
            Diagnostic::FreeingUnallocated { site, address } => {
                write!(f, "{}: freeing unallocated block {:#x}", site, address)
            }
            Diagnostic::ReallocatingUnallocated { site, address } => {
                write!(f, "{}: reallocating unallocated block {:#x}", site, address)
            }
        }
    }
}

/// Destination for [`Diagnostic`]s.
///
/// Implementations must not call back into the tracker that emitted the
/// diagnostic.
///
/// # Examples
///
/// ```rust
/// use heapguard::{Diagnostic, Diagnostics, TrackerBuilder};
///
/// struct Silent;
///
/// impl Diagnostics for Silent {
///     fn emit(&self, _diagnostic: &Diagnostic) {}
/// }
///
/// let tracker = TrackerBuilder::new().diagnostics(Box::new(Silent)).build();
/// # let _ = tracker;
/// ```
pub trait Diagnostics: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Writes one line per diagnostic to stderr. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn emit(&self, diagnostic: &Diagnostic) {
        #[cfg(any(feature = "leak-tracking", feature = "clobber"))]
        let prefix = if std::env::var("NO_COLOR").is_err() {
            PREFIX.red().bold().to_string()
        } else {
            PREFIX.to_string()
        };
        // uncolored in the pass-through build
        #[cfg(not(any(feature = "leak-tracking", feature = "clobber")))]
        let prefix = PREFIX;

        // Locked so concurrent diagnostics do not interleave mid-line.
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{} {}", prefix, diagnostic);
        let _ = stderr.flush();
    }
}

/// Routes diagnostics to `tracing`: `error!` for fatal ones, `warn!` otherwise.
#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
impl Diagnostics for TracingDiagnostics {
    fn emit(&self, diagnostic: &Diagnostic) {
        let site = diagnostic.site();
        if diagnostic.is_fatal() {
            tracing::error!(
                target: "heapguard",
                file = site.file,
                line = site.line,
                "{}",
                diagnostic
            );
        } else {
            tracing::warn!(
                target: "heapguard",
                file = site.file,
                line = site.line,
                "{}",
                diagnostic
            );
        }
    }
}

/// Emits the out-of-memory diagnostic and terminates the process.
#[cold]
#[inline(never)]
pub(crate) fn out_of_memory(sink: &dyn Diagnostics, site: CallSite, request: Request) -> ! {
    sink.emit(&Diagnostic::OutOfMemory { site, request });
    std::process::exit(OUT_OF_MEMORY_EXIT_CODE)
}
