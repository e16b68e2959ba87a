//! A debugging facade over the C heap: fail-fast out-of-memory handling,
//! detection of double frees and foreign pointers, leak reports grouped by
//! call site and clobbering of fresh and released memory.
//!
//! ## Setup & Usage
//!
//! ```rust
//! let block = heapguard::allocate(64);
//! unsafe { heapguard::deallocate(block) };
//! ```
//!
//! Instrumentation is selected by cargo features. `leak-tracking` and
//! `clobber` are on by default and pull in the reporting stack. Depend with
//! `default-features = false`, or enable `off`, to compile the pass-through
//! implementation with the same `Tracker` API.

cfg_if::cfg_if! {
    if #[cfg(all(
        any(feature = "leak-tracking", feature = "clobber"),
        not(feature = "off")
    ))] {
        mod lib_on;
        #[doc(inline)]
        pub use lib_on::*;
    } else {
        // Everything is forwarded to the heap; only out-of-memory is diagnosed.
        mod lib_off;
        #[doc(inline)]
        pub use lib_off::*;
    }
}

mod call_site;
pub use call_site::CallSite;

mod heap;
pub use heap::{LibcHeap, RawHeap, MIN_ALIGN};

mod error;
pub use error::{AllocError, Request};

mod diagnostics;
pub use diagnostics::{Diagnostic, Diagnostics, StderrDiagnostics, OUT_OF_MEMORY_EXIT_CODE};
#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
pub use diagnostics::TracingDiagnostics;

#[allow(dead_code)]
mod clobber;
pub use clobber::{is_clobbered, pattern_byte, CLOBBER_PATTERN};

mod record;
pub use record::AllocationRecord;

mod output;
pub use output::{Format, LeakReport, LeakSite, Reporter, Target};
#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
pub use output::{format_bytes, JsonPrettyReporter, JsonReporter, TableReporter};

mod global;
pub use global::{
    allocate, allocate_typed, allocate_zeroed, deallocate, duplicate_string, reallocate,
    report_leaks, tracker, try_allocate, try_allocate_zeroed, try_reallocate,
};

pub use heapguard_macros::main;

#[cfg(test)]
#[allow(dead_code)]
mod testing;
