use crate::CallSite;

/// One live block handed out by a [`Tracker`](crate::Tracker).
///
/// Created on successful allocation, replaced when the block is resized and
/// removed when it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub address: usize,
    /// Requested size in bytes.
    pub size: usize,
    pub site: CallSite,
}
