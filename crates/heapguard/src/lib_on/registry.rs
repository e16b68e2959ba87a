use crate::AllocationRecord;
use std::collections::HashMap;

/// Live blocks of one tracker, keyed by address.
///
/// Holds exactly one record per block currently handed out, and none for
/// anything else. Lookups of unknown addresses never modify the map.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    records: HashMap<usize, AllocationRecord>,
}

impl Registry {
    #[inline]
    pub(crate) fn insert(&mut self, record: AllocationRecord) {
        let previous = self.records.insert(record.address, record);
        debug_assert!(
            previous.is_none(),
            "heap returned live block {:#x} twice",
            record.address
        );
    }

    #[inline]
    pub(crate) fn remove(&mut self, address: usize) -> Option<AllocationRecord> {
        self.records.remove(&address)
    }

    #[inline]
    pub(crate) fn get(&self, address: usize) -> Option<AllocationRecord> {
        self.records.get(&address).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Copy of all records, ordered by address.
    pub(crate) fn snapshot(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<AllocationRecord> = self.records.values().copied().collect();
        records.sort_unstable_by_key(|r| r.address);
        records
    }
}
