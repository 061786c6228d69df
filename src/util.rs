//! Provides common utility functions
use std::sync::{Arc, RwLock};
use crate::error::{Error, Result};

/// Shared Lock used for results handed across threads
pub type ArcLock<T> = Arc<RwLock<T>>;

/// Wraps a value into a new [ArcLock][1].
/// [1]: ./type.ArcLock.html
pub fn new_arclock<T>(value: T) -> ArcLock<T> {
    Arc::new(RwLock::new(value))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// An inclusive range `[low, high]` of record indices assigned to one gradient worker.
pub struct Partition {
    /// First record of the range.
    pub low: usize,
    /// Last record of the range.
    pub high: usize,
}

impl Partition {
    /// Number of records covered.
    pub fn len(&self) -> usize {
        self.high - self.low + 1
    }

    /// A partition always covers at least one record.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Splits the records `0..count` into `parts` contiguous partitions.
///
/// The partitions differ in size by at most one record, the larger ones come first.
/// If more parts than records are requested, one partition per record is returned.
pub fn partition(count: usize, parts: usize) -> Result<Vec<Partition>> {
    if count == 0 {
        return Err(Error::EmptyTrainingSet);
    }
    if parts == 0 {
        return Err(Error::InvalidConfig("cannot split training data into zero partitions".to_owned()));
    }
    let parts = parts.min(count);
    let base = count / parts;
    let remainder = count % parts;

    let mut partitions = Vec::with_capacity(parts);
    let mut low = 0;
    for i in 0..parts {
        let size = base + if i < remainder { 1 } else { 0 };
        partitions.push(Partition { low: low, high: low + size - 1 });
        low += size;
    }
    Ok(partitions)
}

/// Number of logical cores of the host.
pub fn core_count() -> usize {
    num_cpus::get()
}

/// Resolves the configured thread count against the host and the amount of data.
///
/// `0` means one thread per core. Never returns more threads than records, or less than one.
pub fn resolve_threads(threads: usize, records: usize) -> usize {
    let requested = if threads == 0 { core_count() } else { threads };
    requested.min(records).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_complete(count: usize, parts: usize) {
        let partitions = partition(count, parts).unwrap();
        let mut next = 0;
        for p in &partitions {
            assert_eq!(p.low, next, "gap or overlap at {} for {}/{}", next, count, parts);
            assert!(p.high >= p.low);
            next = p.high + 1;
        }
        assert_eq!(next, count);
        let largest = partitions.iter().map(Partition::len).max().unwrap();
        let smallest = partitions.iter().map(Partition::len).min().unwrap();
        assert!(largest - smallest <= 1);
    }

    #[test]
    fn partitions_cover_every_record_once() {
        for count in 1..40 {
            for parts in 1..=count {
                assert_complete(count, parts);
            }
        }
    }

    #[test]
    fn more_parts_than_records_collapses() {
        let partitions = partition(3, 8).unwrap();
        assert_eq!(partitions.len(), 3);
        assert!(partitions.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn empty_data_is_rejected() {
        assert!(matches!(partition(0, 2), Err(Error::EmptyTrainingSet)));
        assert!(matches!(partition(4, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_threads_is_bounded_by_records() {
        assert_eq!(resolve_threads(8, 3), 3);
        assert_eq!(resolve_threads(2, 100), 2);
        assert!(resolve_threads(0, 1000) >= 1);
    }
}
