//! Byte-limited run buffer.

use crate::heap::heap_sort;
use crate::{Record, SortError, RECORD_SIZE};

/// Run buffer builder.
///
/// Translates the run byte budget into a record count once, so every buffer it creates holds at most
/// `run_byte_budget / RECORD_SIZE` records.
#[derive(Debug, Clone)]
pub struct RunBufferBuilder {
    run_byte_budget: u64,
    max_records: usize,
    preallocate: bool,
}

impl RunBufferBuilder {
    /// Creates a buffer builder for the given run byte budget.
    ///
    /// Fails with [`SortError::Configuration`] if the budget cannot hold a single record.
    pub fn new(run_byte_budget: u64) -> Result<Self, SortError> {
        if run_byte_budget < RECORD_SIZE as u64 {
            return Err(SortError::Configuration(format!(
                "run size of {} bytes is smaller than one record ({} bytes)",
                run_byte_budget, RECORD_SIZE
            )));
        }

        let max_records = usize::try_from(run_byte_budget / RECORD_SIZE as u64).unwrap_or(usize::MAX);

        return Ok(RunBufferBuilder {
            run_byte_budget,
            max_records,
            preallocate: false,
        });
    }

    /// Enables allocating the whole buffer upfront instead of growing it on demand.
    pub fn with_preallocation(mut self, preallocate: bool) -> Self {
        self.preallocate = preallocate;
        return self;
    }

    /// Byte budget every run is bounded by.
    pub fn run_byte_budget(&self) -> u64 {
        self.run_byte_budget
    }

    /// Maximum number of records a run holds.
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Creates a new empty buffer.
    pub fn build(&self) -> RunBuffer {
        if self.preallocate {
            RunBuffer::with_capacity(self.max_records)
        } else {
            RunBuffer::new(self.max_records)
        }
    }
}

/// Buffer limited by records count.
#[derive(Debug)]
pub struct RunBuffer {
    limit: usize,
    inner: Vec<Record>,
}

impl RunBuffer {
    pub fn new(limit: usize) -> Self {
        RunBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        RunBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    /// Adds a new record to the buffer.
    pub fn push(&mut self, record: Record) {
        self.inner.push(record);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Sorts buffered records in ascending order using heap sort.
    pub fn sort(&mut self) {
        heap_sort(&mut self.inner);
    }

    /// Removes all records keeping the allocated memory.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.inner
    }
}

impl IntoIterator for RunBuffer {
    type Item = Record;
    type IntoIter = <Vec<Record> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::RunBufferBuilder;
    use crate::{SortError, RECORD_SIZE};

    #[test]
    fn test_run_buffer() {
        let builder = RunBufferBuilder::new(2 * RECORD_SIZE as u64).unwrap();
        let mut buffer = builder.build();

        buffer.push(7);
        assert_eq!(buffer.is_full(), false);
        buffer.push(-1);
        assert_eq!(buffer.is_full(), true);

        buffer.sort();
        assert_eq!(buffer.as_slice(), &[-1, 7]);

        let data = Vec::from_iter(buffer);
        assert_eq!(data, vec![-1, 7]);
    }

    #[rstest]
    #[case(RECORD_SIZE as u64, 1)]
    #[case(RECORD_SIZE as u64 * 3 + 5, 3)]
    #[case(1024 * 1024, 1024 * 1024 / RECORD_SIZE)]
    fn test_max_records(#[case] budget: u64, #[case] expected: usize) {
        let builder = RunBufferBuilder::new(budget).unwrap();
        assert_eq!(builder.max_records(), expected);
        assert_eq!(builder.run_byte_budget(), budget);
    }

    #[rstest]
    #[case(0)]
    #[case(RECORD_SIZE as u64 - 1)]
    fn test_budget_too_small(#[case] budget: u64) {
        assert!(matches!(RunBufferBuilder::new(budget), Err(SortError::Configuration(_))));
    }

    #[rstest]
    #[case(false, 0)]
    #[case(true, 16)]
    fn test_preallocation(#[case] preallocate: bool, #[case] expected_capacity: usize) {
        let builder = RunBufferBuilder::new(16 * RECORD_SIZE as u64)
            .unwrap()
            .with_preallocation(preallocate);

        let buffer = builder.build();

        assert_eq!(buffer.inner.capacity(), expected_capacity);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = RunBufferBuilder::new(RECORD_SIZE as u64).unwrap().build();
        buffer.push(1);
        assert!(buffer.is_full());

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
    }
}
