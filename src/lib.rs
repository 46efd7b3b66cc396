//! `heap-ext-sort` is an external merge sort for integer datasets.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass the input is split into runs bounded by a byte budget, each run is sorted in memory and written to
//! disk. During the second pass all runs are merged together with a k-way merge.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! Both passes are built on a single comparator-driven binary [`Heap`](heap::Heap):
//!
//! * **Run generation:**
//!   records are accumulated in a buffer holding `run_size / RECORD_SIZE` records, every full buffer is sorted
//!   with [`heap_sort`](heap::heap_sort) and written to a run file.
//! * **K-way merge:**
//!   the head record of every run is kept in a min-heap keyed by `(value, run index)`; the minimum is emitted and
//!   replaced by the next record of the same run until all runs are exhausted.
//! * **Run format agnostic:**
//!   runs are stored as text by default, MessagePack storage is available through [`RmpCodec`].
//! * **Multithreading support:**
//!   full run buffers may be sorted and written in parallel.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use std::path;
//!
//! use heap_ext_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = io::BufReader::new(fs::File::open("input.txt")?);
//!     let output = fs::File::create("output.txt")?;
//!
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_run_size(1024 * 1024)
//!         .build()?;
//!
//!     let summary = sorter.sort(input, output)?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod builder;
pub mod codec;
pub mod error;
pub mod heap;
pub mod input;
pub mod merger;
pub mod report;
pub mod run;
pub mod sort;

pub use buffer::{RunBuffer, RunBufferBuilder};
pub use builder::RunBuilder;
pub use codec::{RmpCodec, RunCodec, TextCodec};
pub use error::SortError;
pub use heap::{heap_sort, heap_sort_by, Heap};
pub use input::{MalformedPolicy, RecordReader};
pub use merger::{KWayMerger, RunCursors, RunMerger};
pub use report::{LogObserver, NoopObserver, SortObserver};
pub use run::{cleanup_runs, Run, RunId, RunReader};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortSummary};

/// Sorted record type.
pub type Record = i64;

/// Size of a single record in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<Record>();
