//! External sorter.

use std::fmt;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log;

use crate::buffer::RunBufferBuilder;
use crate::builder::RunBuilder;
use crate::codec::{RunCodec, TextCodec};
use crate::input::{MalformedPolicy, RecordReader};
use crate::merger::KWayMerger;
use crate::report::{LogObserver, SortObserver};
use crate::run::cleanup_runs;
use crate::{Record, SortError};

/// Default run byte budget.
pub const DEFAULT_RUN_SIZE: u64 = 64 * 1024 * 1024;
/// Default number of merged records between two progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
pub struct ExternalSorterBuilder<C = TextCodec>
where
    C: RunCodec,
{
    /// Byte budget of a single run.
    run_size: u64,
    /// Number of threads to be used to sort runs in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Whether run buffers are allocated upfront.
    preallocate: bool,
    /// Handling of non-numeric input tokens.
    malformed_policy: MalformedPolicy,
    /// Number of merged records between two progress notifications.
    progress_interval: u64,
    /// Sorting events observer.
    observer: Arc<dyn SortObserver>,

    /// Run storage format.
    run_codec: PhantomData<fn() -> C>,
}

impl<C> ExternalSorterBuilder<C>
where
    C: RunCodec,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<C>, SortError> {
        if self.progress_interval == 0 {
            return Err(SortError::Configuration("progress interval must be positive".to_string()));
        }

        ExternalSorter::new(
            self.run_size,
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.rw_buf_size,
            self.preallocate,
            self.malformed_policy,
            self.progress_interval,
            self.observer,
        )
    }

    /// Sets byte budget of a single run. Each run holds at most `run_size / RECORD_SIZE` records.
    pub fn with_run_size(mut self, run_size: u64) -> ExternalSorterBuilder<C> {
        self.run_size = run_size;
        return self;
    }

    /// Sets number of threads to be used to sort runs in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder<C> {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<C> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets run read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<C> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Allocates every run buffer upfront instead of growing it on demand.
    pub fn with_preallocation(mut self, preallocate: bool) -> ExternalSorterBuilder<C> {
        self.preallocate = preallocate;
        return self;
    }

    /// Sets handling of non-numeric input tokens.
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> ExternalSorterBuilder<C> {
        self.malformed_policy = policy;
        return self;
    }

    /// Sets number of merged records between two progress notifications.
    pub fn with_progress_interval(mut self, progress_interval: u64) -> ExternalSorterBuilder<C> {
        self.progress_interval = progress_interval;
        return self;
    }

    /// Sets sorting events observer.
    pub fn with_observer(mut self, observer: Arc<dyn SortObserver>) -> ExternalSorterBuilder<C> {
        self.observer = observer;
        return self;
    }
}

impl<C> Default for ExternalSorterBuilder<C>
where
    C: RunCodec,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            run_size: DEFAULT_RUN_SIZE,
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: None,
            preallocate: false,
            malformed_policy: MalformedPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            observer: Arc::new(LogObserver),
            run_codec: PhantomData,
        }
    }
}

/// Sorting outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSummary {
    /// Number of records read from the input.
    pub records_read: u64,
    /// Number of runs created during run generation.
    pub runs_created: usize,
    /// Number of records written to the output.
    pub records_written: u64,
    /// Run generation duration.
    pub run_generation_time: Duration,
    /// Merge duration.
    pub merge_time: Duration,
}

impl fmt::Display for SortSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records sorted using {} runs (run generation: {:?}, merge: {:?})",
            self.records_written, self.runs_created, self.run_generation_time, self.merge_time
        )
    }
}

/// External sorter.
///
/// Splits the input into sorted runs, merges them into the output and removes the runs afterwards.
pub struct ExternalSorter<C = TextCodec>
where
    C: RunCodec,
{
    /// Run sorting thread pool. Runs are sorted sequentially if it is not set.
    thread_pool: Option<Arc<rayon::ThreadPool>>,
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Run buffer builder.
    buffer_builder: RunBufferBuilder,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    malformed_policy: MalformedPolicy,
    progress_interval: u64,
    observer: Arc<dyn SortObserver>,

    /// Run storage format.
    run_codec: PhantomData<fn() -> C>,
}

impl<C> ExternalSorter<C>
where
    C: RunCodec,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `run_size` - Byte budget of a single run. Must fit at least one record.
    /// * `threads_number` - Number of threads to be used to sort runs in parallel. If the parameter is [`None`]
    ///   runs are sorted one by one on the calling thread.
    /// * `tmp_path` - Directory to be used to store temporary data. If parameter is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Input, output and run files read/write buffer size.
    /// * `preallocate` - Whether run buffers are allocated upfront.
    /// * `malformed_policy` - Handling of non-numeric input tokens.
    /// * `progress_interval` - Number of merged records between two progress notifications.
    /// * `observer` - Sorting events observer.
    pub fn new(
        run_size: u64,
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
        preallocate: bool,
        malformed_policy: MalformedPolicy,
        progress_interval: u64,
        observer: Arc<dyn SortObserver>,
    ) -> Result<Self, SortError> {
        let buffer_builder = RunBufferBuilder::new(run_size)?.with_preallocation(preallocate);
        log::info!(
            "run size: {} bytes ({} records per run)",
            buffer_builder.run_byte_budget(),
            buffer_builder.max_records()
        );

        return Ok(ExternalSorter {
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            buffer_builder,
            rw_buf_size,
            malformed_policy,
            progress_interval,
            observer,
            run_codec: PhantomData,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<Option<Arc<rayon::ThreadPool>>, SortError> {
        match threads_number {
            None | Some(1) => {
                log::info!("sorting runs sequentially");
                Ok(None)
            }
            Some(0) => Err(SortError::Configuration("threads number must be positive".to_string())),
            Some(threads_number) => {
                log::info!("initializing thread-pool (threads: {})", threads_number);
                let thread_pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads_number)
                    .build()
                    .map_err(|err| SortError::ThreadPoolBuildError(err))?;

                Ok(Some(Arc::new(thread_pool)))
            }
        }
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Maximum number of records a single run holds.
    pub fn max_records_per_run(&self) -> usize {
        self.buffer_builder.max_records()
    }

    /// Sorts whitespace delimited integers read from the input writing them to the output one per line.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `output` - Output stream sorted data to be written to
    pub fn sort<R, W>(&self, input: R, output: W) -> Result<SortSummary, SortError>
    where
        R: Read,
        W: Write,
    {
        let input = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input),
            None => io::BufReader::new(input),
        };
        let mut records = RecordReader::new(input, self.malformed_policy);

        let mut summary = self.sort_records(&mut records, output)?;
        summary.records_read = records.records_read();

        return Ok(summary);
    }

    /// Sorts records from the input stream writing them to the output one per line.
    ///
    /// Run files live in a work directory of their own that is removed on every exit path. After a successful
    /// merge runs are deleted explicitly.
    ///
    /// # Arguments
    /// * `input` - Input records stream
    /// * `output` - Output stream sorted data to be written to
    pub fn sort_records<I, W>(&self, input: I, output: W) -> Result<SortSummary, SortError>
    where
        I: IntoIterator<Item = Result<Record, SortError>>,
        W: Write,
    {
        let work_dir = tempfile::tempdir_in(self.tmp_dir.path()).map_err(|err| SortError::TempDir(err))?;
        let mut output = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, output),
            None => io::BufWriter::new(output),
        };

        let started = Instant::now();
        let runs = RunBuilder::<C>::new(work_dir.path(), self.buffer_builder.clone())
            .with_rw_buf_size(self.rw_buf_size)
            .with_thread_pool(self.thread_pool.clone())
            .with_observer(self.observer.clone())
            .build_runs(input)?;
        let run_generation_time = started.elapsed();

        let mut summary = SortSummary {
            records_read: runs.iter().map(|run| run.len()).sum(),
            runs_created: runs.len(),
            run_generation_time,
            ..SortSummary::default()
        };

        if runs.is_empty() {
            log::info!("input is empty, nothing to merge");
            output.flush()?;
            return Ok(summary);
        }

        let started = Instant::now();
        summary.records_written = KWayMerger::<C>::new()
            .with_rw_buf_size(self.rw_buf_size)
            .with_progress_interval(self.progress_interval)
            .with_observer(self.observer.clone())
            .merge(&runs, &mut output)?;
        summary.merge_time = started.elapsed();

        let removed = cleanup_runs(&runs)?;
        self.observer.cleanup_completed(removed);

        log::debug!("external sort done: {}", summary);

        return Ok(summary);
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::path::Path;

    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder};
    use crate::codec::RmpCodec;
    use crate::input::MalformedPolicy;
    use crate::{Record, SortError, RECORD_SIZE};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn build_sorter(tmp_dir: &Path, max_records: usize) -> ExternalSorter {
        ExternalSorterBuilder::new()
            .with_run_size((max_records * RECORD_SIZE) as u64)
            .with_tmp_dir(tmp_dir)
            .build()
            .unwrap()
    }

    fn to_text(records: &[Record]) -> String {
        records.iter().map(|record| format!("{}\n", record)).collect()
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[rstest]
    #[case::scenario_a(vec![5, 3, 8, 1, 9, 2], 3, 2, vec![1, 2, 3, 5, 8, 9])]
    #[case::scenario_b(vec![], 3, 0, vec![])]
    #[case::scenario_c(vec![42], 1024, 1, vec![42])]
    #[case::scenario_d(Vec::from_iter(0..1000), 250, 4, Vec::from_iter(0..1000))]
    #[case::scenario_e(vec![3, 1, 3, 2, 3], 2, 3, vec![1, 2, 3, 3, 3])]
    fn test_external_sorter(
        tmp_dir: tempfile::TempDir,
        #[case] input: Vec<Record>,
        #[case] max_records: usize,
        #[case] expected_runs: usize,
        #[case] expected: Vec<Record>,
    ) {
        let sorter = build_sorter(tmp_dir.path(), max_records);
        assert_eq!(sorter.max_records_per_run(), max_records);

        let mut output = Vec::new();
        let summary = sorter.sort(to_text(&input).as_bytes(), &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), to_text(&expected));
        assert_eq!(summary.runs_created, expected_runs);
        assert_eq!(summary.records_read, input.len() as u64);
        assert_eq!(summary.records_written, expected.len() as u64);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(3))]
    fn test_external_sorter_random(tmp_dir: tempfile::TempDir, #[case] threads: Option<usize>) {
        let mut rng = rand::thread_rng();
        let input: Vec<Result<Record, SortError>> = (0..2000).map(|_| Ok(rng.gen_range(-300..300))).collect();
        let mut expected: Vec<Record> = input.iter().map(|record| *record.as_ref().unwrap()).collect();
        expected.sort();

        let mut builder = ExternalSorterBuilder::<RmpCodec>::new()
            .with_run_size(37 * RECORD_SIZE as u64)
            .with_rw_buf_size(128)
            .with_tmp_dir(tmp_dir.path());
        if let Some(threads) = threads {
            builder = builder.with_threads_number(threads);
        }
        let sorter = builder.build().unwrap();

        let mut output = Vec::new();
        let summary = sorter.sort_records(input, &mut output).unwrap();

        let actual: Vec<Record> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| line.parse().unwrap())
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(summary.runs_created, (2000 + 36) / 37);
    }

    #[rstest]
    fn test_runs_removed(tmp_dir: tempfile::TempDir) {
        let sorter = build_sorter(tmp_dir.path(), 4);
        let mut input = Vec::from_iter(0..50);
        input.shuffle(&mut rand::thread_rng());

        sorter.sort(to_text(&input).as_bytes(), io::sink()).unwrap();

        let sorter_dir = std::fs::read_dir(tmp_dir.path()).unwrap().next().unwrap().unwrap().path();
        assert!(is_empty_dir(&sorter_dir));
    }

    #[rstest]
    fn test_malformed_input(tmp_dir: tempfile::TempDir) {
        let sorter = build_sorter(tmp_dir.path(), 2);

        let result = sorter.sort("3\n1\n2\nfoo\n0\n".as_bytes(), io::sink());

        assert!(matches!(result, Err(SortError::MalformedInput { position: 3, .. })));
        let sorter_dir = std::fs::read_dir(tmp_dir.path()).unwrap().next().unwrap().unwrap().path();
        assert!(is_empty_dir(&sorter_dir));
    }

    #[rstest]
    fn test_truncated_input(tmp_dir: tempfile::TempDir) {
        let sorter: ExternalSorter = ExternalSorterBuilder::new()
            .with_run_size(2 * RECORD_SIZE as u64)
            .with_tmp_dir(tmp_dir.path())
            .with_malformed_policy(MalformedPolicy::Truncate)
            .build()
            .unwrap();

        let mut output = Vec::new();
        let summary = sorter.sort("3\n1\n2\nfoo\n0\n".as_bytes(), &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "1\n2\n3\n");
        assert_eq!(summary.records_read, 3);
    }

    #[rstest]
    fn test_truncated_at_leading_integer(tmp_dir: tempfile::TempDir) {
        let sorter: ExternalSorter = ExternalSorterBuilder::new()
            .with_run_size(2 * RECORD_SIZE as u64)
            .with_tmp_dir(tmp_dir.path())
            .with_malformed_policy(MalformedPolicy::Truncate)
            .build()
            .unwrap();

        let mut output = Vec::new();
        let summary = sorter.sort("7 2\n3.5\n4\n".as_bytes(), &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "2\n3\n7\n");
        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.records_written, 3);
    }

    #[rstest]
    fn test_single_line_input(tmp_dir: tempfile::TempDir) {
        let mut input = Vec::from_iter(0..5000);
        input.shuffle(&mut rand::thread_rng());
        let line = input.iter().map(|record| record.to_string()).collect::<Vec<_>>().join(" ");

        let sorter: ExternalSorter = ExternalSorterBuilder::new()
            .with_run_size(300 * RECORD_SIZE as u64)
            .with_rw_buf_size(64)
            .with_preallocation(true)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap();

        let mut output = Vec::new();
        let summary = sorter.sort(line.as_bytes(), &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), to_text(&Vec::from_iter(0..5000)));
        assert_eq!(summary.records_read, 5000);
        assert_eq!(summary.runs_created, (5000 + 299) / 300);
    }

    #[rstest]
    #[case(0)]
    #[case(RECORD_SIZE as u64 - 1)]
    fn test_run_size_too_small(tmp_dir: tempfile::TempDir, #[case] run_size: u64) {
        let result: Result<ExternalSorter, _> = ExternalSorterBuilder::new()
            .with_run_size(run_size)
            .with_tmp_dir(tmp_dir.path())
            .build();

        assert!(matches!(result, Err(SortError::Configuration(_))));
    }

    #[rstest]
    fn test_invalid_threads_and_progress(tmp_dir: tempfile::TempDir) {
        let result: Result<ExternalSorter, _> = ExternalSorterBuilder::new()
            .with_threads_number(0)
            .with_tmp_dir(tmp_dir.path())
            .build();
        assert!(matches!(result, Err(SortError::Configuration(_))));

        let result: Result<ExternalSorter, _> = ExternalSorterBuilder::new()
            .with_progress_interval(0)
            .with_tmp_dir(tmp_dir.path())
            .build();
        assert!(matches!(result, Err(SortError::Configuration(_))));
    }

    #[test]
    fn test_missing_tmp_dir() {
        let result: Result<ExternalSorter, _> = ExternalSorterBuilder::new()
            .with_tmp_dir(Path::new("/nonexistent/heap-ext-sort"))
            .build();

        assert!(matches!(result, Err(SortError::TempDir(_))));
    }
}
