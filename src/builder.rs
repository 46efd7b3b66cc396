//! Sorted runs generation.

use std::marker::PhantomData;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log;
use rayon::prelude::*;

use crate::buffer::{RunBuffer, RunBufferBuilder};
use crate::codec::{RunCodec, TextCodec};
use crate::report::{LogObserver, SortObserver};
use crate::run::{Run, RunId};
use crate::{Record, SortError};

/// Run builder. Splits an input records stream into sorted runs bounded by the run byte budget.
///
/// By default runs are sorted and written one at a time on the calling thread. With a thread pool attached the
/// builder accumulates as many full buffers as the pool has threads and sorts and writes them in parallel; peak
/// memory usage is then the number of threads times the run byte budget.
pub struct RunBuilder<C: RunCodec = TextCodec> {
    dir: PathBuf,
    buffer_builder: RunBufferBuilder,
    rw_buf_size: Option<usize>,
    thread_pool: Option<Arc<rayon::ThreadPool>>,
    observer: Arc<dyn SortObserver>,

    codec: PhantomData<fn() -> C>,
}

impl<C: RunCodec> RunBuilder<C> {
    /// Creates a run builder writing runs to `dir`.
    ///
    /// # Arguments
    /// * `dir` - Directory run files are created in
    /// * `buffer_builder` - Builder of byte-limited run buffers
    pub fn new(dir: &Path, buffer_builder: RunBufferBuilder) -> Self {
        RunBuilder {
            dir: dir.to_path_buf(),
            buffer_builder,
            rw_buf_size: None,
            thread_pool: None,
            observer: Arc::new(LogObserver),
            codec: PhantomData,
        }
    }

    /// Sets run file write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: Option<usize>) -> Self {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sets thread pool used to sort and write runs in parallel.
    pub fn with_thread_pool(mut self, thread_pool: Option<Arc<rayon::ThreadPool>>) -> Self {
        self.thread_pool = thread_pool;
        return self;
    }

    /// Sets observer notified about every flushed run.
    pub fn with_observer(mut self, observer: Arc<dyn SortObserver>) -> Self {
        self.observer = observer;
        return self;
    }

    /// Reads all records from the input and splits them into sorted runs.
    /// Returns runs in creation order. An empty input results in no runs.
    ///
    /// The first input or storage error aborts run generation. Runs flushed before the error are left on disk.
    ///
    /// # Arguments
    /// * `input` - Input records stream
    pub fn build_runs<I>(&self, input: I) -> Result<Vec<Run>, SortError>
    where
        I: IntoIterator<Item = Result<Record, SortError>>,
    {
        let mut runs = Vec::new();
        let mut pending = Vec::new();
        let mut buffer = self.buffer_builder.build();

        for record in input.into_iter() {
            buffer.push(record?);

            if buffer.is_full() {
                match &self.thread_pool {
                    None => {
                        let run = self.flush(RunId(runs.len()), &mut buffer)?;
                        runs.push(run);
                        buffer.clear();
                    }
                    Some(thread_pool) => {
                        pending.push(mem::replace(&mut buffer, self.buffer_builder.build()));
                        if pending.len() >= thread_pool.current_num_threads() {
                            self.flush_parallel(thread_pool, &mut pending, &mut runs)?;
                        }
                    }
                }
            }
        }

        if !buffer.is_empty() {
            pending.push(buffer);
        }
        match &self.thread_pool {
            Some(thread_pool) => self.flush_parallel(thread_pool, &mut pending, &mut runs)?,
            None => {
                for mut buffer in pending {
                    let run = self.flush(RunId(runs.len()), &mut buffer)?;
                    runs.push(run);
                }
            }
        }

        log::debug!("run generation done ({} runs)", runs.len());
        self.observer.runs_built(&runs);

        return Ok(runs);
    }

    fn flush(&self, id: RunId, buffer: &mut RunBuffer) -> Result<Run, SortError> {
        let run = self.write_run(id, buffer)?;
        self.observer.run_flushed(&run);
        return Ok(run);
    }

    fn flush_parallel(
        &self,
        thread_pool: &rayon::ThreadPool,
        pending: &mut Vec<RunBuffer>,
        runs: &mut Vec<Run>,
    ) -> Result<(), SortError> {
        let first_id = runs.len();

        log::debug!("sorting {} run buffers in parallel ...", pending.len());
        let flushed = thread_pool.install(|| {
            pending
                .par_iter_mut()
                .enumerate()
                .map(|(offset, buffer)| self.write_run(RunId(first_id + offset), buffer))
                .collect::<Result<Vec<Run>, SortError>>()
        })?;
        pending.clear();

        for run in flushed {
            self.observer.run_flushed(&run);
            runs.push(run);
        }

        return Ok(());
    }

    fn write_run(&self, id: RunId, buffer: &mut RunBuffer) -> Result<Run, SortError> {
        log::trace!("sorting {} ({} records) ...", id, buffer.len());
        buffer.sort();

        Run::write::<C>(
            &self.dir,
            id,
            self.buffer_builder.run_byte_budget(),
            buffer.as_slice(),
            self.rw_buf_size,
        )
    }
}
