//! K-way runs merger.

use std::cmp::Ordering;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;

use log;

use crate::codec::{RunCodec, TextCodec};
use crate::heap::Heap;
use crate::report::{LogObserver, SortObserver};
use crate::run::{Run, RunReader};
use crate::{Record, SortError};

/// Current head record of a source together with the source index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    value: Record,
    source: usize,
}

/// Orders candidates by value, equal values by source index.
fn candidate_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.value.cmp(&b.value).then(a.source.cmp(&b.source))
}

/// Binary heap merger implementation.
/// Merges multiple sorted sources into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of records,
/// *n* is the number of sources.
///
/// Equal records coming from different sources are emitted in ascending source order.
pub struct RunMerger<I>
where
    I: Iterator<Item = Result<Record, SortError>>,
{
    candidates: Heap<Candidate, fn(&Candidate, &Candidate) -> Ordering>,
    sources: Vec<I>,
    // refill failure reported on the call following the record it was read for
    deferred_error: Option<SortError>,
    failed: bool,
}

impl<I> RunMerger<I>
where
    I: Iterator<Item = Result<Record, SortError>>,
{
    /// Creates a merger over sources sorted in ascending order, otherwise the result is undefined.
    /// Reads the first record of every source.
    ///
    /// Fails with [`SortError::InvalidState`] if no sources are provided.
    ///
    /// # Arguments
    /// * `sources` - Sorted sources to be merged in a single sorted one
    pub fn new<S>(sources: S) -> Result<Self, SortError>
    where
        S: IntoIterator<Item = I>,
    {
        let mut sources = Vec::from_iter(sources);
        if sources.is_empty() {
            return Err(SortError::InvalidState("nothing to merge: no runs provided".to_string()));
        }

        let mut candidates = Heap::with_capacity_by(
            sources.len(),
            candidate_order as fn(&Candidate, &Candidate) -> Ordering,
        );
        for (source, records) in sources.iter_mut().enumerate() {
            if let Some(value) = records.next() {
                candidates.insert(Candidate { value: value?, source });
            }
        }

        return Ok(RunMerger {
            candidates,
            sources,
            deferred_error: None,
            failed: false,
        });
    }

    fn refill(&mut self, source: usize) -> Result<(), SortError> {
        if let Some(value) = self.sources[source].next() {
            self.candidates.insert(Candidate { value: value?, source });
        }
        Ok(())
    }

    fn fail(&mut self, err: SortError) -> Option<Result<Record, SortError>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl<I> Iterator for RunMerger<I>
where
    I: Iterator<Item = Result<Record, SortError>>,
{
    type Item = Result<Record, SortError>;

    /// Returns the next record from the sources in ascending order.
    /// After the first error the merger yields nothing.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(err) = self.deferred_error.take() {
            return self.fail(err);
        }
        if self.candidates.is_empty() {
            return None;
        }

        let top = match self.candidates.extract_top() {
            Ok(top) => top,
            Err(err) => return self.fail(err),
        };
        if let Err(err) = self.refill(top.source) {
            self.deferred_error = Some(err);
        }

        return Some(Ok(top.value));
    }
}

/// Read cursors of all merged runs.
///
/// Cursors are opened together and owned by the set, so they are all closed whenever the set goes out of scope,
/// including when opening one of them fails.
pub struct RunCursors<C: RunCodec> {
    readers: Vec<RunReader<C>>,
}

impl<C: RunCodec> RunCursors<C> {
    /// Opens a cursor for every run.
    pub fn open(runs: &[Run], buf_size: Option<usize>) -> Result<Self, SortError> {
        let mut readers = Vec::with_capacity(runs.len());
        for run in runs {
            readers.push(run.open::<C>(buf_size)?);
        }

        log::debug!("all {} runs opened", readers.len());

        return Ok(RunCursors { readers });
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl<C: RunCodec> IntoIterator for RunCursors<C> {
    type Item = RunReader<C>;
    type IntoIter = <Vec<RunReader<C>> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.readers.into_iter()
    }
}

/// K-way merger of sorted runs into a text sink.
pub struct KWayMerger<C: RunCodec = TextCodec> {
    rw_buf_size: Option<usize>,
    progress_interval: u64,
    observer: Arc<dyn SortObserver>,

    codec: PhantomData<fn() -> C>,
}

impl<C: RunCodec> KWayMerger<C> {
    pub fn new() -> Self {
        KWayMerger {
            rw_buf_size: None,
            progress_interval: 100_000,
            observer: Arc::new(LogObserver),
            codec: PhantomData,
        }
    }

    /// Sets run file read buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: Option<usize>) -> Self {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sets the number of merged records between two progress notifications.
    pub fn with_progress_interval(mut self, progress_interval: u64) -> Self {
        self.progress_interval = progress_interval.max(1);
        return self;
    }

    /// Sets observer notified about the merge progress.
    pub fn with_observer(mut self, observer: Arc<dyn SortObserver>) -> Self {
        self.observer = observer;
        return self;
    }

    /// Merges runs writing records to the sink one per line in ascending order.
    /// Returns the number of written records.
    ///
    /// Fails with [`SortError::InvalidState`] if `runs` is empty. Any read or write error aborts the merge; the
    /// output written so far must be treated as incomplete. Runs are never deleted by the merger.
    ///
    /// # Arguments
    /// * `runs` - Runs to be merged
    /// * `sink` - Output records are written to
    pub fn merge<W: Write>(&self, runs: &[Run], sink: &mut W) -> Result<u64, SortError> {
        if runs.is_empty() {
            return Err(SortError::InvalidState("nothing to merge: no runs provided".to_string()));
        }

        let cursors = RunCursors::<C>::open(runs, self.rw_buf_size)?;
        self.observer.merge_started(cursors.len());

        let mut merged: u64 = 0;
        for record in RunMerger::new(cursors)? {
            writeln!(sink, "{}", record?)?;

            merged += 1;
            if merged % self.progress_interval == 0 {
                self.observer.merge_progress(merged);
            }
        }
        sink.flush()?;

        self.observer.merge_completed(merged);

        return Ok(merged);
    }
}

impl<C: RunCodec> Default for KWayMerger<C> {
    fn default() -> Self {
        KWayMerger::new()
    }
}
