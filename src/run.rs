//! Sorted runs stored on file system.

use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log;

use crate::codec::RunCodec;
use crate::{Record, SortError};

/// Sequential run index in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub usize);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Sorted run persisted to a file. Once written a run never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    id: RunId,
    path: PathBuf,
    len: u64,
    byte_budget: u64,
}

impl Run {
    /// Run file name for the given index, e.g. `temp_chunk_0.txt`.
    pub fn file_name<C: RunCodec>(id: RunId) -> String {
        format!("temp_chunk_{}.{}", id.0, C::EXTENSION)
    }

    /// Writes already sorted records to a new run file in `dir`.
    ///
    /// # Arguments
    /// * `dir` - Directory the run file is created in
    /// * `id` - Run index, determines the file name
    /// * `byte_budget` - Byte budget the run was bounded by
    /// * `records` - Records sorted in ascending order
    /// * `buf_size` - Run file write buffer size
    pub fn write<C: RunCodec>(
        dir: &Path,
        id: RunId,
        byte_budget: u64,
        records: &[Record],
        buf_size: Option<usize>,
    ) -> Result<Self, SortError> {
        let path = dir.join(Self::file_name::<C>(id));
        let file = fs::File::create(&path)?;

        let mut run_writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        C::dump(&mut run_writer, records)?;
        run_writer.flush()?;

        log::trace!("{} written to {} ({} records)", id, path.display(), records.len());

        return Ok(Run {
            id,
            path,
            len: records.len() as u64,
            byte_budget,
        });
    }

    /// Opens a read cursor positioned at the first record of the run.
    pub fn open<C: RunCodec>(&self, buf_size: Option<usize>) -> Result<RunReader<C>, SortError> {
        let file = fs::File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(RunReader::new(reader.take(file_len)));
    }

    /// Deletes the run file.
    pub fn remove(&self) -> Result<(), SortError> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records stored in the run.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte budget the run was bounded by.
    pub fn byte_budget(&self) -> u64 {
        self.byte_budget
    }
}

/// Deletes the files of all provided runs.
/// Returns the number of deleted runs.
pub fn cleanup_runs(runs: &[Run]) -> Result<usize, SortError> {
    for run in runs {
        run.remove()?;
        log::debug!("{} removed ({})", run.id(), run.path().display());
    }

    return Ok(runs.len());
}

/// Run read cursor. Yields run records in stored order.
pub struct RunReader<C> {
    reader: io::Take<io::BufReader<fs::File>>,
    scratch: Vec<u8>,

    codec: PhantomData<fn() -> C>,
}

impl<C: RunCodec> RunReader<C> {
    fn new(reader: io::Take<io::BufReader<fs::File>>) -> Self {
        RunReader {
            reader,
            scratch: Vec::new(),
            codec: PhantomData,
        }
    }
}

impl<C: RunCodec> Iterator for RunReader<C> {
    type Item = Result<Record, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.limit() == 0 {
            None
        } else {
            C::load(&mut self.reader, &mut self.scratch)
        }
    }
}
