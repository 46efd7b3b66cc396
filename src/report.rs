//! Sorting progress reporting.

use log;

use crate::run::Run;

/// Receives sorting lifecycle events.
///
/// All methods have empty default implementations so an observer only overrides what it is interested in.
pub trait SortObserver: Send + Sync {
    /// A run has been sorted and written to disk.
    fn run_flushed(&self, _run: &Run) {}

    /// Run generation finished.
    fn runs_built(&self, _runs: &[Run]) {}

    /// All run cursors are open and the merge is about to start.
    fn merge_started(&self, _runs: usize) {}

    /// Emitted every `progress_interval` merged records.
    fn merge_progress(&self, _merged: u64) {}

    /// The merge wrote all records to the output.
    fn merge_completed(&self, _merged: u64) {}

    /// Run files have been deleted.
    fn cleanup_completed(&self, _removed: usize) {}
}

/// Observer reporting events through the [`log`] facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SortObserver for LogObserver {
    fn run_flushed(&self, run: &Run) {
        log::debug!("{} flushed ({} records)", run.id(), run.len());
    }

    fn runs_built(&self, runs: &[Run]) {
        let records: u64 = runs.iter().map(Run::len).sum();
        log::info!("run generation done (runs: {}, records: {})", runs.len(), records);
    }

    fn merge_started(&self, runs: usize) {
        log::info!("starting {}-way merge", runs);
    }

    fn merge_progress(&self, merged: u64) {
        log::debug!("merged {} records", merged);
    }

    fn merge_completed(&self, merged: u64) {
        log::info!("merge done (records: {})", merged);
    }

    fn cleanup_completed(&self, removed: usize) {
        log::info!("{} run files removed", removed);
    }
}

/// Observer ignoring all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SortObserver for NoopObserver {}
