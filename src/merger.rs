//! K-way merging of sorted runs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::prelude::*;
use std::path::Path;

use log;

use crate::chunk::{self, Run};
use crate::progress::{self, ProgressTimer};
use crate::record::Record;
use crate::sort::SortError;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of cursors (inputs).
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    frontier: BinaryHeap<(Reverse<T>, usize)>,
    cursors: Vec<C>,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    /// Creates a merger and seeds its frontier with the head of every non-empty cursor.
    /// Cursor items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `cursors` - Sorted inputs to be merged in a single sorted one
    pub fn new<I>(cursors: I) -> Result<Self, E>
    where
        I: IntoIterator<Item = C>,
    {
        let mut cursors = Vec::from_iter(cursors);
        let mut frontier = BinaryHeap::with_capacity(cursors.len());

        for (idx, cursor) in cursors.iter_mut().enumerate() {
            if let Some(item) = cursor.next() {
                frontier.push((Reverse(item?), idx));
            }
        }

        return Ok(BinaryHeapMerger { frontier, cursors });
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Pops the smallest head and refills the frontier from the cursor it came from.
    /// The merger yields nothing after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        let (Reverse(item), idx) = self.frontier.pop()?;

        match self.cursors[idx].next() {
            Some(Ok(next)) => self.frontier.push((Reverse(next), idx)),
            Some(Err(err)) => {
                self.frontier.clear();
                return Some(Err(err));
            }
            None => {}
        }

        return Some(Ok(item));
    }
}

/// Multi-pass run merger.
///
/// Merges at most `max_open_files` runs at once, so the number of simultaneously open files stays
/// bounded no matter how many runs the chunking phase produced.
pub struct RunMerger<'a> {
    /// Directory intermediate runs are written to.
    work_dir: &'a Path,
    /// Maximum number of runs merged in one step.
    max_open_files: usize,
    /// Run file read/write buffer size.
    rw_buf_size: usize,
}

impl<'a> RunMerger<'a> {
    pub fn new(work_dir: &'a Path, max_open_files: usize, rw_buf_size: usize) -> Self {
        RunMerger {
            work_dir,
            max_open_files,
            rw_buf_size,
        }
    }

    /// Runs intermediate merge passes until no more than `max_open_files` runs are left.
    /// Returns the remaining runs and the number of passes done.
    pub fn reduce(&self, mut runs: Vec<Run>) -> Result<(Vec<Run>, usize), SortError> {
        // a single-run batch is carried over as is, so a fan-in below 2 never shrinks the run set
        if self.max_open_files < 2 {
            return Err(SortError::InvalidConfig(format!(
                "at least 2 files must be merged at once, got {}",
                self.max_open_files
            )));
        }

        let mut pass = 0;
        while runs.len() > self.max_open_files {
            pass += 1;
            runs = self.merge_pass(pass, runs)?;
        }

        return Ok((runs, pass));
    }

    /// Merges runs into the writer and deletes them. Returns the number of written records.
    ///
    /// The caller is expected to [`reduce`](RunMerger::reduce) the runs first.
    pub fn merge_into<W: Write>(&self, runs: Vec<Run>, writer: &mut W) -> Result<u64, SortError> {
        debug_assert!(runs.len() <= self.max_open_files);

        log::info!("final merge: {} run(s)", runs.len());
        let merged = chunk::write_records(writer, self.merge_batch(&runs, "final merge".to_string())?)?;
        runs.into_iter().for_each(Run::remove);

        return Ok(merged);
    }

    fn merge_pass(&self, pass: usize, runs: Vec<Run>) -> Result<Vec<Run>, SortError> {
        let total_batches = (runs.len() + self.max_open_files - 1) / self.max_open_files;
        log::info!("merge pass {}: {} run(s) in {} batch(es)", pass, runs.len(), total_batches);

        let mut runs = runs.into_iter();
        let mut next_runs = Vec::with_capacity(total_batches);

        for batch_idx in 0..total_batches {
            let batch = Vec::from_iter(runs.by_ref().take(self.max_open_files));
            if batch.len() == 1 {
                log::debug!("pass {} | batch {}/{} | single run carried over", pass, batch_idx + 1, total_batches);
                next_runs.extend(batch);
                continue;
            }

            let path = self.work_dir.join(format!("merge_p{:02}_{:04}.txt", pass, batch_idx));
            let label = format!("pass {} | batch {}/{}", pass, batch_idx + 1, total_batches);
            log::info!("{} | merging {} run(s) -> {}", label, batch.len(), path.display());

            let merged = Run::write(path, self.merge_batch(&batch, label)?, self.rw_buf_size)?;
            batch.into_iter().for_each(Run::remove);
            log::debug!(
                "pass {} | batch {}/{} | {} lines written",
                pass,
                batch_idx + 1,
                total_batches,
                merged.records()
            );

            next_runs.push(merged);
        }

        return Ok(next_runs);
    }

    fn merge_batch(
        &self,
        batch: &[Run],
        label: String,
    ) -> Result<impl Iterator<Item = Result<Record, SortError>>, SortError> {
        let cursors: Result<Vec<_>, SortError> = batch.iter().map(|run| run.open(self.rw_buf_size)).collect();
        let merger = BinaryHeapMerger::new(cursors?)?;

        let mut timer = ProgressTimer::new();
        let mut merged: u64 = 0;

        return Ok(merger.inspect(move |_| {
            merged += 1;
            if let Some(elapsed) = timer.tick() {
                log::info!(
                    "{} | merged lines {} | ~{:.0} lines/s",
                    label,
                    merged,
                    progress::per_second(merged, elapsed)
                );
            }
        }));
    }
}
