//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io::{self, prelude::*};
use std::mem;
use std::path::{Path, PathBuf};

use bytesize::{ByteSize, GIB, MIB};
use crossbeam_channel::{Receiver, Sender};
use log;
use rayon::slice::ParallelSliceMut;

use crate::buffer::ChunkBuffer;
use crate::chunk::Run;
use crate::merger::RunMerger;
use crate::progress::{self, ProgressTimer};
use crate::record::{ParseError, Record, RecordReader};

/// Default number of chunks sorted and spilled in parallel.
pub const DEFAULT_THREADS_NUMBER: usize = 4;
/// Default approximate in-memory chunk size.
pub const DEFAULT_CHUNK_SIZE: u64 = GIB;
/// Default maximum number of runs merged at once.
pub const DEFAULT_MAX_OPEN_FILES: usize = 128;
/// Default run and output file read/write buffer size.
pub const DEFAULT_RW_BUF_SIZE: usize = MIB as usize;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Malformed record line in the input or in a run file.
    Format {
        /// Input or run file the line was read from.
        origin: String,
        /// 1-based line number.
        line_number: u64,
        err: ParseError,
    },
    /// Sorter configuration error.
    InvalidConfig(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::Format { err, .. } => Some(err),
            SortError::InvalidConfig(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Format {
                origin,
                line_number,
                err,
            } => write!(f, "invalid line {} in {}: {}", line_number, origin, err),
            SortError::InvalidConfig(reason) => write!(f, "invalid sorter configuration: {}", reason),
        }
    }
}

/// Summary of a successful sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Number of sorted records.
    pub records: u64,
    /// Number of sorted runs spilled during chunking.
    pub runs: usize,
    /// Number of merge passes, the final one included.
    pub merge_passes: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug)]
pub struct ExternalSorterBuilder {
    /// Number of chunks sorted and spilled in parallel.
    threads_number: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<PathBuf>,
    /// Approximate in-memory chunk size.
    chunk_size: ByteSize,
    /// Maximum number of runs merged at once.
    max_open_files: usize,
    /// Chunk file read/write buffer size.
    rw_buf_size: usize,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.threads_number,
            self.tmp_dir,
            self.chunk_size,
            self.max_open_files,
            self.rw_buf_size,
        )
    }

    /// Sets number of chunks sorted and spilled in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = threads_number;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets approximate in-memory chunk size.
    pub fn with_chunk_size(mut self, chunk_size: ByteSize) -> ExternalSorterBuilder {
        self.chunk_size = chunk_size;
        return self;
    }

    /// Sets maximum number of runs merged at once.
    pub fn with_max_open_files(mut self, max_open_files: usize) -> ExternalSorterBuilder {
        self.max_open_files = max_open_files;
        return self;
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = buf_size;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            threads_number: DEFAULT_THREADS_NUMBER,
            tmp_dir: None,
            chunk_size: ByteSize(DEFAULT_CHUNK_SIZE),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
        }
    }
}

/// External sorter of `<number>. <text>` record files.
pub struct ExternalSorter {
    /// Sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Number of chunks sorted and spilled in parallel.
    threads_number: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<PathBuf>,
    /// Approximate in-memory chunk size.
    chunk_size: ByteSize,
    /// Maximum number of runs merged at once.
    max_open_files: usize,
    /// Chunk file read/write buffer size.
    rw_buf_size: usize,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `threads_number` - Number of chunks sorted and spilled in parallel.
    /// * `tmp_dir` - Directory to be used to store temporary data. If the parameter is [`None`] default OS
    ///   temporary directory will be used.
    /// * `chunk_size` - Approximate memory consumed by one in-memory chunk.
    /// * `max_open_files` - Maximum number of runs merged at once.
    /// * `rw_buf_size` - Run and output files read/write buffer size.
    ///
    /// Returns [`SortError::InvalidConfig`] if any size or count is zero or fewer than 2 runs can be merged at once.
    pub fn new(
        threads_number: usize,
        tmp_dir: Option<PathBuf>,
        chunk_size: ByteSize,
        max_open_files: usize,
        rw_buf_size: usize,
    ) -> Result<Self, SortError> {
        if threads_number == 0 {
            return Err(SortError::InvalidConfig("threads number must be positive".to_string()));
        }
        if chunk_size.as_u64() == 0 {
            return Err(SortError::InvalidConfig("chunk size must be positive".to_string()));
        }
        if max_open_files < 2 {
            return Err(SortError::InvalidConfig(format!(
                "at least 2 files must be merged at once, got {}",
                max_open_files
            )));
        }
        if rw_buf_size == 0 {
            return Err(SortError::InvalidConfig("read/write buffer size must be positive".to_string()));
        }

        return Ok(ExternalSorter {
            thread_pool: Self::init_thread_pool(threads_number)?,
            threads_number,
            tmp_dir,
            chunk_size,
            max_open_files,
            rw_buf_size,
        });
    }

    fn init_thread_pool(threads_number: usize) -> Result<rayon::ThreadPool, SortError> {
        log::info!("initializing thread-pool (threads: {})", threads_number);

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_number)
            .thread_name(|idx| format!("line-sort-{}", idx))
            .build()
            .map_err(SortError::ThreadPoolBuildError)?;

        return Ok(thread_pool);
    }

    fn init_work_dir(&self) -> Result<tempfile::TempDir, SortError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".sort-");

        let work_dir = if let Some(tmp_dir) = &self.tmp_dir {
            fs::create_dir_all(tmp_dir).map_err(SortError::TempDir)?;
            builder.tempdir_in(tmp_dir)
        } else {
            builder.tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", work_dir.path().display());

        return Ok(work_dir);
    }

    /// Sorts the `input` file into the `output` file.
    ///
    /// The output is replaced only once the sort has fully succeeded.
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let input_file = fs::File::open(input).map_err(SortError::IO)?;
        let input_reader = io::BufReader::with_capacity(self.rw_buf_size, input_file);

        log::info!("input: {}", input.display());
        self.sort_from(input_reader, &input.display().to_string(), output)
    }

    /// Sorts records read from `input` into the `output` file.
    ///
    /// # Arguments
    /// * `input` - Input stream records to be fetched from
    /// * `output` - Result file path
    pub fn sort<R: BufRead>(&self, input: R, output: &Path) -> Result<SortStats, SortError> {
        self.sort_from(input, "input", output)
    }

    fn sort_from<R: BufRead>(&self, input: R, origin: &str, output: &Path) -> Result<SortStats, SortError> {
        let timer = ProgressTimer::new();
        log::info!("output: {}", output.display());
        log::info!(
            "chunk: {} | threads: {} | max open files: {}",
            self.chunk_size.to_string_as(true),
            self.threads_number,
            self.max_open_files
        );

        let work_dir = self.init_work_dir()?;
        let result = self.sort_in(input, origin, output, work_dir.path());

        if let Err(err) = work_dir.close() {
            log::warn!("temporary directory not removed: {}", err);
        }
        self.cleanup_tmp_dir();

        if result.is_ok() {
            log::info!("total time: {}", progress::format_elapsed(timer.elapsed()));
        }

        return result;
    }

    fn sort_in<R: BufRead>(
        &self,
        input: R,
        origin: &str,
        output: &Path,
        work_dir: &Path,
    ) -> Result<SortStats, SortError> {
        let timer = ProgressTimer::new();
        let (mut runs, records) = self.create_runs(input, origin, work_dir)?;
        log::info!(
            "chunking done: {} chunk(s) | lines {} | {}",
            runs.len(),
            records,
            progress::format_elapsed(timer.elapsed())
        );

        let stats = SortStats {
            records,
            runs: runs.len(),
            merge_passes: 0,
        };

        let timer = ProgressTimer::new();
        let merge_passes = if runs.len() > 1 {
            let merger = RunMerger::new(work_dir, self.max_open_files, self.rw_buf_size);
            let (runs, passes) = merger.reduce(runs)?;
            self.write_output(output, |writer| merger.merge_into(runs, writer).map(|_| ()))?;
            log::info!("merge done: {}", progress::format_elapsed(timer.elapsed()));
            passes + 1
        } else if let Some(run) = runs.pop() {
            self.promote_run(run, output)?;
            0
        } else {
            self.write_output(output, |_| Ok(()))?;
            log::info!("done (empty input)");
            0
        };

        return Ok(SortStats { merge_passes, ..stats });
    }

    /// Reads the input, spilling sorted chunks to run files through the thread pool.
    /// Returns the runs and the number of records read.
    fn create_runs<R: BufRead>(
        &self,
        input: R,
        origin: &str,
        work_dir: &Path,
    ) -> Result<(Vec<Run>, u64), SortError> {
        let mut records = RecordReader::new(input, origin);
        let mut timer = ProgressTimer::new();
        log::info!("chunking started");

        let runs = self.thread_pool.in_place_scope(|scope| {
            let mut spiller = Spiller::new(scope, work_dir, self.threads_number, self.rw_buf_size);
            let mut chunk_buf = ChunkBuffer::new(self.chunk_size.as_u64());

            while let Some(record) = records.next() {
                chunk_buf.push(record?);

                if chunk_buf.is_full() {
                    let chunk = mem::replace(&mut chunk_buf, ChunkBuffer::new(self.chunk_size.as_u64()));
                    spiller.spill(chunk)?;
                }

                if let Some(elapsed) = timer.tick() {
                    log::info!(
                        "chunking: read ~{} | lines {} | chunks queued {} | ~{:.1} MiB/s",
                        ByteSize(records.bytes_read()).to_string_as(true),
                        records.line_number(),
                        spiller.dispatched(),
                        progress::per_second(records.bytes_read(), elapsed) / MIB as f64
                    );
                }
            }

            if !chunk_buf.is_empty() {
                spiller.spill(chunk_buf)?;
            }

            spiller.finish()
        })?;

        return Ok((runs, records.line_number()));
    }

    /// Writes the output into a staging file next to `output` and moves it into place on success.
    fn write_output<F>(&self, output: &Path, write: F) -> Result<(), SortError>
    where
        F: FnOnce(&mut io::BufWriter<&fs::File>) -> Result<(), SortError>,
    {
        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".line-sort-")
            .suffix(".partial")
            .tempfile_in(output_dir)
            .map_err(SortError::IO)?;

        {
            let mut output_writer = io::BufWriter::with_capacity(self.rw_buf_size, staging.as_file());
            write(&mut output_writer)?;
            output_writer.flush().map_err(SortError::IO)?;
        }

        staging.persist(output).map_err(|err| SortError::IO(err.error))?;

        return Ok(());
    }

    /// Makes the only run the output, copying it if it can not be renamed.
    fn promote_run(&self, run: Run, output: &Path) -> Result<(), SortError> {
        match fs::rename(run.path(), output) {
            Ok(()) => {
                log::info!("single chunk moved to {}", output.display());
                return Ok(());
            }
            Err(err) => log::debug!("run rename failed, falling back to copy: {}", err),
        }

        self.write_output(output, |writer| {
            let mut run_file = fs::File::open(run.path()).map_err(SortError::IO)?;
            io::copy(&mut run_file, writer).map_err(SortError::IO)?;
            Ok(())
        })?;
        run.remove();

        return Ok(());
    }

    /// Removes the configured temporary directory if the sort left it empty.
    fn cleanup_tmp_dir(&self) {
        let tmp_dir = match &self.tmp_dir {
            Some(tmp_dir) => tmp_dir,
            None => return,
        };

        let is_empty = match fs::read_dir(tmp_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        };
        if is_empty {
            if let Err(err) = fs::remove_dir(tmp_dir) {
                log::warn!("temporary directory {} not removed: {}", tmp_dir.display(), err);
            }
        }
    }
}

/// Dispatches chunks to the thread pool, at most `limit` at a time, and collects the written runs.
struct Spiller<'a, 'scope> {
    scope: &'a rayon::Scope<'scope>,
    work_dir: &'a Path,
    limit: usize,
    rw_buf_size: usize,
    done_tx: Sender<Result<Run, SortError>>,
    done_rx: Receiver<Result<Run, SortError>>,
    in_flight: usize,
    dispatched: usize,
    runs: Vec<Run>,
}

impl<'a, 'scope> Spiller<'a, 'scope> {
    fn new(scope: &'a rayon::Scope<'scope>, work_dir: &'a Path, limit: usize, rw_buf_size: usize) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();

        Spiller {
            scope,
            work_dir,
            limit,
            rw_buf_size,
            done_tx,
            done_rx,
            in_flight: 0,
            dispatched: 0,
            runs: Vec::new(),
        }
    }

    fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Hands the chunk to a worker, blocking while all workers are busy.
    fn spill(&mut self, chunk: ChunkBuffer<Record>) -> Result<(), SortError> {
        while self.in_flight >= self.limit {
            self.collect_one()?;
        }

        let path = self.work_dir.join(format!("chunk_{:06}.txt", self.dispatched));
        let done_tx = self.done_tx.clone();
        let rw_buf_size = self.rw_buf_size;

        self.scope.spawn(move |_| {
            // the receiver is gone only if chunking already failed
            let _ = done_tx.send(sort_and_write(chunk, path, rw_buf_size));
        });
        self.in_flight += 1;
        self.dispatched += 1;

        return Ok(());
    }

    /// Waits for every dispatched chunk and returns the runs.
    fn finish(mut self) -> Result<Vec<Run>, SortError> {
        while self.in_flight > 0 {
            self.collect_one()?;
        }

        return Ok(self.runs);
    }

    fn collect_one(&mut self) -> Result<(), SortError> {
        let result = self.done_rx.recv().map_err(|_| {
            SortError::IO(io::Error::new(io::ErrorKind::BrokenPipe, "chunk workers disconnected"))
        })?;
        self.in_flight -= 1;
        self.runs.push(result?);

        return Ok(());
    }
}

fn sort_and_write(mut chunk: ChunkBuffer<Record>, path: PathBuf, rw_buf_size: usize) -> Result<Run, SortError> {
    log::debug!(
        "sorting chunk data ({} records, ~{}) ...",
        chunk.len(),
        ByteSize(chunk.mem_size()).to_string_as(true)
    );
    chunk.par_sort_unstable();

    log::debug!("saving chunk data to {}", path.display());
    let run = Run::write(path, chunk.into_iter().map(Ok), rw_buf_size)?;
    log::debug!("chunk {} saved ({} records)", run.path().display(), run.records());

    return Ok(run);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io;
    use std::path::Path;

    use bytesize::ByteSize;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder, SortError};
    use crate::record::Record;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn sorter(tmp_dir: &Path, chunk_size: u64, max_open_files: usize) -> ExternalSorter {
        ExternalSorterBuilder::new()
            .with_chunk_size(ByteSize(chunk_size))
            .with_max_open_files(max_open_files)
            .with_threads_number(2)
            .with_rw_buf_size(256)
            .with_tmp_dir(&tmp_dir.join(".tmp"))
            .build()
            .unwrap()
    }

    fn sort_lines(dir: &Path, lines: &[&str], chunk_size: u64) -> Vec<String> {
        let input = dir.join("input.txt");
        let output = dir.join("output.txt");
        fs::write(&input, lines.iter().map(|line| format!("{}\n", line)).collect::<String>()).unwrap();

        sorter(dir, chunk_size, 128).sort_file(&input, &output).unwrap();

        fs::read_to_string(&output).unwrap().lines().map(String::from).collect()
    }

    #[rstest]
    #[case(1024 * 1024)]
    #[case(40)]
    fn test_duplicate_texts_ordered_by_key(tmp_dir: tempfile::TempDir, #[case] chunk_size: u64) {
        let lines = ["10. Apple", "2. Apple", "7. Apple", "1. Banana", "3. Banana"];

        let actual = sort_lines(tmp_dir.path(), &lines, chunk_size);

        assert_eq!(actual, vec!["2. Apple", "7. Apple", "10. Apple", "1. Banana", "3. Banana"]);
    }

    #[rstest]
    #[case(1024 * 1024)]
    #[case(40)]
    #[case(80)]
    fn test_sorts_by_text_then_number(tmp_dir: tempfile::TempDir, #[case] chunk_size: u64) {
        let lines = [
            "415. Apple",
            "30432. Something something something",
            "1. Apple",
            "32. Cherry is the best",
            "2. Banana is yellow",
        ];

        let actual = sort_lines(tmp_dir.path(), &lines, chunk_size);

        assert_eq!(
            actual,
            vec![
                "1. Apple",
                "415. Apple",
                "2. Banana is yellow",
                "32. Cherry is the best",
                "30432. Something something something",
            ]
        );
    }

    #[rstest]
    #[case(64, 2)]
    #[case(256, 3)]
    #[case(4 * 1024, 4)]
    #[case(1024 * 1024, 128)]
    fn test_external_sorter(tmp_dir: tempfile::TempDir, #[case] chunk_size: u64, #[case] max_open_files: usize) {
        let mut rng = rand::thread_rng();
        let texts = ["Apple", "Banana is yellow", "Cherry is the best", "", "apple", "Яблоко"];
        let mut input: Vec<Record> = (0..2_000)
            .map(|_| Record::new(rng.gen_range(-50..50), *texts.choose(&mut rng).unwrap()))
            .collect();
        input.shuffle(&mut rng);

        let input_data: Vec<u8> = input.iter().flat_map(|r| format!("{}\n", r).into_bytes()).collect();
        let output = tmp_dir.path().join("output.txt");

        let stats = sorter(tmp_dir.path(), chunk_size, max_open_files)
            .sort(io::Cursor::new(input_data), &output)
            .unwrap();

        let actual: Vec<Record> = fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(|line| Record::parse(line).unwrap())
            .collect();

        // ordering and conservation
        assert!(actual.windows(2).all(|pair| pair[0] <= pair[1]));
        input.sort();
        assert_eq!(actual, input);
        assert_eq!(stats.records, 2_000);

        if stats.runs > 1 {
            let expected_passes = (1usize..).find(|p| max_open_files.pow(*p as u32) >= stats.runs).unwrap();
            assert_eq!(stats.merge_passes, expected_passes);
        } else {
            assert_eq!(stats.merge_passes, 0);
        }

        // no temporary residue
        assert!(!tmp_dir.path().join(".tmp").exists());
    }

    #[rstest]
    fn test_many_runs_need_several_passes(tmp_dir: tempfile::TempDir) {
        let input: String = (0..30).rev().map(|key| format!("{}. same text\n", key)).collect();
        let output = tmp_dir.path().join("output.txt");

        // every record is a chunk of its own
        let stats = sorter(tmp_dir.path(), 1, 3)
            .sort(io::Cursor::new(input), &output)
            .unwrap();

        assert_eq!(stats.runs, 30);
        assert_eq!(stats.merge_passes, 4);

        let expected: String = (0..30).map(|key| format!("{}. same text\n", key)).collect();
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    }

    #[rstest]
    fn test_empty_input(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "").unwrap();

        let stats = sorter(tmp_dir.path(), 1024, 128).sort_file(&input, &output).unwrap();

        assert_eq!(stats.records, 0);
        assert_eq!(stats.runs, 0);
        assert_eq!(fs::metadata(&output).unwrap().len(), 0);
        assert!(!tmp_dir.path().join(".tmp").exists());
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 2);
    }

    #[rstest]
    fn test_single_run_is_moved(tmp_dir: tempfile::TempDir) {
        let output = tmp_dir.path().join("output.txt");
        fs::write(&output, "stale content\n").unwrap();

        let stats = sorter(tmp_dir.path(), 1024 * 1024, 128)
            .sort(io::Cursor::new("3. c\n1. a\n2. b"), &output)
            .unwrap();

        assert_eq!(stats.runs, 1);
        assert_eq!(stats.merge_passes, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "1. a\n2. b\n3. c\n");
    }

    #[rstest]
    #[case("1. Apple\n2 Apple\n3. Cherry\n", 2)]
    #[case("1. Apple\n\n", 2)]
    #[case("Apple\n", 1)]
    #[case("1. Apple\n2. Banana\nx. Cherry\n", 3)]
    fn test_malformed_line(tmp_dir: tempfile::TempDir, #[case] input: &str, #[case] bad_line: u64) {
        let output = tmp_dir.path().join("output.txt");
        fs::write(&output, "previous result\n").unwrap();

        let result = sorter(tmp_dir.path(), 16, 2).sort(io::Cursor::new(input), &output);

        match result {
            Err(SortError::Format { line_number, .. }) => assert_eq!(line_number, bad_line),
            other => panic!("unexpected result: {:?}", other),
        }
        // destination untouched, nothing left behind
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous result\n");
        assert!(!tmp_dir.path().join(".tmp").exists());
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[rstest]
    fn test_missing_input(tmp_dir: tempfile::TempDir) {
        let result = sorter(tmp_dir.path(), 1024, 128)
            .sort_file(&tmp_dir.path().join("missing.txt"), &tmp_dir.path().join("output.txt"));

        assert!(matches!(result, Err(SortError::IO(_))));
        assert!(!tmp_dir.path().join("output.txt").exists());
    }

    #[rstest]
    fn test_existing_tmp_dir_content_is_kept(tmp_dir: tempfile::TempDir) {
        let tmp = tmp_dir.path().join(".tmp");
        fs::create_dir(&tmp).unwrap();
        fs::write(tmp.join("foreign.txt"), "not ours").unwrap();

        sorter(tmp_dir.path(), 16, 2)
            .sort(io::Cursor::new("2. b\n1. a\n"), &tmp_dir.path().join("output.txt"))
            .unwrap();

        let entries: Vec<String> = fs::read_dir(&tmp)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["foreign.txt".to_string()]);
    }

    #[rstest]
    fn test_carriage_returns_do_not_depend_on_chunking(tmp_dir: tempfile::TempDir) {
        let input = "2. abd\n1. abc\r\r\n3. abc\r\n";
        let single = tmp_dir.path().join("single.txt");
        let several = tmp_dir.path().join("several.txt");

        let single_stats = sorter(tmp_dir.path(), 1024 * 1024, 2)
            .sort(io::Cursor::new(input), &single)
            .unwrap();
        let several_stats = sorter(tmp_dir.path(), 1, 2)
            .sort(io::Cursor::new(input), &several)
            .unwrap();

        assert_eq!(single_stats.runs, 1);
        assert_eq!(several_stats.runs, 3);
        assert_eq!(fs::read_to_string(&single).unwrap(), "1. abc\n3. abc\n2. abd\n");
        assert_eq!(fs::read_to_string(&several).unwrap(), "1. abc\n3. abc\n2. abd\n");
    }

    #[rstest]
    fn test_spill_failure_aborts_sort(tmp_dir: tempfile::TempDir) {
        let output = tmp_dir.path().join("output.txt");
        fs::write(&output, "previous result\n").unwrap();
        // run files can not be created in a missing directory
        let work_dir = tmp_dir.path().join("missing");
        let input: String = (0..50).map(|key| format!("{}. text\n", key)).collect();

        let result = sorter(tmp_dir.path(), 1, 2).sort_in(io::Cursor::new(input), "input", &output, &work_dir);

        assert!(matches!(result, Err(SortError::IO(_))));
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous result\n");
        assert!(!work_dir.exists());
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn test_fan_in_below_two_is_rejected(tmp_dir: tempfile::TempDir, #[case] max_open_files: usize) {
        let result = ExternalSorter::new(2, Some(tmp_dir.path().to_path_buf()), ByteSize(1), max_open_files, 64);

        assert!(matches!(result, Err(SortError::InvalidConfig(_))));
    }

    #[rstest]
    #[case(ExternalSorterBuilder::new().with_threads_number(0))]
    #[case(ExternalSorterBuilder::new().with_chunk_size(ByteSize(0)))]
    #[case(ExternalSorterBuilder::new().with_max_open_files(1))]
    #[case(ExternalSorterBuilder::new().with_rw_buf_size(0))]
    fn test_invalid_config(#[case] builder: ExternalSorterBuilder) {
        assert!(matches!(builder.build(), Err(SortError::InvalidConfig(_))));
    }
}
