//! Sorted run files.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use log;

use crate::record::{Record, RecordReader};
use crate::sort::SortError;

/// A file holding records in ascending order, one canonical line per record.
#[derive(Debug)]
pub struct Run {
    path: PathBuf,
    records: u64,
}

impl Run {
    /// Writes already sorted records to a new run file at `path`.
    ///
    /// # Arguments
    /// * `path` - Run file path, the file is created or truncated
    /// * `records` - Records in ascending order
    /// * `buf_size` - Write buffer size
    pub fn write<I>(path: PathBuf, records: I, buf_size: usize) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = Result<Record, SortError>>,
    {
        let file = fs::File::create(&path).map_err(SortError::IO)?;
        let mut run_writer = io::BufWriter::with_capacity(buf_size, file);

        let written = write_records(&mut run_writer, records)?;
        run_writer.flush().map_err(SortError::IO)?;

        return Ok(Run { path, records: written });
    }

    /// Opens a forward cursor over the run records.
    pub fn open(&self, buf_size: usize) -> Result<RecordReader<io::BufReader<fs::File>>, SortError> {
        let file = fs::File::open(&self.path).map_err(SortError::IO)?;
        let reader = io::BufReader::with_capacity(buf_size, file);

        return Ok(RecordReader::new(reader, self.path.display().to_string()));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the run.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Deletes the run file. Failures are logged and otherwise ignored.
    pub fn remove(self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("run file {} not removed: {}", self.path.display(), err);
        }
    }
}

/// Writes records in canonical form and returns how many were written.
/// Stops at the first record error.
pub fn write_records<W, I>(writer: &mut W, records: I) -> Result<u64, SortError>
where
    W: Write,
    I: IntoIterator<Item = Result<Record, SortError>>,
{
    let mut written = 0;
    for record in records {
        record?.write_to(writer).map_err(SortError::IO)?;
        written += 1;
    }

    return Ok(written);
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::Run;
    use crate::record::Record;
    use crate::sort::SortError;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_run(tmp_dir: tempfile::TempDir) {
        let saved = vec![
            Record::new(1, "Apple"),
            Record::new(415, "Apple"),
            Record::new(2, "Banana is yellow"),
            Record::new(7, ""),
        ];
        let path = tmp_dir.path().join("chunk_000000.txt");

        let run = Run::write(path.clone(), saved.clone().into_iter().map(Ok), 16).unwrap();
        assert_eq!(run.records(), 4);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1. Apple\n415. Apple\n2. Banana is yellow\n7. \n"
        );

        let restored: Result<Vec<Record>, SortError> = run.open(16).unwrap().collect();
        assert_eq!(restored.unwrap(), saved);

        run.remove();
        assert!(!path.exists());
    }

    #[rstest]
    fn test_empty_run(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("empty.txt");

        let run = Run::write(path.clone(), Vec::new(), 1024).unwrap();

        assert_eq!(run.records(), 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert!(run.open(1024).unwrap().next().is_none());
    }

    #[rstest]
    fn test_remove_missing_run_is_not_fatal(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("gone.txt");
        let run = Run::write(path.clone(), Vec::new(), 1024).unwrap();
        fs::remove_file(&path).unwrap();

        run.remove();
    }

    #[rstest]
    fn test_corrupted_run(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("corrupted.txt");
        let run = Run::write(path.clone(), vec![Ok(Record::new(1, "Apple"))], 1024).unwrap();
        fs::write(&path, "1. Apple\nnot a record\n").unwrap();

        let restored: Result<Vec<Record>, SortError> = run.open(1024).unwrap().collect();

        assert!(matches!(restored, Err(SortError::Format { line_number: 2, .. })));
    }
}
