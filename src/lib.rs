//! `line-sort` is an external sort for large text files of `<number>. <text>` records.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. The input is read in memory-bounded chunks that
//! are sorted in parallel and spilled to disk as sorted runs, then the runs are merged into the result file.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `line-sort` supports the following features:
//!
//! * **Record ordering:**
//!   records are ordered by their text (byte-wise) and then by their numeric key, so `2. Apple` precedes
//!   `10. Apple` which precedes `1. Banana`.
//! * **Multithreading support:**
//!   chunks are sorted and spilled in a bounded thread pool while the next chunk is being read.
//! * **Memory limit support:**
//!   the in-memory chunk size is limited by the estimated memory its records occupy.
//! * **Bounded merge fan-in:**
//!   no more than a configured number of runs are opened at once, larger run sets are merged in several passes.
//! * **Test data generation:**
//!   files of random records of an exact byte size can be generated to feed the sorter.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bytesize::MB;
//! use env_logger;
//! use log;
//!
//! use line_sort::{generate_file, ExternalSorterBuilder};
//!
//! fn main() {
//!     env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();
//!
//!     generate_file(Path::new("input.txt"), 100 * MB).unwrap();
//!
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./.tmp_sort"))
//!         .with_chunk_size(bytesize::ByteSize::mb(10))
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter.sort_file(Path::new("input.txt"), Path::new("output.txt")).unwrap();
//!     log::info!("sorted {} records", stats.records);
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod generator;
pub mod merger;
pub mod progress;
pub mod record;
pub mod size;
pub mod sort;

pub use buffer::ChunkBuffer;
pub use chunk::Run;
pub use generator::{generate_file, GenerateError, GenerateStats, Generator};
pub use merger::{BinaryHeapMerger, RunMerger};
pub use record::{ParseError, Record, RecordReader};
pub use size::{parse_size, SizeParseError};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortStats};
