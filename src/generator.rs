//! Test file generator.
//!
//! Produces files of random `<number>. <text>` records whose size matches the requested byte count
//! exactly. Texts are drawn from a small phrase list, so every non-trivial file contains duplicate
//! texts with different keys.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io::{self, prelude::*};
use std::ops::Range;
use std::path::Path;

use bytesize::{ByteSize, MIB};
use log;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::progress::{self, ProgressTimer};
use crate::record::{Record, DELIMITER, LINE_TERMINATOR};

/// Smallest file the generator can fill with a valid record.
pub const MIN_TARGET_BYTES: u64 = 5;

const PHRASES: [&str; 11] = [
    "Apple",
    "Banana is yellow",
    "Cherry is the best",
    "Something something something",
    "Memory management is important",
    "Performance optimization is key",
    "Multithreading and concurrency",
    "This is a long test string to increase file size",
    "Repeated string for sorting test",
    "Another repeated string",
    "Senior Developer Test",
];

const KEYS: Range<i64> = 1..100_000;

// below this many remaining bytes the file is closed with a single exact-fill record
const EXACT_FILL_THRESHOLD: u64 = 64;

const WRITE_BUF_SIZE: usize = MIB as usize;

/// Generation error.
#[derive(Debug)]
pub enum GenerateError {
    /// Requested size can not hold a single record.
    TooSmall(u64),
    /// Common I/O error.
    IO(io::Error),
}

impl Error for GenerateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            GenerateError::TooSmall(_) => None,
            GenerateError::IO(err) => Some(err),
        }
    }
}

impl Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            GenerateError::TooSmall(size) => write!(
                f,
                "target size {} is too small, minimum is {} bytes",
                size, MIN_TARGET_BYTES
            ),
            GenerateError::IO(err) => write!(f, "I/O operation failed: {}", err),
        }
    }
}

/// Summary of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateStats {
    pub bytes: u64,
    pub lines: u64,
}

/// Random record file generator.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new() -> Self {
        Generator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a generator producing the same output for the same seed.
    pub fn with_seed(seed: u64) -> Self {
        Generator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Writes records to `writer` until exactly `target_bytes` bytes are written.
    pub fn write<W: Write>(&mut self, writer: &mut W, target_bytes: u64) -> Result<GenerateStats, GenerateError> {
        if target_bytes < MIN_TARGET_BYTES {
            return Err(GenerateError::TooSmall(target_bytes));
        }

        let mut timer = ProgressTimer::new();
        let mut stats = GenerateStats { bytes: 0, lines: 0 };
        let mut line: Vec<u8> = Vec::with_capacity(EXACT_FILL_THRESHOLD as usize);

        while stats.bytes < target_bytes {
            let remaining = target_bytes - stats.bytes;

            line.clear();
            let text = PHRASES.choose(&mut self.rng).copied().unwrap_or_default();
            Record::new(self.rng.gen_range(KEYS), text)
                .write_to(&mut line)
                .map_err(GenerateError::IO)?;

            let line_len = line.len() as u64;
            if needs_exact_fill(remaining, line_len) {
                write_exact_fill(writer, remaining)?;
                stats.bytes = target_bytes;
                stats.lines += 1;
                break;
            }

            writer.write_all(&line).map_err(GenerateError::IO)?;
            stats.bytes += line_len;
            stats.lines += 1;

            if let Some(elapsed) = timer.tick() {
                log::info!(
                    "written: {} | lines {} | ~{:.1} MiB/s | elapsed {}",
                    ByteSize(stats.bytes).to_string_as(true),
                    stats.lines,
                    progress::per_second(stats.bytes, elapsed) / MIB as f64,
                    progress::format_elapsed(elapsed)
                );
            }
        }

        return Ok(stats);
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

/// Tells if the file must be closed with an exact-fill record instead of a `line_len` bytes line.
/// A line must not overshoot nor leave 1 to 3 bytes, which can not hold a record.
fn needs_exact_fill(remaining: u64, line_len: u64) -> bool {
    remaining <= EXACT_FILL_THRESHOLD || line_len > remaining || matches!(remaining - line_len, 1..=3)
}

/// Writes a record of exactly `remaining` bytes: `1. A` padded with spaces and terminated, or
/// `1. A` alone when exactly four bytes remain.
fn write_exact_fill<W: Write>(writer: &mut W, remaining: u64) -> Result<(), GenerateError> {
    const HEAD: &str = "1";
    const PAYLOAD: char = 'A';

    let overhead = (HEAD.len() + DELIMITER.len() + 1) as u64;
    if remaining < overhead {
        return Err(GenerateError::TooSmall(remaining));
    }

    let mut line = format!("{}{}{}", HEAD, DELIMITER, PAYLOAD);
    if remaining > overhead {
        let padding = (remaining - overhead - 1) as usize;
        line.extend(std::iter::repeat(' ').take(padding));
        line.push(LINE_TERMINATOR as char);
    }

    writer.write_all(line.as_bytes()).map_err(GenerateError::IO)
}

/// Generates a file of exactly `target_bytes` bytes at `path`, creating parent directories.
pub fn generate_file(path: &Path, target_bytes: u64) -> Result<GenerateStats, GenerateError> {
    if target_bytes < MIN_TARGET_BYTES {
        return Err(GenerateError::TooSmall(target_bytes));
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(GenerateError::IO)?;
    }

    log::info!(
        "generating {} ({} bytes) into {}",
        ByteSize(target_bytes).to_string_as(true),
        target_bytes,
        path.display()
    );

    let file = fs::File::create(path).map_err(GenerateError::IO)?;
    let mut file_writer = io::BufWriter::with_capacity(WRITE_BUF_SIZE, file);

    let stats = Generator::new().write(&mut file_writer, target_bytes)?;
    file_writer.flush().map_err(GenerateError::IO)?;

    log::info!("generated {} lines", stats.lines);

    return Ok(stats);
}
