//! Record model and the `<number>. <text>` line codec.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io::{self, prelude::*};
use std::num::ParseIntError;

use deepsize::DeepSizeOf;

use crate::sort::SortError;

/// Delimiter written between the record key and the record text.
pub const DELIMITER: &str = ". ";

/// Line terminator used for every written record regardless of the host platform.
pub const LINE_TERMINATOR: u8 = b'\n';

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Line parsing error.
#[derive(Debug)]
pub enum ParseError {
    /// The line has no `.` after a non-empty key.
    MissingDelimiter,
    /// The part before the delimiter is not a 64-bit integer.
    InvalidKey(ParseIntError),
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            ParseError::MissingDelimiter => None,
            ParseError::InvalidKey(err) => Some(err),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ParseError::MissingDelimiter => write!(f, "expected `<number>. <text>`"),
            ParseError::InvalidKey(err) => write!(f, "record key is not an integer: {}", err),
        }
    }
}

/// A single `<number>. <text>` record.
///
/// Records are ordered by `text` (byte-wise) first and by `key` second, so two records
/// compare equal only if both fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, DeepSizeOf)]
pub struct Record {
    pub key: i64,
    pub text: String,
}

impl Record {
    pub fn new(key: i64, text: impl Into<String>) -> Self {
        Record { key, text: text.into() }
    }

    /// Parses a line without its terminator.
    ///
    /// The key is everything before the first `.`; spaces following the `.` are skipped and the
    /// rest of the line is the text, which may be empty.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let dot = match line.find('.') {
            Some(dot) if dot > 0 => dot,
            _ => return Err(ParseError::MissingDelimiter),
        };

        let key = line[..dot].trim().parse().map_err(ParseError::InvalidKey)?;
        let text = line[dot + 1..].trim_start_matches(' ');

        return Ok(Record::new(key, text));
    }

    /// Writes the record in its canonical form followed by [`LINE_TERMINATOR`].
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "{}{}{}", self.key, DELIMITER, self.text)?;
        writer.write_all(&[LINE_TERMINATOR])
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, DELIMITER, self.text)
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text
            .as_bytes()
            .cmp(other.text.as_bytes())
            .then(self.key.cmp(&other.key))
    }
}

/// Forward-only record cursor over a line-oriented reader.
///
/// Yields one parsed record per line. A malformed line is reported as [`SortError::Format`]
/// carrying the reader origin and the 1-based line number.
pub struct RecordReader<R> {
    reader: R,
    origin: String,
    line: String,
    line_number: u64,
    bytes_read: u64,
}

impl<R: BufRead> RecordReader<R> {
    /// Creates a cursor. `origin` names the underlying data in error messages.
    pub fn new(reader: R, origin: impl Into<String>) -> Self {
        RecordReader {
            reader,
            origin: origin.into(),
            line: String::new(),
            line_number: 0,
            bytes_read: 0,
        }
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Number of bytes consumed from the underlying reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn parse_line(&self) -> Result<Record, SortError> {
        // trailing `\r` belong to the line terminator, never to the text
        let mut line = self.line.strip_suffix('\n').unwrap_or(&self.line).trim_end_matches('\r');
        if self.line_number == 1 {
            line = line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line);
        }

        Record::parse(line).map_err(|err| SortError::Format {
            origin: self.origin.clone(),
            line_number: self.line_number,
            err,
        })
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => None,
            Ok(len) => {
                self.bytes_read += len as u64;
                self.line_number += 1;
                Some(self.parse_line())
            }
            Err(err) => Some(Err(SortError::IO(err))),
        }
    }
}
