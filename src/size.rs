//! Human readable size parsing (`"500MB"`, `"2 GB"`, `"1024"`).

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use bytesize::{ByteSize, GIB, KIB, MIB, TIB};

const UNITS: [(&str, u64); 4] = [("KB", KIB), ("MB", MIB), ("GB", GIB), ("TB", TIB)];

/// Size string parsing error.
#[derive(Debug, Clone, PartialEq)]
pub enum SizeParseError {
    Empty,
    NotPositive,
    UnknownUnit(String),
    InvalidNumber(String),
    TooLarge(String),
}

impl Error for SizeParseError {}

impl Display for SizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SizeParseError::Empty => write!(f, "size is empty"),
            SizeParseError::NotPositive => write!(f, "size must be greater than zero"),
            SizeParseError::UnknownUnit(size) => {
                write!(f, "invalid size {:?}, examples: 500MB, 10GB, 123456", size)
            }
            SizeParseError::InvalidNumber(size) => write!(f, "invalid size value: {:?}", size),
            SizeParseError::TooLarge(size) => write!(f, "size is too large: {:?}", size),
        }
    }
}

/// Parses a size string into a byte count.
///
/// A plain integer is a number of bytes. Otherwise the value is a positive decimal number followed
/// by one of the case-insensitive `KB`, `MB`, `GB`, `TB` units, which are powers of 1024. Spaces are
/// ignored and fractional byte counts are truncated.
pub fn parse_size(size: &str) -> Result<ByteSize, SizeParseError> {
    let size = size.trim();
    if size.is_empty() {
        return Err(SizeParseError::Empty);
    }

    if let Ok(bytes) = size.parse::<i64>() {
        return if bytes > 0 {
            Ok(ByteSize(bytes as u64))
        } else {
            Err(SizeParseError::NotPositive)
        };
    }

    let compact: String = size.chars().filter(|c| *c != ' ').collect();
    let split = compact.len().saturating_sub(2);
    let (number, unit) = match (compact.get(..split), compact.get(split..)) {
        (Some(number), Some(unit)) => (number, unit.to_ascii_uppercase()),
        _ => return Err(SizeParseError::UnknownUnit(size.to_string())),
    };

    let multiplier = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, multiplier)| *multiplier)
        .ok_or_else(|| SizeParseError::UnknownUnit(size.to_string()))?;

    let value: f64 = number
        .parse()
        .map_err(|_| SizeParseError::InvalidNumber(size.to_string()))?;
    if !(value > 0.0) {
        return Err(SizeParseError::InvalidNumber(size.to_string()));
    }

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(SizeParseError::TooLarge(size.to_string()));
    }
    if bytes < 1.0 {
        return Err(SizeParseError::NotPositive);
    }

    return Ok(ByteSize(bytes as u64));
}

#[cfg(test)]
mod test {
    use bytesize::ByteSize;
    use rstest::*;

    use super::{parse_size, SizeParseError};

    #[rstest]
    #[case("1", 1)]
    #[case("1024", 1024)]
    #[case("  123456 ", 123456)]
    #[case("1KB", 1024)]
    #[case("1kb", 1024)]
    #[case("1 MB", 1024 * 1024)]
    #[case("500MB", 500 * 1024 * 1024)]
    #[case("2GB", 2 * 1024 * 1024 * 1024)]
    #[case("10 gB", 10 * 1024 * 1024 * 1024)]
    #[case("1TB", 1024 * 1024 * 1024 * 1024)]
    #[case("1.5KB", 1536)]
    #[case("0.5 GB", 512 * 1024 * 1024)]
    fn test_valid_sizes(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_size(input), Ok(ByteSize(expected)));
    }

    #[rstest]
    #[case("", SizeParseError::Empty)]
    #[case("   ", SizeParseError::Empty)]
    #[case("0", SizeParseError::NotPositive)]
    #[case("-1", SizeParseError::NotPositive)]
    #[case("0.0001KB", SizeParseError::NotPositive)]
    #[case("ABC", SizeParseError::UnknownUnit("ABC".to_string()))]
    #[case("10XB", SizeParseError::UnknownUnit("10XB".to_string()))]
    fn test_invalid_sizes(#[case] input: &str, #[case] expected: SizeParseError) {
        assert_eq!(parse_size(input), Err(expected));
    }

    #[rstest]
    #[case("MB")]
    #[case("-5MB")]
    #[case("0GB")]
    #[case("x1GB")]
    #[case("NaNGB")]
    fn test_invalid_numbers(#[case] input: &str) {
        assert!(matches!(parse_size(input), Err(SizeParseError::InvalidNumber(_))));
    }

    #[rstest]
    #[case("999999999999TB")]
    #[case("infTB")]
    fn test_too_large(#[case] input: &str) {
        assert!(matches!(parse_size(input), Err(SizeParseError::TooLarge(_))));
    }

    #[test]
    fn test_non_ascii_input() {
        assert!(matches!(parse_size("1ГБ"), Err(SizeParseError::UnknownUnit(_))));
        assert!(matches!(parse_size("ж"), Err(SizeParseError::UnknownUnit(_))));
    }
}
