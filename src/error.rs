//! The error type shared by every format in the crate.
//!
//! Structural problems (bad magic, sizes that don't add up, tiles that don't
//! line up) abort the current file. Nothing here is recoverable except
//! [`Error::OutOfRange`], and only when the caller asked for
//! [`ExtendPolicy::WrapExtend`](crate::mzp::ExtendPolicy::WrapExtend).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad {what} at offset {offset:#X}: expected {expected}, found {found}")]
    MalformedHeader {
        what: &'static str,
        offset: u64,
        expected: String,
        found: String,
    },

    #[error("unsupported bitmap type {bmp_type:#04X} with depth {bmp_depth:#04X}")]
    UnsupportedFormat { bmp_type: u16, bmp_depth: u8 },

    #[error("{what}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("tile {index} is out of range for {entries} tile entries")]
    OutOfRange { index: usize, entries: usize },

    #[error("invalid {what} transparency byte {value:#04X} at index {index}")]
    InvalidTransparencyByte {
        what: &'static str,
        value: u32,
        index: usize,
    },

    #[error("tile assembly failed at row {row}: {reason}")]
    AssemblyError { row: usize, reason: String },

    #[error("back-reference of {distance} bytes at output position {position} reaches before the start of the window")]
    DecodeWindowUnderflow { position: usize, distance: usize },

    #[error("value {value:#X} does not fit the {field} field (max {max:#X})")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("offset {offset:#X} is not aligned to {alignment:#X}")]
    Misaligned { offset: u64, alignment: u64 },

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A magic/signature mismatch, rendered as hex so binary junk stays readable.
    pub(crate) fn bad_magic(what: &'static str, offset: u64, expected: &[u8], found: &[u8]) -> Error {
        Error::MalformedHeader {
            what,
            offset,
            expected: format!("{:02X?}", expected),
            found: format!("{:02X?}", found),
        }
    }

    pub(crate) fn size_mismatch(what: &'static str, expected: u64, actual: u64) -> Error {
        Error::SizeMismatch {
            what,
            expected,
            actual,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
