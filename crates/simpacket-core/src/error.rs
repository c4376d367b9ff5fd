//! Error types for decoding transfer forms.
//!
//! Buffer, metadata and packet operations treat broken invariants as programming errors
//! and panic. The only recoverable failures are bytes handed in from outside, such as a
//! serialized packet received from another simulation partition.

use std::io;

use thiserror::Error;

/// Top-level error type for decoding operations.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The transfer bytes were malformed.
    #[error("decoding error: {0}")]
    DecodingError(#[from] DecodingErrorKind),

    /// The transfer bytes ended before the announced length.
    #[error("truncated input: need {needed} bytes, got {available}")]
    Truncated {
        /// Number of bytes the decoder needed.
        needed: usize,
        /// Number of bytes that were available.
        available: usize,
    },

    /// Reading from the underlying cursor failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Specific decoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodingErrorKind {
    /// A metadata item carried an unknown kind byte.
    #[error("invalid item kind {0}")]
    ItemKind(u8),

    /// A metadata item carried a chunk type uid too large to record.
    #[error("invalid chunk type uid {0}")]
    TypeUid(u32),

    /// A metadata item carried a fragment range outside its original size.
    #[error("invalid fragment range {start}..{end} for item of size {size}")]
    FragmentRange {
        /// Fragment start.
        start: u32,
        /// Fragment end.
        end: u32,
        /// Original item size.
        size: u32,
    },

    /// A length prefix disagreed with the bytes actually consumed.
    #[error("length mismatch: header says {expected}, got {actual}")]
    LengthMismatch {
        /// Announced length.
        expected: usize,
        /// Consumed length.
        actual: usize,
    },

    /// Bytes were left over after a complete decode.
    #[error("{0} trailing bytes after decode")]
    TrailingBytes(usize),

    /// The decoded sizes add up to more than a buffer can address.
    #[error("decoded size {0} exceeds the addressable range")]
    SizeOverflow(u64),
}

/// Type alias for Result with our error type.
pub type Result<T> = std::result::Result<T, ErrorKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoding_error_converts() {
        let err: ErrorKind = DecodingErrorKind::ItemKind(7).into();
        assert!(matches!(err, ErrorKind::DecodingError(DecodingErrorKind::ItemKind(7))));
        assert_eq!(err.to_string(), "decoding error: invalid item kind 7");
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: ErrorKind = io_err.into();
        assert!(matches!(err, ErrorKind::Io(_)));
    }
}
