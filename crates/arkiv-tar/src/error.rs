//! Error types for the TAR crate.

use thiserror::Error;

/// Errors that can occur when reading or writing TAR archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] arkiv_common::Error),

    /// A header field could not be decoded.
    #[error("invalid {field} field: {reason}")]
    InvalidHeader { field: &'static str, reason: String },

    /// A numeric value does not fit its octal header field.
    #[error("value {value} does not fit the {field} field")]
    FieldOverflow { field: &'static str, value: u64 },

    /// Header checksum did not match the stored value.
    #[error("header checksum mismatch at offset {offset}: stored {expected:o}, computed {actual:o}")]
    ChecksumMismatch {
        offset: usize,
        expected: u32,
        actual: u32,
    },
}

/// Result type for TAR operations.
pub type Result<T> = std::result::Result<T, Error>;
