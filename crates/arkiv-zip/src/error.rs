//! Error types for the ZIP crate.

use thiserror::Error;

/// Errors that can occur when working with ZIP archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] arkiv_common::Error),

    /// Invalid ZIP magic bytes.
    #[error("invalid ZIP signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// Could not find the end of central directory record.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Archive uses a feature this codec does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Decoded content does not match the stored CRC32.
    #[error("CRC mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Entry name or comment cannot be stored or decoded.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Entry kind cannot be written to a ZIP archive.
    #[error("cannot add {kind} entry {name} to a ZIP archive")]
    UnsupportedEntity { name: String, kind: &'static str },

    /// A size, offset or count exceeds the classic ZIP limits.
    #[error("{0} exceeds the ZIP limit (zip64 is not supported)")]
    Zip64Required(&'static str),
}

/// Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;
