//! Error types for arkiv-common.

use thiserror::Error;

/// Common error type for Arkiv operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("truncated input: needed {needed} bytes but only {available} available")]
    TruncatedInput { needed: usize, available: usize },

    /// Compression error.
    #[error("compression error: {0}")]
    Compression(String),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
