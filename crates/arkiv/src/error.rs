//! Unified error type for the facade.

use thiserror::Error;

/// Errors from any of the archive codecs.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] arkiv_common::Error),

    /// ZIP codec error.
    #[error("zip: {0}")]
    Zip(#[from] arkiv_zip::Error),

    /// TAR codec error.
    #[error("tar: {0}")]
    Tar(#[from] arkiv_tar::Error),

    /// GZIP framing error.
    #[error("gzip: {0}")]
    Gzip(#[from] std::io::Error),

    /// The input is not a recognized archive.
    #[error("unrecognized archive format")]
    UnknownFormat,
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, Error>;
