//! Common utilities for Arkiv.
//!
//! This crate provides the foundational types shared by the ZIP and TAR codecs:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`crc`] - CRC32 hashing utilities
//! - [`DeflateCodec`] - The injected raw DEFLATE capability, with [`FlateCodec`]
//!   as the default implementation
//! - [`Archive`] / [`ArchiveFile`] - The format-agnostic archive model

mod archive;
mod codec;
mod error;
mod reader;

pub mod crc;

pub use archive::{
    classify_entry, mode, Archive, ArchiveFile, CompressionKind, Content, EntryKind,
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_SYMLINK_MODE, DOS_DIRECTORY_ATTR,
    PERMISSION_MASK, UNIX_CREATORS,
};
pub use codec::{DeflateCodec, FlateCodec};
pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};
