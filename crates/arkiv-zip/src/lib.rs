//! ZIP archive codec.
//!
//! Reads and writes classic (non-zip64) ZIP archives:
//!
//! - STORE and raw DEFLATE payloads, through an injected [`DeflateCodec`]
//! - UNIX mode bits and entry kinds in the external attributes
//! - MS-DOS timestamps, UTF-8 name flag, entry and archive comments
//! - Optional CRC32 verification on read
//!
//! Reading starts at the end of central directory record; the central
//! directory is authoritative and local headers are only used to locate
//! payloads.
//!
//! # Example
//!
//! ```
//! use arkiv_common::{Archive, ArchiveFile};
//! use arkiv_zip::{decode_archive, encode_archive};
//!
//! let mut archive = Archive::new();
//! archive.add(ArchiveFile::directory("docs/"));
//! archive.add(ArchiveFile::file("docs/hello.txt", b"hello".to_vec()));
//! archive.set_comment("greetings");
//!
//! let bytes = encode_archive(&mut archive)?;
//! let decoded = decode_archive(&bytes)?;
//! assert_eq!(decoded.len(), 2);
//! assert_eq!(decoded.comment(), "greetings");
//! # Ok::<(), arkiv_zip::Error>(())
//! ```
//!
//! [`DeflateCodec`]: arkiv_common::DeflateCodec

mod archive;
pub mod dostime;
mod entry;
mod error;
mod writer;
pub mod zip;

pub use archive::{decode_archive, decode_archive_with, Files, ReadOptions, ZipArchive};
pub use entry::ZipEntry;
pub use error::{Error, Result};
pub use writer::{encode_archive, encode_archive_with, ZipEncoder};
pub use zip::CompressionMethod;
