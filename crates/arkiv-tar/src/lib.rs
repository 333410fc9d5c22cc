//! TAR archive codec.
//!
//! Reads and writes POSIX USTAR archives with the GNU long-name escape:
//!
//! - Fixed 512-byte headers with octal numeric fields and a byte-sum checksum
//! - Content padded with zeros to the next 512-byte boundary
//! - `././@LongLink` pseudo-entries for names and link targets over 100 bytes
//! - PAX extended headers recognized and skipped
//! - Two all-zero blocks as the terminator
//!
//! # Example
//!
//! ```
//! use arkiv_common::{Archive, ArchiveFile};
//! use arkiv_tar::{decode_archive, encode_archive};
//!
//! let mut archive = Archive::new();
//! archive.add(ArchiveFile::directory("docs/"));
//! archive.add(ArchiveFile::file("docs/hello.txt", b"hello".to_vec()));
//!
//! let bytes = encode_archive(&mut archive)?;
//! assert_eq!(bytes.len() % 512, 0);
//!
//! let decoded = decode_archive(&bytes)?;
//! assert_eq!(decoded.len(), 2);
//! # Ok::<(), arkiv_tar::Error>(())
//! ```

mod decoder;
mod encoder;
mod error;
pub mod header;

pub use decoder::{decode_archive, decode_archive_with, files, TarDecoder};
pub use encoder::{encode_archive, encode_archive_with, TarEncoder};
pub use error::{Error, Result};
pub use header::{TarFile, TypeFlag, Ustar};
