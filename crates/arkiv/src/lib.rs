//! Arkiv - ZIP and TAR archives over one in-memory model.
//!
//! This crate provides a unified interface to the Arkiv library ecosystem.
//!
//! # Crates
//!
//! - [`arkiv_common`] - Archive model, binary reading, CRC32, DEFLATE codec
//! - [`arkiv_zip`] - ZIP reading and writing (STORE + DEFLATE)
//! - [`arkiv_tar`] - TAR reading and writing (USTAR + GNU long names)
//!
//! # Example
//!
//! ```
//! use arkiv::prelude::*;
//!
//! let mut archive = Archive::new();
//! archive.add(ArchiveFile::file("hello.txt", b"hello".to_vec()));
//!
//! let bytes = arkiv::encode(&mut archive, ArchiveFormat::TarGz)?;
//! assert_eq!(ArchiveFormat::detect(&bytes), Some(ArchiveFormat::TarGz));
//!
//! let decoded = arkiv::decode(&bytes)?;
//! assert_eq!(decoded.files()[0].name(), "hello.txt");
//! # Ok::<(), arkiv::Error>(())
//! ```

// Re-export all sub-crates
pub use arkiv_common as common;
pub use arkiv_tar as tar;
pub use arkiv_zip as zip;

mod error;
mod format;
pub mod gzip;

pub use error::{Error, Result};
pub use format::ArchiveFormat;

use arkiv_common::{Archive, FlateCodec};
use log::debug;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::ArchiveFormat;
    pub use arkiv_common::{
        Archive, ArchiveFile, CompressionKind, Content, DeflateCodec, EntryKind, FlateCodec,
    };
    pub use arkiv_tar::{TarDecoder, TarEncoder};
    pub use arkiv_zip::{ReadOptions, ZipArchive, ZipEncoder};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options for [`decode_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Check ZIP CRC32s and TAR header checksums.
    pub verify: bool,
}

/// Decode an archive, sniffing its format.
pub fn decode(data: &[u8]) -> Result<Archive> {
    decode_with(data, DecodeOptions::default())
}

/// Decode an archive with explicit options, sniffing its format.
pub fn decode_with(data: &[u8], options: DecodeOptions) -> Result<Archive> {
    let format = ArchiveFormat::detect(data).ok_or(Error::UnknownFormat)?;
    decode_as(data, format, options)
}

/// Decode an archive of a known format.
pub fn decode_as(data: &[u8], format: ArchiveFormat, options: DecodeOptions) -> Result<Archive> {
    debug!("decoding {} bytes as {}", data.len(), format);
    let archive = match format {
        ArchiveFormat::Zip => arkiv_zip::decode_archive_with(
            data,
            arkiv_zip::ReadOptions {
                verify_crc: options.verify,
            },
            FlateCodec::default(),
        )?,
        ArchiveFormat::Tar => arkiv_tar::decode_archive_with(data, options.verify)?,
        ArchiveFormat::TarGz => {
            let tar = gzip::decompress(data)?;
            arkiv_tar::decode_archive_with(&tar, options.verify)?
        }
    };
    Ok(archive)
}

/// Encode an archive with the default compression level.
pub fn encode(archive: &mut Archive, format: ArchiveFormat) -> Result<Vec<u8>> {
    encode_with(archive, format, FlateCodec::default())
}

/// Encode an archive, compressing with `codec`.
///
/// For [`ArchiveFormat::TarGz`] the codec's level is used for the GZIP layer.
pub fn encode_with(
    archive: &mut Archive,
    format: ArchiveFormat,
    codec: FlateCodec,
) -> Result<Vec<u8>> {
    let data = match format {
        ArchiveFormat::Zip => arkiv_zip::encode_archive_with(archive, codec)?,
        ArchiveFormat::Tar => arkiv_tar::encode_archive_with(archive, codec)?,
        ArchiveFormat::TarGz => {
            let tar = arkiv_tar::encode_archive_with(archive, codec)?;
            gzip::compress(&tar, codec.level())?
        }
    };
    debug!("encoded {} entries as {} ({} bytes)", archive.len(), format, data.len());
    Ok(data)
}
