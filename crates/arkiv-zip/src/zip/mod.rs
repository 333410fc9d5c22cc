//! ZIP format structures.
//!
//! This module contains the low-level, byte-exact structures of the classic
//! (non-zip64) ZIP layout and the constants written into them.

mod central_dir;
mod eocd;
mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::EocdRecord;
pub use local::LocalFileHeader;

/// Compression methods supported by this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store = 0,
    /// DEFLATE compression.
    Deflate = 8,
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Store),
            8 => Ok(Self::Deflate),
            other => Err(other),
        }
    }
}

/// General purpose bit flags.
pub mod flags {
    /// Entry is encrypted.
    pub const ENCRYPTED: u16 = 0x0001;
    /// Sizes and CRC follow the payload in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    /// Name and comment are UTF-8.
    pub const UTF8: u16 = 0x0800;
}

/// Creator OS code for UNIX.
pub const OS_UNIX: u8 = 3;

/// "Version made by": UNIX, APPNOTE 3.0.
pub const VERSION_MADE_BY: u16 = (OS_UNIX as u16) << 8 | 30;

/// Version needed to extract deflated entries.
pub const VERSION_DEFLATE: u16 = 20;

/// Version needed to extract stored entries and directories.
pub const VERSION_STORE: u16 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(LocalFileHeader::SIZE, 30);
        assert_eq!(CentralDirectoryHeader::SIZE, 46);
        assert_eq!(EocdRecord::SIZE, 22);
    }

    #[test]
    fn test_signatures_match_magic() {
        assert_eq!(u32::from_le_bytes(LocalFileHeader::MAGIC), LocalFileHeader::SIGNATURE);
        assert_eq!(
            u32::from_le_bytes(CentralDirectoryHeader::MAGIC),
            CentralDirectoryHeader::SIGNATURE
        );
        assert_eq!(u32::from_le_bytes(EocdRecord::MAGIC), EocdRecord::SIGNATURE);
    }

    #[test]
    fn test_compression_method_codes() {
        assert_eq!(CompressionMethod::try_from(0), Ok(CompressionMethod::Store));
        assert_eq!(CompressionMethod::try_from(8), Ok(CompressionMethod::Deflate));
        assert_eq!(CompressionMethod::try_from(12), Err(12));
        assert_eq!(VERSION_MADE_BY, 0x031E);
    }
}
