//! End of Central Directory (EOCD) structures.

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// End of Central Directory Record (without signature).
///
/// This is the standard ZIP EOCD record found at the end of the archive,
/// followed only by the archive comment. The 4-byte signature (0x06054b50)
/// is read separately before this struct.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct EocdRecord {
    /// Number of this disk
    pub disk_number: U16,
    /// Disk where central directory starts
    pub central_dir_disk: U16,
    /// Number of central directory records on this disk
    pub central_dir_count_disk: U16,
    /// Total number of central directory records
    pub central_dir_count_total: U16,
    /// Size of central directory (bytes)
    pub central_dir_size: U32,
    /// Offset of start of central directory
    pub central_dir_offset: U32,
    /// Comment length
    pub comment_length: U16,
}

impl EocdRecord {
    /// EOCD signature bytes.
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    /// EOCD signature as u32.
    pub const SIGNATURE: u32 = 0x06054b50;

    /// Size of the fixed part including the signature.
    pub const SIZE: usize = 4 + std::mem::size_of::<Self>();

    /// Check if this archive uses ZIP64 extensions.
    ///
    /// Returns true if any of the fields contain sentinel values
    /// indicating ZIP64 format.
    pub fn is_zip64(&self) -> bool {
        self.central_dir_count_total.get() == 0xFFFF
            || self.central_dir_offset.get() == 0xFFFFFFFF
            || self.central_dir_size.get() == 0xFFFFFFFF
    }

    /// Append the signature and fixed fields.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&Self::MAGIC);
        out.extend_from_slice(self.as_bytes());
    }
}
