//! ZIP archive entry.

use arkiv_common::{classify_entry, EntryKind, PERMISSION_MASK};

use crate::dostime;
use crate::zip::{flags, CentralDirectoryHeader, CompressionMethod};

/// Metadata of one entry, as recorded in the central directory.
///
/// This contains metadata about the file, not the file data itself.
/// Use [`ZipArchive::read`](crate::ZipArchive::read) to get the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// File name/path within the archive.
    name: String,
    /// File, directory or symlink.
    kind: EntryKind,
    /// Raw compression method code.
    method: u16,
    /// General purpose bit flag.
    flags: u16,
    /// Version made by (high byte: creator OS).
    version_made_by: u16,
    /// DOS modification time.
    dos_time: u16,
    /// DOS modification date.
    dos_date: u16,
    /// CRC32 checksum of uncompressed data.
    crc32: u32,
    /// Compressed size in bytes.
    compressed_size: u64,
    /// Uncompressed size in bytes.
    uncompressed_size: u64,
    /// External file attributes.
    external_attrs: u32,
    /// Offset to the local file header in the archive.
    local_header_offset: u64,
    /// Per-entry comment.
    comment: Option<String>,
}

impl ZipEntry {
    pub(crate) fn from_central(
        header: &CentralDirectoryHeader,
        name: String,
        comment: Option<String>,
    ) -> Self {
        let external_attrs = header.external_attrs.get();
        let kind = classify_entry(header.creator_os(), external_attrs, &name);
        Self {
            name,
            kind,
            method: header.compression_method.get(),
            flags: header.flags.get(),
            version_made_by: header.version_made_by.get(),
            dos_time: header.last_mod_time.get(),
            dos_date: header.last_mod_date.get(),
            crc32: header.crc32.get(),
            compressed_size: header.compressed_size.get() as u64,
            uncompressed_size: header.uncompressed_size.get() as u64,
            external_attrs,
            local_header_offset: header.local_header_offset.get() as u64,
            comment,
        }
    }

    /// Get the file name/path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the entry represents.
    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Get the raw compression method code.
    #[inline]
    pub fn method(&self) -> u16 {
        self.method
    }

    /// Get the compression method, if it is one this codec supports.
    pub fn compression_method(&self) -> Option<CompressionMethod> {
        CompressionMethod::try_from(self.method).ok()
    }

    /// Get the general purpose bit flag.
    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Check if the entry is encrypted.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Get the "version made by" field.
    #[inline]
    pub fn version_made_by(&self) -> u16 {
        self.version_made_by
    }

    /// Platform that created the entry.
    #[inline]
    pub fn creator_os(&self) -> u8 {
        (self.version_made_by >> 8) as u8
    }

    /// Get the CRC32 checksum.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the compressed size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the uncompressed size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Get the external file attributes.
    #[inline]
    pub fn external_attrs(&self) -> u32 {
        self.external_attrs
    }

    /// UNIX permission bits, when the creator recorded them.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attrs >> 16;
        (arkiv_common::UNIX_CREATORS.contains(&self.creator_os()) && mode != 0)
            .then_some(mode & PERMISSION_MASK)
    }

    /// Get the raw DOS `(time, date)` pair.
    #[inline]
    pub fn dos_datetime(&self) -> (u16, u16) {
        (self.dos_time, self.dos_date)
    }

    /// Get the last modification time in Unix seconds.
    ///
    /// Returns None if the DOS datetime is invalid.
    pub fn last_modified(&self) -> Option<u64> {
        dostime::from_dos(self.dos_time, self.dos_date)
    }

    /// Get the offset to the local file header.
    #[inline]
    pub(crate) fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    /// Get the entry comment.
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Get the compression ratio (compressed / uncompressed).
    ///
    /// Returns 1.0 for empty entries.
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.uncompressed_size as f64
        }
    }
}
