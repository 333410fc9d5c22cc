//! Format-agnostic archive model.
//!
//! [`Archive`] is an ordered list of [`ArchiveFile`]s plus an archive-level
//! comment. Both the ZIP and the TAR codecs decode into it and encode from it.

use log::trace;

use crate::codec::DeflateCodec;
use crate::crc;
use crate::Result;

/// Permission bits kept on an entry.
pub const PERMISSION_MASK: u32 = 0o7777;

/// POSIX file type bits, as stored in ZIP external attributes.
pub mod mode {
    /// Mask selecting the file type.
    pub const S_IFMT: u32 = 0o170000;
    /// Regular file.
    pub const S_IFREG: u32 = 0o100000;
    /// Directory.
    pub const S_IFDIR: u32 = 0o040000;
    /// Symbolic link.
    pub const S_IFLNK: u32 = 0o120000;
}

/// Default permissions for new regular files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default permissions for new directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Default permissions for new symlinks.
pub const DEFAULT_SYMLINK_MODE: u32 = 0o777;

/// Creator platforms (high byte of ZIP "version made by") whose external
/// attributes carry a UNIX mode in the upper 16 bits.
pub const UNIX_CREATORS: [u8; 2] = [3, 19];

/// MS-DOS directory attribute bit.
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// What an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file with content.
    File,
    /// Directory marker, never has content.
    Directory,
    /// Symbolic link; the content is the target path.
    Symlink,
}

impl EntryKind {
    /// The POSIX type bits for this kind.
    pub const fn type_bits(self) -> u32 {
        match self {
            Self::File => mode::S_IFREG,
            Self::Directory => mode::S_IFDIR,
            Self::Symlink => mode::S_IFLNK,
        }
    }
}

/// Decide what an entry is from the creator platform, external attributes and
/// name.
///
/// UNIX-family creators store `st_mode` in the upper 16 bits of the external
/// attributes; when those bits are present they win. Everything else falls
/// back to the trailing slash convention and the MS-DOS directory bit.
pub fn classify_entry(creator_os: u8, external_attrs: u32, name: &str) -> EntryKind {
    let unix_mode = external_attrs >> 16;
    if UNIX_CREATORS.contains(&creator_os) && unix_mode & mode::S_IFMT != 0 {
        return match unix_mode & mode::S_IFMT {
            mode::S_IFDIR => EntryKind::Directory,
            mode::S_IFLNK => EntryKind::Symlink,
            _ => EntryKind::File,
        };
    }

    if name.ends_with('/') || external_attrs & DOS_DIRECTORY_ATTR != 0 {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

/// Compression applied to still-packed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Raw DEFLATE stream.
    Deflate,
}

/// Entry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Uncompressed bytes.
    Raw(Vec<u8>),
    /// Bytes still in their packed form, inflated on demand.
    Compressed {
        data: Vec<u8>,
        kind: CompressionKind,
    },
}

impl Content {
    /// Whether the content is still packed.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }
}

/// A single named entry of an [`Archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    name: String,
    kind: EntryKind,
    content: Content,
    size: u64,
    crc32: Option<u32>,
    mode: u32,
    last_modified: u64,
    compress: bool,
    comment: Option<String>,
}

impl ArchiveFile {
    fn with_kind(name: String, kind: EntryKind, content: Content, size: u64, mode: u32) -> Self {
        Self {
            name,
            kind,
            content,
            size,
            crc32: None,
            mode,
            last_modified: now(),
            compress: true,
            comment: None,
        }
    }

    /// Create a regular file from uncompressed bytes.
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::with_kind(
            name.into(),
            EntryKind::File,
            Content::Raw(data),
            size,
            DEFAULT_FILE_MODE,
        )
    }

    /// Create a regular file whose bytes are still compressed.
    ///
    /// `size` is the uncompressed length.
    pub fn compressed(
        name: impl Into<String>,
        size: u64,
        data: impl Into<Vec<u8>>,
        kind: CompressionKind,
    ) -> Self {
        Self::with_kind(
            name.into(),
            EntryKind::File,
            Content::Compressed {
                data: data.into(),
                kind,
            },
            size,
            DEFAULT_FILE_MODE,
        )
    }

    /// Create a directory marker.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::with_kind(
            name.into(),
            EntryKind::Directory,
            Content::Raw(Vec::new()),
            0,
            DEFAULT_DIR_MODE,
        )
    }

    /// Create a symbolic link pointing at `target`.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into().into_bytes();
        let size = target.len() as u64;
        Self::with_kind(
            name.into(),
            EntryKind::Symlink,
            Content::Raw(target),
            size,
            DEFAULT_SYMLINK_MODE,
        )
    }

    /// Set the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.set_mode(mode);
        self
    }

    /// Set the modification time (Unix seconds).
    pub fn with_last_modified(mut self, last_modified: u64) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Set whether encoders should compress this entry.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Attach a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Record a known CRC32 of the uncompressed content.
    pub fn with_crc32(mut self, crc32: u32) -> Self {
        self.crc32 = Some(crc32);
        self
    }

    /// Entry name (POSIX path).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the entry.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Entry kind.
    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Check if this entry is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Check if this entry is a directory.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Check if this entry is a symbolic link.
    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    /// Uncompressed size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Permission bits.
    #[inline]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Set the permission bits; file type bits are dropped.
    pub fn set_mode(&mut self, mode: u32) {
        self.mode = mode & PERMISSION_MASK;
    }

    /// Modification time in Unix seconds.
    #[inline]
    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// Set the modification time (Unix seconds).
    pub fn set_last_modified(&mut self, last_modified: u64) {
        self.last_modified = last_modified;
    }

    /// Whether encoders should compress this entry.
    #[inline]
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Set whether encoders should compress this entry.
    pub fn set_compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    /// Entry comment.
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Known CRC32 of the uncompressed content, if any.
    #[inline]
    pub fn crc32(&self) -> Option<u32> {
        self.crc32
    }

    /// The content in its current form.
    #[inline]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The uncompressed bytes, if the content is not packed.
    pub fn raw_content(&self) -> Option<&[u8]> {
        match &self.content {
            Content::Raw(data) => Some(data),
            Content::Compressed { .. } => None,
        }
    }

    /// The symlink target, for symlink entries with UTF-8 targets.
    pub fn symlink_target(&self) -> Option<&str> {
        if !self.is_symlink() {
            return None;
        }
        self.raw_content()
            .and_then(|data| std::str::from_utf8(data).ok())
    }

    /// Inflate packed content in place so later reads see [`Content::Raw`].
    pub fn decompress<C: DeflateCodec + ?Sized>(&mut self, codec: &C) -> Result<()> {
        if let Content::Compressed { data, kind } = &self.content {
            let raw = match kind {
                CompressionKind::Deflate => codec.decompress(data, self.size as usize)?,
            };
            trace!(
                "inflated {}: {} -> {} bytes",
                self.name,
                data.len(),
                raw.len()
            );
            self.size = raw.len() as u64;
            self.content = Content::Raw(raw);
        }
        Ok(())
    }

    /// Uncompressed bytes, inflating (and caching) them first if needed.
    pub fn data<C: DeflateCodec + ?Sized>(&mut self, codec: &C) -> Result<&[u8]> {
        self.decompress(codec)?;
        match &self.content {
            Content::Raw(data) => Ok(data),
            Content::Compressed { .. } => unreachable!("content was just decompressed"),
        }
    }

    /// CRC32 of the uncompressed content, computed and memoized when unknown.
    pub fn compute_crc32<C: DeflateCodec + ?Sized>(&mut self, codec: &C) -> Result<u32> {
        if let Some(crc) = self.crc32 {
            return Ok(crc);
        }
        let crc = crc::crc32(self.data(codec)?);
        self.crc32 = Some(crc);
        Ok(crc)
    }

    /// Take the content out of the entry.
    pub fn into_content(self) -> Content {
        self.content
    }
}

/// An ordered collection of entries with an archive-level comment.
///
/// Names are not required to be unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    files: Vec<ArchiveFile>,
    comment: String,
}

impl Archive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn add(&mut self, file: ArchiveFile) {
        self.files.push(file);
    }

    /// Entries in order.
    #[inline]
    pub fn files(&self) -> &[ArchiveFile] {
        &self.files
    }

    /// Mutable entries in order.
    #[inline]
    pub fn files_mut(&mut self) -> &mut [ArchiveFile] {
        &mut self.files
    }

    /// Iterate over entries.
    pub fn iter(&self) -> std::slice::Iter<'_, ArchiveFile> {
        self.files.iter()
    }

    /// Iterate mutably over entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ArchiveFile> {
        self.files.iter_mut()
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the archive has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Find the last entry with the given name.
    pub fn find(&self, name: &str) -> Option<&ArchiveFile> {
        self.files.iter().rev().find(|f| f.name == name)
    }

    /// Archive comment.
    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the archive comment.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }
}

impl IntoIterator for Archive {
    type Item = ArchiveFile;
    type IntoIter = std::vec::IntoIter<ArchiveFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a ArchiveFile;
    type IntoIter = std::slice::Iter<'a, ArchiveFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl FromIterator<ArchiveFile> for Archive {
    fn from_iter<I: IntoIterator<Item = ArchiveFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
            comment: String::new(),
        }
    }
}

impl Extend<ArchiveFile> for Archive {
    fn extend<I: IntoIterator<Item = ArchiveFile>>(&mut self, iter: I) {
        self.files.extend(iter);
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
