//! TAR header records.
//!
//! A record is one 512-byte header block followed by its content, zero-padded
//! to the next block boundary. String fields are NUL-terminated ASCII/UTF-8,
//! numeric fields are octal text.

use arkiv_common::{ArchiveFile, BinaryReader};
use log::trace;

use crate::{Error, Result};

/// Size of a header block and the padding granularity of content.
pub const BLOCK_SIZE: usize = 512;

/// Width of the name and link name fields.
pub const NAME_LEN: usize = 100;

/// Name used by GNU tar for long-name pseudo-entries.
pub const LONG_LINK_NAME: &str = "././@LongLink";

/// USTAR indicator written into the magic field.
const USTAR_MAGIC: &[u8; 6] = b"ustar\0";
const USTAR_VERSION: &[u8; 2] = b"00";

/// Header field positions.
mod field {
    use std::ops::Range;

    pub const NAME: Range<usize> = 0..100;
    pub const MODE: Range<usize> = 100..108;
    pub const UID: Range<usize> = 108..116;
    pub const GID: Range<usize> = 116..124;
    pub const SIZE: Range<usize> = 124..136;
    pub const MTIME: Range<usize> = 136..148;
    pub const CHECKSUM: Range<usize> = 148..156;
    pub const TYPEFLAG: usize = 156;
    pub const LINKNAME: Range<usize> = 157..257;
    pub const MAGIC: Range<usize> = 257..263;
    pub const VERSION: Range<usize> = 263..265;
    pub const UNAME: Range<usize> = 265..297;
    pub const GNAME: Range<usize> = 297..329;
    pub const DEVMAJOR: Range<usize> = 329..337;
    pub const DEVMINOR: Range<usize> = 337..345;
    pub const PREFIX: Range<usize> = 345..500;
}

/// Entry type stored in the type flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFlag {
    /// Regular file ('0' or NUL).
    Normal,
    HardLink,
    Symlink,
    CharDevice,
    BlockDevice,
    Directory,
    Fifo,
    Contiguous,
    /// PAX global extended header ('g').
    GlobalExtendedHeader,
    /// PAX extended header ('x').
    ExtendedHeader,
    /// GNU long name for the next entry ('L').
    GnuLongName,
    /// GNU long link name for the next entry ('K').
    GnuLongLink,
    /// Any other byte, preserved as-is.
    Other(u8),
}

impl TypeFlag {
    /// Decode a type flag byte.
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | 0 => Self::Normal,
            b'1' => Self::HardLink,
            b'2' => Self::Symlink,
            b'3' => Self::CharDevice,
            b'4' => Self::BlockDevice,
            b'5' => Self::Directory,
            b'6' => Self::Fifo,
            b'7' => Self::Contiguous,
            b'g' => Self::GlobalExtendedHeader,
            b'x' => Self::ExtendedHeader,
            b'L' => Self::GnuLongName,
            b'K' => Self::GnuLongLink,
            other => Self::Other(other),
        }
    }

    /// Encode as a type flag byte.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Normal => b'0',
            Self::HardLink => b'1',
            Self::Symlink => b'2',
            Self::CharDevice => b'3',
            Self::BlockDevice => b'4',
            Self::Directory => b'5',
            Self::Fifo => b'6',
            Self::Contiguous => b'7',
            Self::GlobalExtendedHeader => b'g',
            Self::ExtendedHeader => b'x',
            Self::GnuLongName => b'L',
            Self::GnuLongLink => b'K',
            Self::Other(byte) => byte,
        }
    }

    #[inline]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// USTAR extension fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ustar {
    pub owner_name: String,
    pub group_name: String,
    pub device_major: u32,
    pub device_minor: u32,
    /// Leading path components, joined with the name on read.
    pub prefix: String,
}

/// One TAR header record and its content.
///
/// The content borrows from the archive buffer on read and from the source
/// entry on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarFile<'a> {
    pub name: String,
    pub mode: u32,
    pub owner_id: u32,
    pub group_id: u32,
    pub size: u64,
    /// Modification time in Unix seconds.
    pub last_modified: u64,
    /// Checksum as stored in the header (zero for records not yet written).
    pub checksum: u32,
    pub type_flag: TypeFlag,
    pub link_name: String,
    pub ustar: Option<Ustar>,
    pub content: &'a [u8],
}

impl<'a> TarFile<'a> {
    /// Create a record of the given type with default metadata.
    pub fn new(name: impl Into<String>, type_flag: TypeFlag) -> Self {
        Self {
            name: name.into(),
            mode: 0o644,
            owner_id: 0,
            group_id: 0,
            size: 0,
            last_modified: 0,
            checksum: 0,
            type_flag,
            link_name: String::new(),
            ustar: Some(Ustar::default()),
            content: &[],
        }
    }

    /// Attach content and set the size accordingly.
    pub fn with_content(mut self, content: &'a [u8]) -> Self {
        self.size = content.len() as u64;
        self.content = content;
        self
    }

    /// GNU pseudo-entry carrying a long name (or link name) for the next record.
    pub fn long_name_marker(type_flag: TypeFlag, long_name: &'a [u8]) -> Self {
        Self::new(LONG_LINK_NAME, type_flag).with_content(long_name)
    }

    /// Whether a record with this type carries content blocks.
    #[inline]
    pub fn has_content(&self) -> bool {
        !self.type_flag.is_directory() && self.size > 0
    }

    /// Read one header and its content, leaving the reader on the next block.
    pub fn read(reader: &mut BinaryReader<'a>) -> Result<Self> {
        let offset = reader.position();
        let block = reader.read_bytes(BLOCK_SIZE)?;
        let mut file = Self::parse_header(block)?;

        if file.has_content() {
            let size = usize::try_from(file.size).map_err(|_| Error::InvalidHeader {
                field: "size",
                reason: format!("{} bytes does not fit in memory", file.size),
            })?;
            file.content = reader.read_bytes(size)?;
            reader.skip(padding(size))?;
        }

        trace!(
            "tar record at {}: {:?} {} ({} bytes)",
            offset,
            file.type_flag,
            file.name,
            file.size
        );
        Ok(file)
    }

    /// Parse a 512-byte header block. Content is left empty.
    pub fn parse_header(block: &[u8]) -> Result<Self> {
        if block.len() < BLOCK_SIZE {
            return Err(arkiv_common::Error::TruncatedInput {
                needed: BLOCK_SIZE,
                available: block.len(),
            }
            .into());
        }

        let mut name = parse_string(&block[field::NAME], "name")?;
        let ustar = if block[field::MAGIC].starts_with(b"ustar") {
            // GNU tar reuses the prefix area, only POSIX "ustar\0" has one.
            let prefix = if &block[field::MAGIC] == USTAR_MAGIC {
                parse_string(&block[field::PREFIX], "prefix")?
            } else {
                String::new()
            };
            Some(Ustar {
                owner_name: parse_string(&block[field::UNAME], "uname")?,
                group_name: parse_string(&block[field::GNAME], "gname")?,
                device_major: parse_octal(&block[field::DEVMAJOR]) as u32,
                device_minor: parse_octal(&block[field::DEVMINOR]) as u32,
                prefix,
            })
        } else {
            None
        };

        if let Some(prefix) = ustar.as_ref().map(|u| &u.prefix).filter(|p| !p.is_empty()) {
            name = format!("{}/{}", prefix, name);
        }

        Ok(Self {
            name,
            mode: parse_octal(&block[field::MODE]) as u32,
            owner_id: parse_octal(&block[field::UID]) as u32,
            group_id: parse_octal(&block[field::GID]) as u32,
            size: parse_octal(&block[field::SIZE]),
            last_modified: parse_octal(&block[field::MTIME]),
            checksum: parse_octal(&block[field::CHECKSUM]) as u32,
            type_flag: TypeFlag::from_byte(block[field::TYPEFLAG]),
            link_name: parse_string(&block[field::LINKNAME], "linkname")?,
            ustar,
            content: &[],
        })
    }

    /// Serialize the header, content and padding.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let expected = if self.type_flag.is_directory() {
            0
        } else {
            self.content.len() as u64
        };
        if self.size != expected {
            return Err(Error::InvalidHeader {
                field: "size",
                reason: format!("header says {} bytes, content has {}", self.size, expected),
            });
        }

        out.extend_from_slice(&self.header_block()?);
        if self.has_content() {
            out.extend_from_slice(self.content);
            out.resize(out.len() + padding(self.content.len()), 0);
        }
        Ok(())
    }

    /// Build the 512-byte header block with its checksum patched in.
    pub fn header_block(&self) -> Result<[u8; BLOCK_SIZE]> {
        let mut block = [0u8; BLOCK_SIZE];

        write_string(&mut block[field::NAME], &self.name);
        write_octal(&mut block[field::MODE], self.mode as u64, "mode")?;
        write_octal(&mut block[field::UID], self.owner_id as u64, "uid")?;
        write_octal(&mut block[field::GID], self.group_id as u64, "gid")?;
        write_octal(&mut block[field::SIZE], self.size, "size")?;
        write_octal(&mut block[field::MTIME], self.last_modified, "mtime")?;
        block[field::TYPEFLAG] = self.type_flag.as_byte();
        write_string(&mut block[field::LINKNAME], &self.link_name);

        if let Some(ustar) = &self.ustar {
            block[field::MAGIC].copy_from_slice(USTAR_MAGIC);
            block[field::VERSION].copy_from_slice(USTAR_VERSION);
            write_string(&mut block[field::UNAME], &ustar.owner_name);
            write_string(&mut block[field::GNAME], &ustar.group_name);
            write_octal(&mut block[field::DEVMAJOR], ustar.device_major as u64, "devmajor")?;
            write_octal(&mut block[field::DEVMINOR], ustar.device_minor as u64, "devminor")?;
            write_string(&mut block[field::PREFIX], &ustar.prefix);
        }

        let sum = checksum(&block);
        block[field::CHECKSUM].copy_from_slice(format!("{:06o}\0 ", sum).as_bytes());
        Ok(block)
    }

    /// Convert to an archive entry.
    ///
    /// Returns `None` for record types the archive model has no place for
    /// (hard links, devices, FIFOs, metadata records).
    pub fn to_archive_file(&self) -> Option<ArchiveFile> {
        let file = match self.type_flag {
            TypeFlag::Directory => ArchiveFile::directory(self.name.as_str()),
            TypeFlag::Normal if self.name.ends_with('/') => {
                ArchiveFile::directory(self.name.as_str())
            }
            TypeFlag::Normal | TypeFlag::Contiguous => {
                ArchiveFile::file(self.name.as_str(), self.content)
            }
            TypeFlag::Symlink => {
                ArchiveFile::symlink(self.name.as_str(), self.link_name.as_str())
            }
            _ => return None,
        };
        Some(
            file.with_mode(self.mode)
                .with_last_modified(self.last_modified),
        )
    }
}

/// Header checksum: unsigned byte sum with the checksum field read as spaces.
pub fn checksum(block: &[u8]) -> u32 {
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if field::CHECKSUM.contains(&i) {
                b' ' as u32
            } else {
                b as u32
            }
        })
        .sum()
}

/// Compare a header block's stored checksum with the computed one.
pub fn verify_checksum(block: &[u8], offset: usize) -> Result<()> {
    if block.len() < BLOCK_SIZE {
        return Err(arkiv_common::Error::TruncatedInput {
            needed: BLOCK_SIZE,
            available: block.len(),
        }
        .into());
    }
    let expected = parse_octal(&block[field::CHECKSUM]) as u32;
    let actual = checksum(&block[..BLOCK_SIZE]);
    if expected != actual {
        return Err(Error::ChecksumMismatch {
            offset,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Zero bytes needed after `len` content bytes to reach a block boundary.
#[inline]
pub const fn padding(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn parse_string(bytes: &[u8], field: &'static str) -> Result<String> {
    let text = std::str::from_utf8(until_nul(bytes)).map_err(|e| Error::InvalidHeader {
        field,
        reason: e.to_string(),
    })?;
    Ok(text.trim_matches(' ').to_string())
}

/// Parse an octal field. Garbage decodes as zero.
fn parse_octal(bytes: &[u8]) -> u64 {
    std::str::from_utf8(until_nul(bytes))
        .ok()
        .map(|s| s.trim_matches(' '))
        .filter(|s| !s.is_empty())
        .and_then(|s| u64::from_str_radix(s, 8).ok())
        .unwrap_or(0)
}

fn write_string(dest: &mut [u8], value: &str) {
    let value = truncate_str(value, dest.len());
    dest[..value.len()].copy_from_slice(value.as_bytes());
}

/// Zero-padded octal using all but the last byte, which stays NUL.
fn write_octal(dest: &mut [u8], value: u64, field: &'static str) -> Result<()> {
    let digits = dest.len() - 1;
    let text = format!("{:0width$o}", value, width = digits);
    if text.len() > digits {
        return Err(Error::FieldOverflow { field, value });
    }
    dest[..digits].copy_from_slice(text.as_bytes());
    dest[digits] = 0;
    Ok(())
}
