//! ZIP archive encoding.

use std::borrow::Cow;

use arkiv_common::{
    crc, Archive, ArchiveFile, CompressionKind, Content, DeflateCodec, EntryKind, FlateCodec,
    DOS_DIRECTORY_ATTR,
};
use log::{debug, trace};
use zerocopy::byteorder::little_endian::{U16, U32};

use crate::dostime;
use crate::zip::{
    flags, CentralDirectoryHeader, CompressionMethod, EocdRecord, LocalFileHeader,
    VERSION_DEFLATE, VERSION_MADE_BY, VERSION_STORE,
};
use crate::{Error, Result};

/// Central directory data remembered for each written entry.
#[derive(Debug)]
struct CentralRecord {
    header: CentralDirectoryHeader,
    name: String,
    comment: Option<String>,
}

/// Payload chosen for one entry.
struct Payload<'f> {
    method: CompressionMethod,
    crc32: u32,
    size: u64,
    data: Cow<'f, [u8]>,
}

/// Builds a ZIP archive in memory.
///
/// Creating the encoder starts a session; [`finish`](Self::finish) consumes it
/// and writes the central directory, so nothing can be added to a finished
/// archive.
#[derive(Debug)]
pub struct ZipEncoder<C = FlateCodec> {
    buffer: Vec<u8>,
    codec: C,
    central: Vec<CentralRecord>,
    comment: String,
}

impl ZipEncoder<FlateCodec> {
    /// Start a new archive with the default codec.
    pub fn new() -> Self {
        Self::with_codec(FlateCodec::default())
    }
}

impl Default for ZipEncoder<FlateCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DeflateCodec> ZipEncoder<C> {
    /// Start a new archive that compresses with `codec`.
    pub fn with_codec(codec: C) -> Self {
        Self {
            buffer: Vec::new(),
            codec,
            central: Vec::new(),
            comment: String::new(),
        }
    }

    /// Set the archive comment written into the EOCD record.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Number of entries written so far.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.central.len()
    }

    /// Append an archive entry.
    ///
    /// Entries marked `compress = false` are stored, decompressing packed
    /// content first (the inflated form is cached on the entry). Already
    /// deflated content is copied through unchanged; everything else is
    /// deflated with the encoder's codec. Symlinks cannot be represented and
    /// are refused.
    pub fn add_file(&mut self, file: &mut ArchiveFile) -> Result<()> {
        if file.is_symlink() {
            return Err(Error::UnsupportedEntity {
                name: file.name().to_string(),
                kind: "symlink",
            });
        }
        if self.central.len() >= u16::MAX as usize {
            return Err(Error::Zip64Required("entry count"));
        }

        let kind = file.kind();
        let mut name = file.name().to_string();
        if kind == EntryKind::Directory && !name.ends_with('/') {
            name.push('/');
        }
        let comment = file.comment().map(str::to_owned);
        check_text_len(&name)?;
        if let Some(comment) = &comment {
            check_text_len(comment)?;
        }

        let (dos_time, dos_date) = dostime::to_dos(file.last_modified());
        let mut external_attrs = (kind.type_bits() | file.mode()) << 16;
        if kind == EntryKind::Directory {
            external_attrs |= DOS_DIRECTORY_ATTR;
        }
        let utf8 = !name.is_ascii() || comment.as_deref().is_some_and(|c| !c.is_ascii());
        let flags = if utf8 { flags::UTF8 } else { 0 };

        let payload = prepare_payload(&self.codec, file)?;
        let version_needed = match payload.method {
            CompressionMethod::Deflate => VERSION_DEFLATE,
            CompressionMethod::Store => VERSION_STORE,
        };
        let offset = fit_u32(self.buffer.len() as u64, "local header offset")?;
        let compressed_size = fit_u32(payload.data.len() as u64, "compressed size")?;
        let uncompressed_size = fit_u32(payload.size, "uncompressed size")?;

        trace!(
            "{} at {}: method {:?}, {} -> {} bytes",
            name,
            offset,
            payload.method,
            payload.size,
            payload.data.len()
        );

        let local = LocalFileHeader {
            version_needed: U16::new(version_needed),
            flags: U16::new(flags),
            compression_method: U16::new(payload.method as u16),
            last_mod_time: U16::new(dos_time),
            last_mod_date: U16::new(dos_date),
            crc32: U32::new(payload.crc32),
            compressed_size: U32::new(compressed_size),
            uncompressed_size: U32::new(uncompressed_size),
            file_name_length: U16::new(name.len() as u16),
            extra_field_length: U16::new(0),
        };
        local.write(&mut self.buffer);
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(&payload.data);

        let header = CentralDirectoryHeader {
            version_made_by: U16::new(VERSION_MADE_BY),
            version_needed: local.version_needed,
            flags: local.flags,
            compression_method: local.compression_method,
            last_mod_time: local.last_mod_time,
            last_mod_date: local.last_mod_date,
            crc32: local.crc32,
            compressed_size: local.compressed_size,
            uncompressed_size: local.uncompressed_size,
            file_name_length: local.file_name_length,
            extra_field_length: U16::new(0),
            file_comment_length: U16::new(comment.as_ref().map_or(0, |c| c.len()) as u16),
            disk_number_start: U16::new(0),
            internal_attrs: U16::new(0),
            external_attrs: U32::new(external_attrs),
            local_header_offset: U32::new(offset),
        };
        self.central.push(CentralRecord {
            header,
            name,
            comment,
        });
        Ok(())
    }

    /// Write the central directory and EOCD record and return the archive.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        check_text_len(&self.comment)?;

        let cd_offset = fit_u32(self.buffer.len() as u64, "central directory offset")?;
        for record in &self.central {
            record.header.write(&mut self.buffer);
            self.buffer.extend_from_slice(record.name.as_bytes());
            if let Some(comment) = &record.comment {
                self.buffer.extend_from_slice(comment.as_bytes());
            }
        }
        let cd_size = fit_u32(
            self.buffer.len() as u64 - cd_offset as u64,
            "central directory size",
        )?;

        let count = U16::new(self.central.len() as u16);
        let eocd = EocdRecord {
            disk_number: U16::new(0),
            central_dir_disk: U16::new(0),
            central_dir_count_disk: count,
            central_dir_count_total: count,
            central_dir_size: U32::new(cd_size),
            central_dir_offset: U32::new(cd_offset),
            comment_length: U16::new(self.comment.len() as u16),
        };
        eocd.write(&mut self.buffer);
        self.buffer.extend_from_slice(self.comment.as_bytes());

        debug!(
            "finished zip archive: {} entries, central directory at {}, {} bytes",
            self.central.len(),
            cd_offset,
            self.buffer.len()
        );
        Ok(self.buffer)
    }
}

/// Encode a whole archive with the default codec.
pub fn encode_archive(archive: &mut Archive) -> Result<Vec<u8>> {
    encode_archive_with(archive, FlateCodec::default())
}

/// Encode a whole archive, compressing with `codec`.
pub fn encode_archive_with<C: DeflateCodec>(archive: &mut Archive, codec: C) -> Result<Vec<u8>> {
    let mut encoder = ZipEncoder::with_codec(codec);
    encoder.set_comment(archive.comment());
    for file in archive.iter_mut() {
        encoder.add_file(file)?;
    }
    encoder.finish()
}

fn prepare_payload<'f, C: DeflateCodec + ?Sized>(
    codec: &C,
    file: &'f mut ArchiveFile,
) -> Result<Payload<'f>> {
    if file.is_directory() {
        return Ok(Payload {
            method: CompressionMethod::Store,
            crc32: 0,
            size: 0,
            data: Cow::Borrowed(&[]),
        });
    }

    let pass_through = file.compress() && file.content().is_compressed();
    if !pass_through {
        file.compute_crc32(codec)?;
    }

    let file: &'f ArchiveFile = file;
    let payload = match file.content() {
        Content::Compressed {
            data,
            kind: CompressionKind::Deflate,
        } => {
            let crc32 = match file.crc32() {
                Some(crc32) => crc32,
                None => crc::crc32(&codec.decompress(data, file.size() as usize)?),
            };
            Payload {
                method: CompressionMethod::Deflate,
                crc32,
                size: file.size(),
                data: Cow::Borrowed(data),
            }
        }
        Content::Raw(data) => {
            let crc32 = file.crc32().unwrap_or_else(|| crc::crc32(data));
            if file.compress() {
                Payload {
                    method: CompressionMethod::Deflate,
                    crc32,
                    size: data.len() as u64,
                    data: Cow::Owned(codec.compress(data)?),
                }
            } else {
                Payload {
                    method: CompressionMethod::Store,
                    crc32,
                    size: data.len() as u64,
                    data: Cow::Borrowed(data),
                }
            }
        }
    };
    Ok(payload)
}

/// 0xFFFFFFFF is the zip64 marker, so the largest classic value is one less.
fn fit_u32(value: u64, what: &'static str) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v != u32::MAX => Ok(v),
        _ => Err(Error::Zip64Required(what)),
    }
}

fn check_text_len(text: &str) -> Result<()> {
    if text.len() > u16::MAX as usize {
        return Err(Error::InvalidName(format!(
            "{}... is longer than {} bytes",
            text.chars().take(32).collect::<String>(),
            u16::MAX
        )));
    }
    Ok(())
}
