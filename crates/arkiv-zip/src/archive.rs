//! ZIP archive reader.
//!
//! Parsing starts at the end of central directory record, walks the central
//! directory and only touches local headers when an entry's payload is read.
//! All data is borrowed from the input buffer.

use std::iter::FusedIterator;

use arkiv_common::{
    crc, Archive, ArchiveFile, BinaryReader, CompressionKind, DeflateCodec, EntryKind,
    FlateCodec,
};
use log::{debug, trace};
use memchr::memmem;

use crate::dostime::DOS_EPOCH;
use crate::entry::ZipEntry;
use crate::zip::{flags, CentralDirectoryHeader, CompressionMethod, EocdRecord, LocalFileHeader};
use crate::{Error, Result};

/// Largest archive comment the EOCD length field can describe.
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// Options applied while decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Inflate every file and compare its CRC32 with the recorded one.
    pub verify_crc: bool,
}

impl ReadOptions {
    /// Options with CRC verification enabled.
    pub fn verified() -> Self {
        Self { verify_crc: true }
    }
}

/// A parsed ZIP archive borrowing its bytes.
#[derive(Debug, Clone)]
pub struct ZipArchive<'a> {
    data: &'a [u8],
    entries: Vec<ZipEntry>,
    comment: String,
}

impl<'a> ZipArchive<'a> {
    /// Parse the central directory of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let eocd_offset = find_eocd(data)?;
        let mut reader = BinaryReader::new_at(data, eocd_offset + 4);
        let eocd: EocdRecord = reader.read_struct()?;

        if eocd.disk_number.get() != 0
            || eocd.central_dir_disk.get() != 0
            || eocd.central_dir_count_disk.get() != eocd.central_dir_count_total.get()
        {
            return Err(Error::UnsupportedFeature("multi-disk archives".into()));
        }
        if eocd.is_zip64() {
            return Err(Error::UnsupportedFeature("zip64 archives".into()));
        }

        let comment = String::from_utf8_lossy(
            reader.read_bytes(eocd.comment_length.get() as usize)?,
        )
        .into_owned();

        let count = eocd.central_dir_count_total.get() as usize;
        let cd_offset = eocd.central_dir_offset.get() as usize;
        debug!(
            "EOCD at {}: {} entries, central directory at {} ({} bytes)",
            eocd_offset,
            count,
            cd_offset,
            eocd.central_dir_size.get()
        );

        let mut reader = BinaryReader::new_at(data, cd_offset);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(read_central_entry(&mut reader)?);
        }

        Ok(Self {
            data,
            entries,
            comment,
        })
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in central directory order.
    #[inline]
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Iterate over entries.
    pub fn iter(&self) -> std::slice::Iter<'_, ZipEntry> {
        self.entries.iter()
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&ZipEntry> {
        self.entries.get(index)
    }

    /// Find the last entry with the given name.
    pub fn find(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().rev().find(|e| e.name() == name)
    }

    /// The archive comment.
    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The entry's payload exactly as stored (possibly compressed).
    pub fn raw_data(&self, entry: &ZipEntry) -> Result<&'a [u8]> {
        let offset = entry.local_header_offset() as usize;
        let mut reader = BinaryReader::new_at(self.data, offset);

        let sig = reader.read_u32()?;
        if sig != LocalFileHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: LocalFileHeader::SIGNATURE,
                actual: sig,
            });
        }
        let local: LocalFileHeader = reader.read_struct()?;
        reader.skip(local.variable_data_size())?;

        trace!(
            "{}: local header at {}, payload at {}",
            entry.name(),
            offset,
            reader.position()
        );
        Ok(reader.read_bytes(entry.compressed_size() as usize)?)
    }

    /// Read the entry's uncompressed contents.
    pub fn read<C: DeflateCodec + ?Sized>(&self, entry: &ZipEntry, codec: &C) -> Result<Vec<u8>> {
        let method = supported_method(entry)?;
        let raw = self.raw_data(entry)?;
        inflate(entry, method, raw, codec)
    }

    /// Convert one entry into a model [`ArchiveFile`].
    ///
    /// Deflated files stay compressed unless `verify_crc` forces them to be
    /// inflated for the checksum. Symlink targets are always inflated.
    pub fn to_archive_file<C: DeflateCodec + ?Sized>(
        &self,
        entry: &ZipEntry,
        codec: &C,
        verify_crc: bool,
    ) -> Result<ArchiveFile> {
        let name = entry.name();

        let mut file = match entry.kind() {
            // Directory payloads are never read, so the method is not checked.
            EntryKind::Directory => ArchiveFile::directory(name),
            kind => {
                let method = supported_method(entry)?;
                if kind == EntryKind::File && method == CompressionMethod::Deflate && !verify_crc {
                    ArchiveFile::compressed(
                        name,
                        entry.uncompressed_size(),
                        self.raw_data(entry)?,
                        CompressionKind::Deflate,
                    )
                } else {
                    let data = inflate(entry, method, self.raw_data(entry)?, codec)?;
                    if verify_crc {
                        let actual = crc::crc32(&data);
                        if actual != entry.crc32() {
                            return Err(Error::CrcMismatch {
                                name: name.to_string(),
                                expected: entry.crc32(),
                                actual,
                            });
                        }
                    }
                    if kind == EntryKind::Symlink {
                        ArchiveFile::symlink(name, String::from_utf8_lossy(&data).into_owned())
                    } else {
                        ArchiveFile::file(name, data)
                    }
                }
            }
        };

        if let Some(mode) = entry.unix_mode() {
            file.set_mode(mode);
        }
        file.set_last_modified(entry.last_modified().unwrap_or(DOS_EPOCH));
        file.set_compress(entry.compression_method() == Some(CompressionMethod::Deflate));
        if !entry.is_dir() {
            file = file.with_crc32(entry.crc32());
        }
        if let Some(comment) = entry.comment() {
            file = file.with_comment(comment);
        }
        Ok(file)
    }

    /// Lazily convert every entry, in order.
    pub fn files<C: DeflateCodec>(&self, codec: C, options: ReadOptions) -> Files<'_, 'a, C> {
        Files {
            archive: self,
            codec,
            verify_crc: options.verify_crc,
            index: 0,
            done: false,
        }
    }
}

/// Lazy iterator over the entries of a [`ZipArchive`] as [`ArchiveFile`]s.
///
/// Each call to `next` reads one entry. The iterator is fused after the
/// first error.
pub struct Files<'z, 'a, C> {
    archive: &'z ZipArchive<'a>,
    codec: C,
    verify_crc: bool,
    index: usize,
    done: bool,
}

impl<C: DeflateCodec> Iterator for Files<'_, '_, C> {
    type Item = Result<ArchiveFile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(entry) = self.archive.get(self.index) else {
            self.done = true;
            return None;
        };
        self.index += 1;

        let result = self
            .archive
            .to_archive_file(entry, &self.codec, self.verify_crc);
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.archive.len() - self.index))
        }
    }
}

impl<C: DeflateCodec> FusedIterator for Files<'_, '_, C> {}

/// Decode a whole archive with the default codec and no CRC verification.
pub fn decode_archive(data: &[u8]) -> Result<Archive> {
    decode_archive_with(data, ReadOptions::default(), FlateCodec::default())
}

/// Decode a whole archive with explicit options and codec.
pub fn decode_archive_with<C: DeflateCodec>(
    data: &[u8],
    options: ReadOptions,
    codec: C,
) -> Result<Archive> {
    let zip = ZipArchive::parse(data)?;
    let mut archive = zip.files(codec, options).collect::<Result<Archive>>()?;
    archive.set_comment(zip.comment());
    Ok(archive)
}

/// Locate the EOCD record by scanning backwards for its signature.
///
/// The last candidate whose comment fits inside the buffer wins.
fn find_eocd(data: &[u8]) -> Result<usize> {
    if data.len() < EocdRecord::SIZE {
        return Err(Error::EocdNotFound);
    }
    let search_start = data
        .len()
        .saturating_sub(EocdRecord::SIZE + MAX_COMMENT_LEN);
    let window = &data[search_start..];

    memmem::rfind_iter(window, &EocdRecord::MAGIC)
        .map(|pos| search_start + pos)
        .find(|&offset| {
            let end = offset + EocdRecord::SIZE;
            if end > data.len() {
                return false;
            }
            let comment_len = u16::from_le_bytes([data[end - 2], data[end - 1]]) as usize;
            end + comment_len <= data.len()
        })
        .ok_or(Error::EocdNotFound)
}

fn read_central_entry(reader: &mut BinaryReader<'_>) -> Result<ZipEntry> {
    let offset = reader.position();
    let sig = reader.read_u32()?;
    if sig != CentralDirectoryHeader::SIGNATURE {
        return Err(Error::InvalidSignature {
            expected: CentralDirectoryHeader::SIGNATURE,
            actual: sig,
        });
    }

    let header: CentralDirectoryHeader = reader.read_struct()?;
    let utf8 = header.flags.get() & flags::UTF8 != 0;

    let name = decode_text(reader.read_bytes(header.file_name_length.get() as usize)?, utf8)?;
    reader.skip(header.extra_field_length.get() as usize)?;
    let comment = match header.file_comment_length.get() as usize {
        0 => None,
        len => Some(decode_text(reader.read_bytes(len)?, utf8)?),
    };

    trace!(
        "central record at {}: {} (method {}, {} -> {} bytes)",
        offset,
        name,
        header.compression_method.get(),
        header.compressed_size.get(),
        header.uncompressed_size.get()
    );
    Ok(ZipEntry::from_central(&header, name, comment))
}

/// Names flagged as UTF-8 must be valid; legacy names are decoded lossily.
fn decode_text(bytes: &[u8], utf8: bool) -> Result<String> {
    if utf8 {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidName(String::from_utf8_lossy(bytes).into_owned()))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn supported_method(entry: &ZipEntry) -> Result<CompressionMethod> {
    if entry.is_encrypted() {
        return Err(Error::UnsupportedFeature(format!(
            "encrypted entry {}",
            entry.name()
        )));
    }
    entry
        .compression_method()
        .ok_or(Error::UnsupportedCompression(entry.method()))
}

fn inflate<C: DeflateCodec + ?Sized>(
    entry: &ZipEntry,
    method: CompressionMethod,
    raw: &[u8],
    codec: &C,
) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Store => Ok(raw.to_vec()),
        CompressionMethod::Deflate => {
            Ok(codec.decompress(raw, entry.uncompressed_size() as usize)?)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::encode_archive;
    use arkiv_common::mode;

    /// Single stored entry named `a` holding `xyz`; central directory at 34.
    fn single_stored() -> Vec<u8> {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::file("a", b"xyz".to_vec()).with_compress(false));
        encode_archive(&mut archive).unwrap()
    }

    const CD: usize = 34;

    #[test]
    fn test_too_short_or_garbage() {
        assert!(matches!(ZipArchive::parse(&[0u8; 10]), Err(Error::EocdNotFound)));
        assert!(matches!(ZipArchive::parse(&[0u8; 100]), Err(Error::EocdNotFound)));
    }

    #[test]
    fn test_signature_inside_comment_is_skipped() {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::file("a", b"1".to_vec()));
        archive.set_comment("tail PK\u{5}\u{6}");
        let data = encode_archive(&mut archive).unwrap();

        let zip = ZipArchive::parse(&data).unwrap();
        assert_eq!(zip.len(), 1);
        assert_eq!(zip.comment(), "tail PK\u{5}\u{6}");
    }

    #[test]
    fn test_unsupported_method() {
        let mut data = single_stored();
        data[CD + 10] = 14;

        let zip = ZipArchive::parse(&data).unwrap();
        let entry = zip.get(0).unwrap();
        assert_eq!(entry.compression_method(), None);
        assert!(matches!(
            zip.read(entry, &FlateCodec::default()),
            Err(Error::UnsupportedCompression(14))
        ));
    }

    #[test]
    fn test_encrypted_entry() {
        let mut data = single_stored();
        data[CD + 8] |= flags::ENCRYPTED as u8;

        assert!(matches!(
            decode_archive(&data),
            Err(Error::UnsupportedFeature(msg)) if msg.contains("encrypted")
        ));
    }

    #[test]
    fn test_unix_symlink_is_decoded() {
        let mut data = single_stored();
        let attrs = (mode::S_IFLNK | 0o777) << 16;
        data[CD + 38..CD + 42].copy_from_slice(&attrs.to_le_bytes());

        let archive = decode_archive(&data).unwrap();
        let link = &archive.files()[0];
        assert!(link.is_symlink());
        assert_eq!(link.symlink_target(), Some("xyz"));
        assert_eq!(link.mode(), 0o777);
    }

    #[test]
    fn test_legacy_names_decode_lossily() {
        let mut data = single_stored();
        data[CD + 46] = 0x82;

        let zip = ZipArchive::parse(&data).unwrap();
        assert_eq!(zip.get(0).unwrap().name(), "\u{FFFD}");

        data[CD + 8] |= (flags::UTF8 & 0xFF) as u8;
        data[CD + 9] |= (flags::UTF8 >> 8) as u8;
        assert!(matches!(ZipArchive::parse(&data), Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_bad_local_signature() {
        let mut data = single_stored();
        data[0] = b'X';

        let zip = ZipArchive::parse(&data).unwrap();
        assert!(matches!(
            zip.raw_data(zip.get(0).unwrap()),
            Err(Error::InvalidSignature { expected: LocalFileHeader::SIGNATURE, .. })
        ));
    }

    #[test]
    fn test_files_iterator_is_lazy_and_fused() {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::file("a", b"1".to_vec()).with_compress(false));
        archive.add(ArchiveFile::file("b", b"2".to_vec()).with_compress(false));
        archive.add(ArchiveFile::file("c", b"3".to_vec()).with_compress(false));
        let mut data = encode_archive(&mut archive).unwrap();

        // Second local header starts after 30 + 1 + 1 bytes.
        data[32] = 0;

        let zip = ZipArchive::parse(&data).unwrap();
        let mut files = zip.files(FlateCodec::default(), ReadOptions::default());
        assert_eq!(files.next().unwrap().unwrap().name(), "a");
        assert!(files.next().unwrap().is_err());
        assert!(files.next().is_none());
        assert!(files.next().is_none());
    }

    #[test]
    fn test_deflated_files_stay_compressed_until_read() {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::file("z", b"zzzzzzzzzzzzzzzzzzzz".to_vec()));
        let data = encode_archive(&mut archive).unwrap();

        let decoded = decode_archive(&data).unwrap();
        assert!(decoded.files()[0].content().is_compressed());
        assert_eq!(decoded.files()[0].size(), 20);

        let verified =
            decode_archive_with(&data, ReadOptions::verified(), FlateCodec::default()).unwrap();
        assert_eq!(verified.files()[0].raw_content(), Some(&b"zzzzzzzzzzzzzzzzzzzz"[..]));
    }

    #[test]
    fn test_directory_ignores_unknown_method() {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::directory("d/"));
        archive.add(ArchiveFile::file("d/f", b"xyz".to_vec()).with_compress(false));
        let mut data = encode_archive(&mut archive).unwrap();

        // Local records: 30 + "d/" then 30 + "d/f" + payload; the directory leads the CD.
        let cd = 30 + 2 + 30 + 3 + 3;
        assert_eq!(&data[cd..cd + 4], CentralDirectoryHeader::MAGIC);
        data[cd + 10] = 99;

        let decoded = decode_archive(&data).unwrap();
        assert!(decoded.files()[0].is_directory());
        assert!(!decoded.files()[0].compress());
        assert_eq!(decoded.files()[1].raw_content(), Some(&b"xyz"[..]));

        // The same code on the file entry is still refused.
        data[cd + 10] = 0;
        let second = cd + 46 + 2;
        data[second + 10] = 99;
        assert!(matches!(
            decode_archive(&data),
            Err(Error::UnsupportedCompression(99))
        ));
    }

    #[test]
    fn test_invalid_dos_date_falls_back_to_epoch() {
        let mut data = single_stored();
        // Central time and date at 12..16.
        data[CD + 12..CD + 16].fill(0);

        let archive = decode_archive(&data).unwrap();
        assert_eq!(archive.files()[0].last_modified(), DOS_EPOCH);
    }
}
