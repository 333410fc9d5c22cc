//! Lazy TAR archive decoding.

use std::iter::FusedIterator;

use arkiv_common::{Archive, ArchiveFile, BinaryReader};
use log::{debug, trace};

use crate::header::{self, TarFile, TypeFlag, BLOCK_SIZE, LONG_LINK_NAME};
use crate::{Error, Result};

/// Forward-only iterator over the records of a TAR archive.
///
/// Each call to `next` parses exactly one logical entry. GNU long-name
/// markers are folded into the entry that follows them and PAX headers are
/// skipped, so neither is ever yielded. The iterator stops at the zero-block
/// terminator (or the end of the buffer) and after the first error.
#[derive(Debug, Clone)]
pub struct TarDecoder<'a> {
    reader: BinaryReader<'a>,
    verify_checksums: bool,
    done: bool,
}

impl<'a> TarDecoder<'a> {
    /// Create a decoder over a complete TAR buffer.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BinaryReader::new(data),
            verify_checksums: false,
            done: false,
        }
    }

    /// Reject headers whose stored checksum does not match.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Current byte offset in the archive.
    #[inline]
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Two zero bytes where a header should start mark the terminator.
    fn at_end(&self) -> bool {
        match self.reader.peek_bytes(2) {
            Ok(lookahead) => lookahead == [0, 0],
            Err(_) => true,
        }
    }

    fn read_record(&mut self) -> Result<TarFile<'a>> {
        if self.verify_checksums {
            let offset = self.reader.position();
            let block = self.reader.peek_bytes(BLOCK_SIZE)?;
            header::verify_checksum(block, offset)?;
        }
        TarFile::read(&mut self.reader)
    }

    fn next_record(&mut self) -> Result<Option<TarFile<'a>>> {
        let mut long_name: Option<String> = None;
        let mut long_link: Option<String> = None;

        loop {
            if self.at_end() {
                if long_name.is_some() || long_link.is_some() {
                    return Err(Error::InvalidHeader {
                        field: "name",
                        reason: "long name marker is not followed by an entry".to_string(),
                    });
                }
                return Ok(None);
            }

            let mut record = self.read_record()?;
            match record.type_flag {
                TypeFlag::GnuLongLink => {
                    long_link = Some(decode_long_name(record.content)?);
                    continue;
                }
                TypeFlag::GnuLongName => {
                    long_name = Some(decode_long_name(record.content)?);
                    continue;
                }
                _ if record.name == LONG_LINK_NAME => {
                    long_name = Some(decode_long_name(record.content)?);
                    continue;
                }
                TypeFlag::ExtendedHeader | TypeFlag::GlobalExtendedHeader => {
                    trace!("skipping PAX header {} ({} bytes)", record.name, record.size);
                    continue;
                }
                _ => {}
            }

            if let Some(name) = long_name.take() {
                record.name = name;
            }
            if let Some(link) = long_link.take() {
                record.link_name = link;
            }
            return Ok(Some(record));
        }
    }
}

impl<'a> Iterator for TarDecoder<'a> {
    type Item = Result<TarFile<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for TarDecoder<'_> {}

impl<'a> TarDecoder<'a> {
    /// Convert the remaining records into model entries.
    ///
    /// Records the model cannot represent are skipped with a debug log line.
    pub fn into_files(self) -> impl Iterator<Item = Result<ArchiveFile>> + 'a {
        self.filter_map(|record| match record {
            Ok(record) => {
                let file = record.to_archive_file();
                if file.is_none() {
                    debug!(
                        "skipping {:?} entry {} (not representable)",
                        record.type_flag, record.name
                    );
                }
                file.map(Ok)
            }
            Err(e) => Some(Err(e)),
        })
    }
}

/// Lazily decode the entries the archive model can represent.
///
/// Hard links, devices and FIFOs are skipped.
pub fn files(data: &[u8]) -> impl Iterator<Item = Result<ArchiveFile>> + '_ {
    TarDecoder::new(data).into_files()
}

/// Decode a whole TAR archive.
pub fn decode_archive(data: &[u8]) -> Result<Archive> {
    decode_archive_with(data, false)
}

/// Decode a whole TAR archive, optionally verifying every header checksum.
pub fn decode_archive_with(data: &[u8], verify_checksums: bool) -> Result<Archive> {
    let archive = TarDecoder::new(data)
        .verify_checksums(verify_checksums)
        .into_files()
        .collect::<Result<Archive>>()?;
    debug!("decoded tar archive: {} entries", archive.len());
    Ok(archive)
}

fn decode_long_name(content: &[u8]) -> Result<String> {
    let end = content
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    std::str::from_utf8(&content[..end])
        .map(str::to_string)
        .map_err(|e| Error::InvalidHeader {
            field: "long name",
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::TarEncoder;
    use crate::header::Ustar;

    fn record_bytes(record: &TarFile<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_empty_buffer_has_no_entries() {
        assert_eq!(TarDecoder::new(&[]).count(), 0);
        assert_eq!(TarDecoder::new(&[0u8; 1024]).count(), 0);
    }

    #[test]
    fn test_long_name_marker_is_folded() {
        let long_name = "a/".repeat(75);
        let mut data = record_bytes(&TarFile::long_name_marker(
            TypeFlag::GnuLongName,
            long_name.as_bytes(),
        ));
        data.extend(record_bytes(
            &TarFile::new(header::truncate_str(&long_name, 100), TypeFlag::Normal)
                .with_content(b"x"),
        ));
        data.extend_from_slice(&[0u8; 1024]);

        let records: Vec<_> = TarDecoder::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, long_name);
        assert_eq!(records[0].content, b"x");
    }

    #[test]
    fn test_long_link_marker_sets_link_name() {
        let target = "t".repeat(120);
        let mut data = record_bytes(&TarFile::long_name_marker(
            TypeFlag::GnuLongLink,
            target.as_bytes(),
        ));
        let mut link = TarFile::new("link", TypeFlag::Symlink);
        link.link_name = target[..100].to_string();
        data.extend(record_bytes(&link));

        let records: Vec<_> = TarDecoder::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(records[0].link_name, target);
        assert_eq!(
            records[0].to_archive_file().unwrap().symlink_target(),
            Some(target.as_str())
        );
    }

    #[test]
    fn test_gnu_marker_with_trailing_nul() {
        let mut data = record_bytes(&TarFile::long_name_marker(
            TypeFlag::GnuLongName,
            b"gnu/writes/a/nul\0",
        ));
        data.extend(record_bytes(&TarFile::new("gnu/writes", TypeFlag::Normal)));

        let record = TarDecoder::new(&data).next().unwrap().unwrap();
        assert_eq!(record.name, "gnu/writes/a/nul");
    }

    #[test]
    fn test_pax_headers_are_skipped() {
        let payload = b"30 mtime=1700000000.123456789\n";
        let mut data = record_bytes(
            &TarFile::new("PaxHeaders/file", TypeFlag::ExtendedHeader).with_content(payload),
        );
        data.extend(record_bytes(
            &TarFile::new("pax_global", TypeFlag::GlobalExtendedHeader).with_content(payload),
        ));
        data.extend(record_bytes(
            &TarFile::new("file", TypeFlag::Normal).with_content(b"body"),
        ));
        data.extend_from_slice(&[0u8; 1024]);

        let records: Vec<_> = TarDecoder::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "file");
        assert_eq!(records[0].content, b"body");
    }

    #[test]
    fn test_dangling_marker_is_an_error() {
        let mut data = record_bytes(&TarFile::long_name_marker(
            TypeFlag::GnuLongName,
            b"orphan",
        ));
        data.extend_from_slice(&[0u8; 1024]);

        let mut decoder = TarDecoder::new(&data);
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_truncated_content_fails() {
        let mut data = record_bytes(
            &TarFile::new("cut", TypeFlag::Normal).with_content(&[1u8; 600]),
        );
        data.truncate(700);

        let result: Result<Vec<_>> = TarDecoder::new(&data).collect();
        assert!(matches!(
            result,
            Err(Error::Common(arkiv_common::Error::TruncatedInput { .. }))
        ));
    }

    #[test]
    fn test_checksum_verification_is_opt_in() {
        let mut data = record_bytes(&TarFile::new("file", TypeFlag::Normal).with_content(b"ok"));
        // Change the mode without fixing the checksum.
        data[101] = b'7';

        assert!(TarDecoder::new(&data).next().unwrap().is_ok());
        let mut strict = TarDecoder::new(&data).verify_checksums(true);
        assert!(matches!(
            strict.next(),
            Some(Err(Error::ChecksumMismatch { offset: 0, .. }))
        ));
    }

    #[test]
    fn test_decoder_stops_early_without_reading_the_rest() {
        let mut encoder = TarEncoder::new();
        for i in 0..3 {
            encoder
                .add_file(&mut ArchiveFile::file(format!("f{}", i), vec![b'x'; 10]))
                .unwrap();
        }
        let mut data = encoder.finish();
        // Corrupt the last record's name; only a full scan would notice.
        data[2 * 2 * BLOCK_SIZE] = 0xFF;

        let mut decoder = TarDecoder::new(&data);
        assert_eq!(decoder.next().unwrap().unwrap().name, "f0");
        assert_eq!(decoder.position(), 2 * BLOCK_SIZE);
        drop(decoder);

        assert!(decode_archive(&data).is_err());
    }

    #[test]
    fn test_unrepresentable_entries_are_skipped() {
        let mut data = record_bytes(&TarFile::new("dev/null", TypeFlag::CharDevice));
        let mut hard = TarFile::new("hard", TypeFlag::HardLink);
        hard.link_name = "file".to_string();
        data.extend(record_bytes(&hard));
        data.extend(record_bytes(&TarFile::new("fifo", TypeFlag::Fifo)));
        data.extend(record_bytes(
            &TarFile::new("file", TypeFlag::Normal).with_content(b"1"),
        ));

        let archive = decode_archive(&data).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.files()[0].name(), "file");
    }

    #[test]
    fn test_v7_directory_by_trailing_slash() {
        let mut dir = TarFile::new("old/", TypeFlag::Normal);
        dir.ustar = None::<Ustar>;
        let data = record_bytes(&dir);

        let archive = decode_archive(&data).unwrap();
        assert!(archive.files()[0].is_directory());
    }

    #[test]
    fn test_decode_archive_with_verification() {
        let mut data = record_bytes(&TarFile::new("file", TypeFlag::Normal).with_content(b"ok"));
        data.extend_from_slice(&[0u8; 1024]);
        assert_eq!(decode_archive_with(&data, true).unwrap().len(), 1);

        data[100] = b'1';
        assert!(decode_archive_with(&data, false).is_ok());
        assert!(decode_archive_with(&data, true).is_err());
    }
}
