//! TAR archive encoding.

use arkiv_common::{Archive, ArchiveFile, DeflateCodec, EntryKind, FlateCodec};
use log::{debug, trace};

use crate::header::{TarFile, TypeFlag, Ustar, BLOCK_SIZE, NAME_LEN};
use crate::{Error, Result};

/// Builds a TAR archive in memory.
///
/// Creating the encoder starts a session; [`finish`](Self::finish) consumes
/// it and appends the two-block terminator, so nothing can be added to a
/// finished archive.
///
/// The codec is only used to inflate entries whose content is still
/// compressed.
#[derive(Debug)]
pub struct TarEncoder<C = FlateCodec> {
    buffer: Vec<u8>,
    codec: C,
    entries: usize,
}

impl TarEncoder<FlateCodec> {
    /// Start a new archive with the default codec.
    pub fn new() -> Self {
        Self::with_codec(FlateCodec::default())
    }
}

impl Default for TarEncoder<FlateCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DeflateCodec> TarEncoder<C> {
    /// Start a new archive using `codec` to inflate packed entries.
    pub fn with_codec(codec: C) -> Self {
        Self {
            buffer: Vec::new(),
            codec,
            entries: 0,
        }
    }

    /// Number of logical entries written so far.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Append a raw header record as-is.
    pub fn add_record(&mut self, record: &TarFile<'_>) -> Result<()> {
        record.write(&mut self.buffer)?;
        self.entries += 1;
        Ok(())
    }

    /// Append an archive entry.
    ///
    /// Names (and symlink targets) longer than the 100-byte field are preceded
    /// by a GNU long-name marker. Packed content is inflated and cached on the
    /// entry.
    pub fn add_file(&mut self, file: &mut ArchiveFile) -> Result<()> {
        file.decompress(&self.codec)?;
        let file: &ArchiveFile = file;

        let mut name = file.name().to_string();
        let (type_flag, link_name, content): (_, &str, &[u8]) = match file.kind() {
            EntryKind::File => (
                TypeFlag::Normal,
                "",
                file.raw_content().unwrap_or_default(),
            ),
            EntryKind::Directory => {
                if !name.ends_with('/') {
                    name.push('/');
                }
                (TypeFlag::Directory, "", &[])
            }
            EntryKind::Symlink => {
                let target = file.symlink_target().ok_or_else(|| Error::InvalidHeader {
                    field: "linkname",
                    reason: format!("symlink target of {} is not UTF-8", file.name()),
                })?;
                (TypeFlag::Symlink, target, &[])
            }
        };

        if name.len() > NAME_LEN {
            trace!("long name marker for {} ({} bytes)", name, name.len());
            TarFile::long_name_marker(TypeFlag::GnuLongName, name.as_bytes())
                .write(&mut self.buffer)?;
        }
        if link_name.len() > NAME_LEN {
            TarFile::long_name_marker(TypeFlag::GnuLongLink, link_name.as_bytes())
                .write(&mut self.buffer)?;
        }

        let record = TarFile {
            name,
            mode: file.mode(),
            owner_id: 0,
            group_id: 0,
            size: content.len() as u64,
            last_modified: file.last_modified(),
            checksum: 0,
            type_flag,
            link_name: link_name.to_string(),
            ustar: Some(Ustar::default()),
            content,
        };
        self.add_record(&record)
    }

    /// Append the terminator and return the archive bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buffer.resize(self.buffer.len() + 2 * BLOCK_SIZE, 0);
        debug!(
            "finished tar archive: {} entries, {} bytes",
            self.entries,
            self.buffer.len()
        );
        self.buffer
    }
}

/// Encode a whole archive with the default codec.
pub fn encode_archive(archive: &mut Archive) -> Result<Vec<u8>> {
    encode_archive_with(archive, FlateCodec::default())
}

/// Encode a whole archive, inflating packed entries with `codec`.
pub fn encode_archive_with<C: DeflateCodec>(archive: &mut Archive, codec: C) -> Result<Vec<u8>> {
    let mut encoder = TarEncoder::with_codec(codec);
    for file in archive.iter_mut() {
        encoder.add_file(file)?;
    }
    Ok(encoder.finish())
}
