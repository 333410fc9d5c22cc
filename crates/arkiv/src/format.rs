//! Archive format selection and sniffing.

use std::fmt;
use std::path::Path;

use arkiv_tar::header::{self, BLOCK_SIZE};
use arkiv_zip::zip::{EocdRecord, LocalFileHeader};

use crate::gzip;

/// Offset of the USTAR magic inside a TAR header.
const USTAR_MAGIC_OFFSET: usize = 257;

/// Container formats understood by [`decode`](crate::decode) and
/// [`encode`](crate::encode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// PKWARE ZIP.
    Zip,
    /// Uncompressed USTAR/GNU TAR.
    Tar,
    /// TAR wrapped in GZIP.
    TarGz,
}

impl ArchiveFormat {
    /// Guess the format from the first bytes of an archive.
    ///
    /// GZIP input is assumed to wrap a TAR stream.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&LocalFileHeader::MAGIC) || data.starts_with(&EocdRecord::MAGIC) {
            return Some(Self::Zip);
        }
        if gzip::is_gzip(data) {
            return Some(Self::TarGz);
        }
        if looks_like_tar(data) {
            return Some(Self::Tar);
        }
        None
    }

    /// Infer the format from a file name extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Short lower-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn looks_like_tar(data: &[u8]) -> bool {
    if data.len() < BLOCK_SIZE {
        return false;
    }
    let block = &data[..BLOCK_SIZE];
    if block[USTAR_MAGIC_OFFSET..].starts_with(b"ustar") {
        return true;
    }
    // Pre-POSIX headers have no magic, but their checksum still verifies.
    if header::verify_checksum(block, 0).is_ok() {
        return true;
    }
    // An empty archive is just the terminator.
    data.len() >= 2 * BLOCK_SIZE && data[..2 * BLOCK_SIZE].iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(ArchiveFormat::from_path(Path::new("a/b.ZIP")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path(Path::new("b.tar")), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_path(Path::new("b.tar.gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_path(Path::new("b.tgz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_path(Path::new("b.rar")), None);
        assert_eq!(ArchiveFormat::from_path(Path::new("/")), None);
    }

    #[test]
    fn test_detect_magic() {
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(b"PK\x05\x06"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(&[0u8; 1024]), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(&[0u8; 512]), None);
        assert_eq!(ArchiveFormat::detect(b"plain text"), None);
    }

    #[test]
    fn test_detect_encoded_tar() {
        let mut encoder = arkiv_tar::TarEncoder::new();
        encoder
            .add_file(&mut arkiv_common::ArchiveFile::file("a", b"1".to_vec()))
            .unwrap();
        let data = encoder.finish();
        assert_eq!(ArchiveFormat::detect(&data), Some(ArchiveFormat::Tar));
    }
}
