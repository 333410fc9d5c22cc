//! CRC32 hashing utilities.
//!
//! Both ZIP and the archive model use the standard IEEE CRC32 (reflected
//! polynomial 0xEDB88320), the same checksum as gzip and PNG.

/// Compute the CRC32 of a byte slice.
///
/// Uses hardware acceleration when available.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Incremental CRC32 over several chunks.
#[derive(Debug, Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a previous computation from its checksum.
    pub fn with_initial(crc: u32) -> Self {
        Self {
            hasher: crc32fast::Hasher::new_with_initial(crc),
        }
    }

    /// Feed more bytes.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finish and return the checksum.
    #[inline]
    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}
