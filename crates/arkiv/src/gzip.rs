//! GZIP framing for TAR streams.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::Result;

/// GZIP member magic.
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Wrap `data` in a GZIP member.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len() / 2),
        Compression::new(level.min(9)),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Unwrap a GZIP stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data).read_to_end(&mut output)?;
    Ok(output)
}

/// Check for the GZIP magic.
#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}
