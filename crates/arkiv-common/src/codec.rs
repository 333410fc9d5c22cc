//! Raw DEFLATE compression capability.
//!
//! The archive codecs never implement DEFLATE themselves. They take a
//! [`DeflateCodec`] and call it for every payload that needs to be packed or
//! unpacked. [`FlateCodec`] is the default implementation backed by `flate2`.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// Largest output-to-input ratio trusted when pre-allocating for inflation.
const MAX_HINT_RATIO: usize = 64;

/// Compress and decompress raw DEFLATE streams (no zlib or gzip framing).
pub trait DeflateCodec {
    /// Compress `data` into a raw DEFLATE stream.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a raw DEFLATE stream.
    ///
    /// `expected_size` is a capacity hint taken from untrusted headers;
    /// implementations must bound it and must not treat a different output
    /// length as an error.
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;
}

impl<C: DeflateCodec + ?Sized> DeflateCodec for &C {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).compress(data)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        (**self).decompress(data, expected_size)
    }
}

impl<C: DeflateCodec + ?Sized> DeflateCodec for Box<C> {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).compress(data)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        (**self).decompress(data, expected_size)
    }
}

/// `flate2`-backed DEFLATE codec.
#[derive(Debug, Clone, Copy)]
pub struct FlateCodec {
    level: Compression,
}

impl FlateCodec {
    /// Create a codec with an explicit compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// The configured compression level.
    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for FlateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl DeflateCodec for FlateCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .map_err(|e| Error::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| Error::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let capacity = expected_size.min(data.len().saturating_mul(MAX_HINT_RATIO));
        let mut output = Vec::with_capacity(capacity);
        DeflateDecoder::new(data)
            .read_to_end(&mut output)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_roundtrip() {
        let codec = FlateCodec::default();
        let original = b"Hello, World! This is a test of DEFLATE compression. \
                         Hello, World! This is a test of DEFLATE compression.";

        let compressed = codec.compress(original).unwrap();
        assert!(compressed.len() < original.len());

        let decompressed = codec.decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_level_zero_still_inflates() {
        let codec = FlateCodec::new(0);
        assert_eq!(codec.level(), 0);

        let compressed = codec.compress(b"stored block").unwrap();
        assert_eq!(codec.decompress(&compressed, 0).unwrap(), b"stored block");
    }

    #[test]
    fn test_garbage_fails_to_inflate() {
        let codec = FlateCodec::default();
        let result = codec.decompress(&[0xFF, 0xFF, 0xFF, 0xFF], 16);
        assert!(matches!(result, Err(Error::Decompression(_))));
    }

    #[test]
    fn test_oversized_hint_is_bounded() {
        let codec = FlateCodec::default();
        let packed = codec.compress(b"tiny").unwrap();

        let output = codec.decompress(&packed, usize::MAX).unwrap();
        assert_eq!(output, b"tiny");
        assert!(output.capacity() <= packed.len() * MAX_HINT_RATIO);
    }

    #[test]
    fn test_codec_through_reference() {
        fn roundtrip<C: DeflateCodec>(codec: C) -> Vec<u8> {
            let packed = codec.compress(b"abc").unwrap();
            codec.decompress(&packed, 3).unwrap()
        }

        let codec = FlateCodec::default();
        assert_eq!(roundtrip(&codec), b"abc");
        let boxed: Box<dyn DeflateCodec> = Box::new(codec);
        assert_eq!(roundtrip(&boxed), b"abc");
    }
}
