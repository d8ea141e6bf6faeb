use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;

/// Failure to gunzip a payload (bad magic, bad CRC32, truncated stream, ...)
#[derive(Debug, Error)]
#[error("Failed to decompress payload: {0}")]
pub struct DecompressionError(#[from] std::io::Error);

pub trait Compression {
    fn decompress(&self, in_buffer: &[u8]) -> Result<Vec<u8>, DecompressionError>;
}

pub struct NoCompression;

impl Compression for NoCompression {
    fn decompress(&self, in_buffer: &[u8]) -> Result<Vec<u8>, DecompressionError> {
        Ok(in_buffer.to_vec())
    }
}

pub struct GZipCompression;

impl Compression for GZipCompression {
    fn decompress(&self, in_buffer: &[u8]) -> Result<Vec<u8>, DecompressionError> {
        let mut res = Vec::new();
        let mut decoder = GzDecoder::new(in_buffer);
        decoder.read_to_end(&mut res)?;
        Ok(res)
    }
}

#[cfg(test)]
mod compression_tests {
    use std::io::Write;

    use flate2::write::GzEncoder;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_decompress() -> Result<(), DecompressionError> {
        let original = b"<KeePassFile></KeePassFile>".repeat(100);
        let compressed = gzip(&original);

        assert_eq!(GZipCompression.decompress(&compressed)?, original);
        Ok(())
    }

    #[test]
    fn gzip_rejects_bad_magic() {
        let garbage = b"this is not a gzip stream at all";
        assert!(GZipCompression.decompress(garbage).is_err());
    }

    #[test]
    fn gzip_rejects_corrupted_body() {
        let mut compressed = gzip(b"some payload worth compressing, repeated a few times over");
        // damage a byte in the deflate body; the CRC32 check has to catch it
        let mid = compressed.len() / 2;
        compressed[mid] ^= 0xFF;
        assert!(GZipCompression.decompress(&compressed).is_err());
    }

    #[test]
    fn no_compression_is_identity() -> Result<(), DecompressionError> {
        assert_eq!(NoCompression.decompress(b"payload")?, b"payload");
        Ok(())
    }
}
