use cipher::generic_array::{typenum::U32, GenericArray};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub(crate) mod ciphers;
pub(crate) mod kdf;

/// Errors from the cryptographic primitives
#[derive(Debug, Error)]
pub enum CryptographyError {
    #[error(transparent)]
    InvalidLength(#[from] cipher::InvalidLength),

    #[error(transparent)]
    Unpadding(#[from] cipher::block_padding::UnpadError),
}

pub(crate) fn calculate_sha256(elements: &[&[u8]]) -> GenericArray<u8, U32> {
    let mut digest = Sha256::new();

    for element in elements {
        digest.update(element);
    }

    digest.finalize()
}

/// Lowercase hexadecimal SHA-1 of a blob, as used to address database and
/// key-file blobs on disk.
pub(crate) fn calculate_sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

#[cfg(test)]
mod crypt_tests {
    use super::*;

    #[test]
    fn sha256_concatenation() {
        // hashing in pieces is the same as hashing the concatenation
        let whole = calculate_sha256(&[b"abcdef"]);
        let pieces = calculate_sha256(&[b"abc", b"def"]);
        assert_eq!(whole, pieces);
    }

    #[test]
    fn sha1_hex_is_lowercase() {
        let digest = calculate_sha1_hex(b"abc");
        assert_eq!(digest, "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
