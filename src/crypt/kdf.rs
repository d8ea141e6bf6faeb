use aes::Aes256;
use cipher::{
    generic_array::{typenum::U32, GenericArray},
    BlockEncrypt, KeyInit,
};
use sha2::{Digest, Sha256};

use super::CryptographyError;

pub trait Kdf {
    fn transform_key(
        &self,
        composite_key: &GenericArray<u8, U32>,
    ) -> Result<GenericArray<u8, U32>, CryptographyError>;
}

/// The AES-ECB key transform of the KDBX3 format: the composite key is
/// encrypted in place for `rounds` rounds under the transform seed, then
/// hashed once.
pub struct AesKdf {
    pub seed: Vec<u8>,
    pub rounds: u64,
}

impl Kdf for AesKdf {
    fn transform_key(
        &self,
        composite_key: &GenericArray<u8, U32>,
    ) -> Result<GenericArray<u8, U32>, CryptographyError> {
        let cipher = Aes256::new(&GenericArray::clone_from_slice(&self.seed));

        // the 32-byte composite key is treated as two consecutive AES blocks
        let mut block1 = GenericArray::clone_from_slice(&composite_key[..16]);
        let mut block2 = GenericArray::clone_from_slice(&composite_key[16..]);
        for _ in 0..self.rounds {
            cipher.encrypt_block(&mut block1);
            cipher.encrypt_block(&mut block2);
        }

        let mut digest = Sha256::new();

        digest.update(block1);
        digest.update(block2);

        Ok(digest.finalize())
    }
}

#[cfg(test)]
mod kdf_tests {
    use super::*;

    fn transform(seed: &[u8; 32], rounds: u64, key: &[u8; 32]) -> Vec<u8> {
        let kdf = AesKdf {
            seed: seed.to_vec(),
            rounds,
        };
        kdf.transform_key(GenericArray::from_slice(key))
            .unwrap()
            .to_vec()
    }

    #[test]
    fn transform_is_deterministic() {
        let seed = [3u8; 32];
        let key = [5u8; 32];

        assert_eq!(transform(&seed, 600, &key), transform(&seed, 600, &key));
    }

    #[test]
    fn transform_depends_on_all_parameters() {
        let seed = [3u8; 32];
        let key = [5u8; 32];

        let reference = transform(&seed, 600, &key);

        assert_ne!(reference, transform(&seed, 601, &key));
        assert_ne!(reference, transform(&[4u8; 32], 600, &key));
        assert_ne!(reference, transform(&seed, 600, &[6u8; 32]));
    }
}
