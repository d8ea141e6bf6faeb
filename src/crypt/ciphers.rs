use aes::Aes256;
use cipher::{
    block_padding::Pkcs7,
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher,
};
use salsa20::Salsa20;

use crate::crypt::CryptographyError;

/// Nonce prescribed by the KDBX format for the inner Salsa20 stream.
const SALSA20_IV: [u8; 8] = [0xE8, 0x30, 0x09, 0x4B, 0x97, 0x20, 0x5D, 0x2A];

pub(crate) trait Cipher {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptographyError>;

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptographyError>;

    /// Draw the next `len` bytes of the cipher's keystream.
    ///
    /// Only meaningful for stream ciphers, where applying the keystream to a
    /// run of zeroes yields the keystream itself.
    fn keystream(&mut self, len: usize) -> Result<Vec<u8>, CryptographyError> {
        self.decrypt(&vec![0; len])
    }
}

type Aes256CbcEncryptor = cbc::Encryptor<Aes256>;
type Aes256CbcDecryptor = cbc::Decryptor<Aes256>;

pub(crate) struct AES256Cipher {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl AES256Cipher {
    pub(crate) fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptographyError> {
        Ok(AES256Cipher {
            key: Vec::from(key),
            iv: Vec::from(iv),
        })
    }
}

impl Cipher for AES256Cipher {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        let cipher = Aes256CbcEncryptor::new_from_slices(&self.key, &self.iv)?;

        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok(ciphertext)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        let mut out = vec![0; ciphertext.len()];

        let cipher = Aes256CbcDecryptor::new_from_slices(&self.key[..], &self.iv[..])?;

        let len = cipher
            .decrypt_padded_b2b_mut::<Pkcs7>(ciphertext, &mut out)?
            .len();

        out.truncate(len);

        Ok(out)
    }
}

pub(crate) struct Salsa20Cipher {
    cipher: Salsa20,
}

impl Salsa20Cipher {
    pub(crate) fn new(key: &[u8]) -> Result<Self, CryptographyError> {
        let key = GenericArray::from_slice(key);
        let iv = GenericArray::from(SALSA20_IV);

        Ok(Salsa20Cipher {
            cipher: Salsa20::new(key, &iv),
        })
    }
}

impl Cipher for Salsa20Cipher {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        let mut buffer = Vec::from(plaintext);
        self.cipher.apply_keystream(&mut buffer);
        Ok(buffer)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        let mut buffer = Vec::from(ciphertext);
        self.cipher.apply_keystream(&mut buffer);
        Ok(buffer)
    }
}

pub(crate) struct PlainCipher;

impl PlainCipher {
    pub(crate) fn new(_: &[u8]) -> Result<Self, CryptographyError> {
        Ok(PlainCipher)
    }
}

impl Cipher for PlainCipher {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        Ok(Vec::from(plaintext))
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptographyError> {
        Ok(Vec::from(ciphertext))
    }
}

#[cfg(test)]
mod cipher_tests {
    use hex_literal::hex;
    use salsa20::{
        cipher::{KeyIvInit, StreamCipher},
        Salsa20,
    };

    use super::*;

    #[test]
    fn aes_cbc_roundtrip() -> Result<(), CryptographyError> {
        let key = [1u8; 32];
        let iv = [2u8; 16];

        for len in [0usize, 1, 15, 16, 17, 31, 32, 1000] {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();

            let ciphertext = AES256Cipher::new(&key, &iv)?.encrypt(&plaintext)?;

            // PKCS#7 always pads, including a full extra block on alignment
            assert_eq!(ciphertext.len(), (len / 16 + 1) * 16);

            let decrypted = AES256Cipher::new(&key, &iv)?.decrypt(&ciphertext)?;
            assert_eq!(decrypted, plaintext);
        }

        Ok(())
    }

    #[test]
    fn aes_cbc_rejects_broken_padding() -> Result<(), CryptographyError> {
        let key = [1u8; 32];
        let iv = [2u8; 16];

        let mut ciphertext = AES256Cipher::new(&key, &iv)?.encrypt(b"some payload")?;

        // flipping a bit in the last block scrambles the padding
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;

        let result = AES256Cipher::new(&key, &iv)?.decrypt(&ciphertext);
        assert!(matches!(result, Err(CryptographyError::Unpadding(_))));

        Ok(())
    }

    #[test]
    fn salsa20_known_answer() {
        // ECRYPT verified test vector, 256-bit key set 1 vector 0
        let key = hex!("8000000000000000000000000000000000000000000000000000000000000000");
        let iv = [0u8; 8];

        let mut cipher = Salsa20::new(&key.into(), &iv.into());
        let mut stream = [0u8; 64];
        cipher.apply_keystream(&mut stream);

        let expected = hex!(
            "e3be8fdd8beca2e3ea8ef9475b29a6e7"
            "003951e1097a5c38d23b7a5fad9f6844"
            "b22c97559e2723c7cbbd3fe4fc8d9a07"
            "44652a83e72a9c461876af4d7ef1a117"
        );
        assert_eq!(stream, expected);
    }

    #[test]
    fn salsa20_keystream_is_partition_invariant() -> Result<(), CryptographyError> {
        let key = [7u8; 32];

        let mut one_shot = Salsa20Cipher::new(&key)?;
        let whole = one_shot.keystream(64)?;

        let mut chunked = Salsa20Cipher::new(&key)?;
        let mut pieces = chunked.keystream(3)?;
        pieces.extend(chunked.keystream(0)?);
        pieces.extend(chunked.keystream(13)?);
        pieces.extend(chunked.keystream(48)?);

        assert_eq!(whole, pieces);
        Ok(())
    }

    #[test]
    fn salsa20_xor_roundtrip() -> Result<(), CryptographyError> {
        let key = [9u8; 32];
        let plaintext = b"protected field contents";

        let ciphertext = Salsa20Cipher::new(&key)?.encrypt(plaintext)?;
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let decrypted = Salsa20Cipher::new(&key)?.decrypt(&ciphertext)?;
        assert_eq!(&decrypted[..], &plaintext[..]);

        Ok(())
    }

    #[test]
    fn plain_cipher_keystream_is_zeroes() -> Result<(), CryptographyError> {
        let mut cipher = PlainCipher::new(&[])?;
        assert_eq!(cipher.keystream(8)?, vec![0u8; 8]);
        Ok(())
    }
}
