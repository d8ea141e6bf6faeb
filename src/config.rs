use hex_literal::hex;

use std::convert::TryFrom;
use thiserror::Error;

use crate::{
    compression,
    crypt::{ciphers, kdf, CryptographyError},
};

const CIPHERSUITE_AES256: [u8; 16] = hex!("31c1f2e6bf714350be5805216afc5aff");

// Internal IDs for the inner stream ciphers; ID 1 is the unsupported ARC4
// family
const PLAIN: u32 = 0;
const SALSA_20: u32 = 2;

/// Choices for outer encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OuterCipherConfig {
    AES256,
}

/// Errors for outer encryption configuration
#[derive(Debug, Error)]
pub enum OuterCipherConfigError {
    #[error(transparent)]
    Cryptography(#[from] CryptographyError),

    #[error("Unsupported outer cipher ID: {:?}", cid)]
    UnsupportedOuterCipherID { cid: Vec<u8> },
}

impl OuterCipherConfig {
    pub(crate) fn get_cipher(
        &self,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn ciphers::Cipher>, CryptographyError> {
        match self {
            OuterCipherConfig::AES256 => Ok(Box::new(ciphers::AES256Cipher::new(key, iv)?)),
        }
    }

    pub(crate) fn dump(&self) -> [u8; 16] {
        match self {
            OuterCipherConfig::AES256 => CIPHERSUITE_AES256,
        }
    }
}

impl TryFrom<&[u8]> for OuterCipherConfig {
    type Error = OuterCipherConfigError;

    fn try_from(v: &[u8]) -> Result<OuterCipherConfig, Self::Error> {
        if v == CIPHERSUITE_AES256 {
            Ok(OuterCipherConfig::AES256)
        } else {
            Err(OuterCipherConfigError::UnsupportedOuterCipherID { cid: v.to_vec() })
        }
    }
}

/// Choices for encrypting protected values inside of databases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerCipherConfig {
    Plain,
    Salsa20,
}

/// Errors with inner protected value encryption
#[derive(Debug, Error)]
pub enum InnerCipherConfigError {
    #[error(transparent)]
    Cryptography(#[from] CryptographyError),

    #[error("Unsupported inner cipher ID: {}", cid)]
    UnsupportedInnerCipherID { cid: u32 },
}

impl InnerCipherConfig {
    pub(crate) fn get_cipher(
        &self,
        key: &[u8],
    ) -> Result<Box<dyn ciphers::Cipher>, CryptographyError> {
        match self {
            InnerCipherConfig::Plain => Ok(Box::new(ciphers::PlainCipher::new(key)?)),
            InnerCipherConfig::Salsa20 => Ok(Box::new(ciphers::Salsa20Cipher::new(key)?)),
        }
    }

    pub(crate) fn dump(&self) -> u32 {
        match self {
            InnerCipherConfig::Plain => PLAIN,
            InnerCipherConfig::Salsa20 => SALSA_20,
        }
    }
}

impl TryFrom<u32> for InnerCipherConfig {
    type Error = InnerCipherConfigError;

    fn try_from(v: u32) -> Result<InnerCipherConfig, Self::Error> {
        match v {
            PLAIN => Ok(InnerCipherConfig::Plain),
            SALSA_20 => Ok(InnerCipherConfig::Salsa20),
            // this includes ARC4, which exists in the format but is not supported
            _ => Err(InnerCipherConfigError::UnsupportedInnerCipherID { cid: v }),
        }
    }
}

/// Choices for Key Derivation Functions (KDFs)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfConfig {
    /// Derive keys with repeated AES encryption
    Aes { rounds: u64 },
}

impl KdfConfig {
    /// For reading or writing a database, generate a KDF from the KDF
    /// settings and a provided seed
    pub(crate) fn get_kdf_seeded(&self, seed: &[u8]) -> Box<dyn kdf::Kdf> {
        match self {
            KdfConfig::Aes { rounds } => Box::new(kdf::AesKdf {
                seed: seed.to_vec(),
                rounds: *rounds,
            }),
        }
    }

    pub(crate) fn rounds(&self) -> u64 {
        match self {
            KdfConfig::Aes { rounds } => *rounds,
        }
    }
}

/// Choices of compression algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionConfig {
    None,
    GZip,
}

/// Errors with compression choice
#[derive(Debug, Error)]
pub enum CompressionConfigError {
    /// The identifier for the compression algorithm specified in the database is invalid
    #[error("Invalid compression suite: {}", cid)]
    InvalidCompressionSuite { cid: u32 },
}

impl CompressionConfig {
    pub(crate) fn get_compression(&self) -> Box<dyn compression::Compression> {
        match self {
            CompressionConfig::None => Box::new(compression::NoCompression),
            CompressionConfig::GZip => Box::new(compression::GZipCompression),
        }
    }

    pub(crate) fn dump(&self) -> [u8; 4] {
        match self {
            CompressionConfig::None => [0, 0, 0, 0],
            CompressionConfig::GZip => [1, 0, 0, 0],
        }
    }
}

impl TryFrom<u32> for CompressionConfig {
    type Error = CompressionConfigError;

    fn try_from(v: u32) -> Result<CompressionConfig, Self::Error> {
        match v {
            0 => Ok(CompressionConfig::None),
            1 => Ok(CompressionConfig::GZip),
            _ => Err(CompressionConfigError::InvalidCompressionSuite { cid: v }),
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn arc4_inner_stream_is_rejected() {
        let result = InnerCipherConfig::try_from(1);
        assert!(matches!(
            result,
            Err(InnerCipherConfigError::UnsupportedInnerCipherID { cid: 1 })
        ));
    }

    #[test]
    fn inner_stream_ids_roundtrip() {
        for config in [InnerCipherConfig::Plain, InnerCipherConfig::Salsa20] {
            assert_eq!(InnerCipherConfig::try_from(config.dump()).unwrap(), config);
        }
    }

    #[test]
    fn unknown_outer_cipher_is_rejected() {
        let chacha20_oid = hex_literal::hex!("d6038a2b8b6f4cb5a524339a31dbb59a");
        assert!(OuterCipherConfig::try_from(&chacha20_oid[..]).is_err());
    }

    #[test]
    fn compression_ids_roundtrip() {
        for config in [CompressionConfig::None, CompressionConfig::GZip] {
            let id = u32::from_le_bytes(config.dump());
            assert_eq!(CompressionConfig::try_from(id).unwrap(), config);
        }
    }
}
