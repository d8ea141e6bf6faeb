//! Error types that this crate can return

use thiserror::Error;

pub use crate::{
    cache::CacheError,
    compression::DecompressionError,
    config::{CompressionConfigError, InnerCipherConfigError, OuterCipherConfigError},
    crypt::CryptographyError,
    db::projection::ProjectionError,
    hashed_block_stream::BlockStreamError,
    key::{DatabaseKeyError, KeyFileError},
    xml_db::parse::XmlParseError,
};

/// Errors upon reading a database
#[derive(Debug, Error)]
pub enum DatabaseOpenError {
    /// An I/O error has occurred while reading the database
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error with the database's key has occurred
    #[error(transparent)]
    Key(#[from] DatabaseKeyError),

    /// The database is corrupted
    #[error(transparent)]
    DatabaseIntegrity(#[from] DatabaseIntegrityError),
}

/// Errors stemming from corrupted databases
#[derive(Debug, Error)]
pub enum DatabaseIntegrityError {
    /// The database does not have a valid KDBX identifier
    #[error("Invalid KDBX identifier")]
    InvalidKDBXIdentifier,

    /// The version of the KDBX file cannot be read by this library
    #[error(
        "Invalid KDBX version: {:08x} {}.{}",
        version,
        file_major_version,
        file_minor_version
    )]
    InvalidKDBXVersion {
        version: u32,
        file_major_version: u32,
        file_minor_version: u32,
    },

    /// The outer header ends before its terminator record
    #[error("Truncated outer header")]
    TruncatedOuterHeader,

    #[error("Invalid outer header entry: {}", entry_type)]
    InvalidOuterHeaderEntry { entry_type: u8 },

    #[error("Incomplete outer header: Missing {}", missing_field)]
    IncompleteOuterHeader { missing_field: String },

    #[error(
        "Invalid length for header field {}: {} (expected {})",
        field,
        size,
        expected
    )]
    InvalidFieldLength {
        field: &'static str,
        size: usize,
        expected: usize,
    },

    /// The header hash recorded in the payload does not match the header
    #[error("Header hash mismatch")]
    HeaderHashMismatch,

    #[error(transparent)]
    Cryptography(#[from] CryptographyError),

    #[error(transparent)]
    Xml(#[from] XmlParseError),

    #[error(transparent)]
    OuterCipher(#[from] OuterCipherConfigError),

    #[error(transparent)]
    InnerCipher(#[from] InnerCipherConfigError),

    #[error(transparent)]
    Compression(#[from] CompressionConfigError),

    #[error(transparent)]
    Decompression(#[from] DecompressionError),

    #[error(transparent)]
    BlockStream(#[from] BlockStreamError),
}

/// Errors occurring when producing an encrypted container
#[derive(Debug, Error)]
pub enum DatabaseSaveError {
    /// An error with the key occurred while writing the container
    #[error(transparent)]
    Key(#[from] DatabaseKeyError),

    /// A cryptography error occurred while writing the container
    #[error(transparent)]
    Cryptography(#[from] CryptographyError),

    /// An error getting randomness for header seeds occurred
    #[error(transparent)]
    Random(#[from] getrandom::Error),
}

// error type conversions that skip over intermediate wrappers
mod conversions {
    use super::*;

    impl From<CryptographyError> for DatabaseOpenError {
        fn from(e: CryptographyError) -> Self {
            DatabaseIntegrityError::from(e).into()
        }
    }

    impl From<BlockStreamError> for DatabaseOpenError {
        fn from(e: BlockStreamError) -> Self {
            DatabaseIntegrityError::from(e).into()
        }
    }

    impl From<XmlParseError> for DatabaseOpenError {
        fn from(e: XmlParseError) -> Self {
            DatabaseIntegrityError::from(e).into()
        }
    }

    impl From<DecompressionError> for DatabaseOpenError {
        fn from(e: DecompressionError) -> Self {
            DatabaseIntegrityError::from(e).into()
        }
    }
}
