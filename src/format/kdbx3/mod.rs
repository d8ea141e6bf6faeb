//! The KDBX version 3 container: an outer header describing the key
//! transform and cipher setup, followed by the AES-256-CBC encrypted,
//! block-authenticated payload.

mod dump;
mod parse;

pub use dump::encrypt_kdbx3;
pub(crate) use dump::{dump_kdbx3, prepare_header};
pub use parse::{decrypt_kdbx3, decrypt_kdbx3_with_mode};
pub(crate) use parse::parse_kdbx3;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    config::{CompressionConfig, InnerCipherConfig, KdfConfig, OuterCipherConfig},
    crypt::calculate_sha256,
    error::DatabaseIntegrityError,
    format::DatabaseVersion,
};

pub(crate) const HEADER_END: u8 = 0;
pub(crate) const HEADER_COMMENT: u8 = 1;
// A UUID specifying which cipher suite should be used to encrypt the payload
pub(crate) const HEADER_OUTER_ENCRYPTION_ID: u8 = 2;
// First byte determines compression of payload
pub(crate) const HEADER_COMPRESSION_ID: u8 = 3;
// Master seed for deriving the master key
pub(crate) const HEADER_MASTER_SEED: u8 = 4;
// Seed used in deriving the transformed key
pub(crate) const HEADER_TRANSFORM_SEED: u8 = 5;
// Number of rounds used in derivation of transformed key
pub(crate) const HEADER_TRANSFORM_ROUNDS: u8 = 6;
// Initialization Vector for decrypting the payload
pub(crate) const HEADER_ENCRYPTION_IV: u8 = 7;
// Key for decrypting the inner protected values
pub(crate) const HEADER_PROTECTED_STREAM_KEY: u8 = 8;
// First bytes of decrypted payload (to check correct decryption)
pub(crate) const HEADER_STREAM_START_BYTES: u8 = 9;
// Specifies which cipher suite to use for decrypting the inner protected values
pub(crate) const HEADER_INNER_RANDOM_STREAM_ID: u8 = 10;

/// The decrypted, integrity-checked payload of a KDBX3 container.
#[derive(Debug)]
pub struct DecryptedPayload {
    /// The raw payload bytes, after block verification and decompression
    pub data: Vec<u8>,

    /// SHA-256 over the exact bytes of the outer header
    pub header_hash: Vec<u8>,

    /// Whether any payload block failed verification. Always `false` in
    /// strict mode, which fails the decryption instead.
    pub corrupted: bool,
}

#[derive(Debug)]
pub(crate) struct KDBX3Header {
    pub version: DatabaseVersion,
    pub outer_cipher: OuterCipherConfig,
    pub compression: CompressionConfig,
    pub master_seed: Vec<u8>,
    pub transform_seed: Vec<u8>,
    pub kdf_config: KdfConfig,
    pub outer_iv: Vec<u8>,
    pub protected_stream_key: Vec<u8>,
    pub stream_start: Vec<u8>,
    pub inner_cipher: InnerCipherConfig,

    /// Offset of the encrypted payload in the file; 0 for headers that were
    /// built for encryption rather than parsed
    pub body_start: usize,

    /// SHA-256 over the header's exact byte form, from the first magic byte
    /// through the terminator record
    pub header_hash: Vec<u8>,
}

fn write_header_field(header_data: &mut Vec<u8>, field_id: u8, field_value: &[u8]) {
    header_data.push(field_id);

    let pos = header_data.len();
    header_data.resize(pos + 2, 0);
    LittleEndian::write_u16(&mut header_data[pos..(pos + 2)], field_value.len() as u16);

    header_data.extend_from_slice(field_value);
}

impl KDBX3Header {
    /// Serialize the header to its exact binary form, terminator included.
    pub(crate) fn to_binary(&self) -> Vec<u8> {
        let mut data = Vec::new();

        self.version.dump(&mut data);

        write_header_field(&mut data, HEADER_OUTER_ENCRYPTION_ID, &self.outer_cipher.dump());
        write_header_field(&mut data, HEADER_COMPRESSION_ID, &self.compression.dump());
        write_header_field(&mut data, HEADER_MASTER_SEED, &self.master_seed);
        write_header_field(&mut data, HEADER_TRANSFORM_SEED, &self.transform_seed);

        let mut rounds = [0u8; 8];
        LittleEndian::write_u64(&mut rounds, self.kdf_config.rounds());
        write_header_field(&mut data, HEADER_TRANSFORM_ROUNDS, &rounds);

        write_header_field(&mut data, HEADER_ENCRYPTION_IV, &self.outer_iv);
        write_header_field(&mut data, HEADER_PROTECTED_STREAM_KEY, &self.protected_stream_key);
        write_header_field(&mut data, HEADER_STREAM_START_BYTES, &self.stream_start);

        let mut inner_cipher = [0u8; 4];
        LittleEndian::write_u32(&mut inner_cipher, self.inner_cipher.dump());
        write_header_field(&mut data, HEADER_INNER_RANDOM_STREAM_ID, &inner_cipher);

        write_header_field(&mut data, HEADER_END, &[]);

        data
    }

    /// Serialize the header and record the digest of its binary form.
    pub(crate) fn seal(&mut self) -> Vec<u8> {
        let data = self.to_binary();
        self.header_hash = calculate_sha256(&[&data]).to_vec();
        data
    }

    /// Verify that all header fields have the sizes the format prescribes.
    pub(crate) fn check(&self) -> Result<(), DatabaseIntegrityError> {
        fn check_len(
            field: &'static str,
            value: &[u8],
            expected: usize,
        ) -> Result<(), DatabaseIntegrityError> {
            if value.len() != expected {
                return Err(DatabaseIntegrityError::InvalidFieldLength {
                    field,
                    size: value.len(),
                    expected,
                });
            }
            Ok(())
        }

        check_len("Master seed", &self.master_seed, 32)?;
        check_len("Transform seed", &self.transform_seed, 32)?;
        check_len("Outer cipher IV", &self.outer_iv, 16)?;
        check_len("Protected stream key", &self.protected_stream_key, 32)?;
        check_len("Stream start bytes", &self.stream_start, 32)?;

        Ok(())
    }
}
