use std::convert::TryFrom;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    config::{CompressionConfig, InnerCipherConfig, KdfConfig, OuterCipherConfig},
    crypt::{calculate_sha256, ciphers::Cipher, CryptographyError},
    db::Database,
    error::{DatabaseIntegrityError, DatabaseOpenError},
    format::kdbx3::{
        DecryptedPayload, KDBX3Header, HEADER_COMMENT, HEADER_COMPRESSION_ID,
        HEADER_ENCRYPTION_IV, HEADER_END, HEADER_INNER_RANDOM_STREAM_ID, HEADER_MASTER_SEED,
        HEADER_OUTER_ENCRYPTION_ID, HEADER_PROTECTED_STREAM_KEY, HEADER_STREAM_START_BYTES,
        HEADER_TRANSFORM_ROUNDS, HEADER_TRANSFORM_SEED,
    },
    format::DatabaseVersion,
    hashed_block_stream::{read_hashed_block_stream, IntegrityMode},
    key::{DatabaseKey, DatabaseKeyError},
};

pub(crate) fn parse_outer_header(data: &[u8]) -> Result<KDBX3Header, DatabaseOpenError> {
    let version = DatabaseVersion::parse(data)?;

    let mut outer_cipher: Option<OuterCipherConfig> = None;
    let mut compression: Option<CompressionConfig> = None;
    let mut master_seed: Option<Vec<u8>> = None;
    let mut transform_seed: Option<Vec<u8>> = None;
    let mut transform_rounds: Option<u64> = None;
    let mut outer_iv: Option<Vec<u8>> = None;
    let mut protected_stream_key: Option<Vec<u8>> = None;
    let mut stream_start: Option<Vec<u8>> = None;
    let mut inner_cipher: Option<InnerCipherConfig> = None;

    // skip over the version header
    let mut pos = DatabaseVersion::get_version_header_size();

    // parse header records.
    //
    // every record is a triplet of (3 + entry_length) bytes with this structure:
    //
    // (
    //   entry_type: u8,                        // a numeric entry type identifier
    //   entry_length: u16,                     // length of the entry buffer
    //   entry_buffer: [u8; entry_length]       // the entry buffer
    // )

    loop {
        if data.len() < pos + 3 {
            return Err(DatabaseIntegrityError::TruncatedOuterHeader.into());
        }

        let entry_type = data[pos];
        let entry_length: usize = LittleEndian::read_u16(&data[pos + 1..(pos + 3)]) as usize;

        if data.len() < pos + 3 + entry_length {
            return Err(DatabaseIntegrityError::TruncatedOuterHeader.into());
        }

        let entry_buffer = &data[(pos + 3)..(pos + 3 + entry_length)];

        pos += 3 + entry_length;

        match entry_type {
            HEADER_END => {
                break;
            }

            HEADER_COMMENT => {}

            HEADER_OUTER_ENCRYPTION_ID => {
                outer_cipher = Some(
                    OuterCipherConfig::try_from(entry_buffer)
                        .map_err(DatabaseIntegrityError::from)?,
                );
            }

            HEADER_COMPRESSION_ID => {
                if entry_buffer.len() != 4 {
                    return Err(DatabaseIntegrityError::InvalidFieldLength {
                        field: "Compression ID",
                        size: entry_buffer.len(),
                        expected: 4,
                    }
                    .into());
                }
                compression = Some(
                    CompressionConfig::try_from(LittleEndian::read_u32(entry_buffer))
                        .map_err(DatabaseIntegrityError::from)?,
                );
            }

            HEADER_MASTER_SEED => master_seed = Some(entry_buffer.to_vec()),

            HEADER_TRANSFORM_SEED => transform_seed = Some(entry_buffer.to_vec()),

            HEADER_TRANSFORM_ROUNDS => {
                if entry_buffer.len() != 8 {
                    return Err(DatabaseIntegrityError::InvalidFieldLength {
                        field: "Number of transformation rounds",
                        size: entry_buffer.len(),
                        expected: 8,
                    }
                    .into());
                }
                transform_rounds = Some(LittleEndian::read_u64(entry_buffer));
            }

            HEADER_ENCRYPTION_IV => outer_iv = Some(entry_buffer.to_vec()),

            HEADER_PROTECTED_STREAM_KEY => protected_stream_key = Some(entry_buffer.to_vec()),

            HEADER_STREAM_START_BYTES => stream_start = Some(entry_buffer.to_vec()),

            HEADER_INNER_RANDOM_STREAM_ID => {
                if entry_buffer.len() != 4 {
                    return Err(DatabaseIntegrityError::InvalidFieldLength {
                        field: "Inner cipher ID",
                        size: entry_buffer.len(),
                        expected: 4,
                    }
                    .into());
                }
                inner_cipher = Some(
                    InnerCipherConfig::try_from(LittleEndian::read_u32(entry_buffer))
                        .map_err(DatabaseIntegrityError::from)?,
                );
            }

            _ => {
                return Err(DatabaseIntegrityError::InvalidOuterHeaderEntry { entry_type }.into());
            }
        };
    }

    // at this point, the header needs to be fully defined - unwrap options
    // and return errors if something is missing

    fn get_or_err<T>(v: Option<T>, err: &str) -> Result<T, DatabaseIntegrityError> {
        v.ok_or_else(|| DatabaseIntegrityError::IncompleteOuterHeader {
            missing_field: err.into(),
        })
    }

    let outer_cipher = get_or_err(outer_cipher, "Outer Cipher ID")?;
    let compression = get_or_err(compression, "Compression ID")?;
    let master_seed = get_or_err(master_seed, "Master seed")?;
    let transform_seed = get_or_err(transform_seed, "Transform seed")?;
    let transform_rounds = get_or_err(transform_rounds, "Number of transformation rounds")?;
    let outer_iv = get_or_err(outer_iv, "Outer cipher IV")?;
    let protected_stream_key = get_or_err(protected_stream_key, "Protected stream key")?;
    let stream_start = get_or_err(stream_start, "Stream start bytes")?;
    let inner_cipher = get_or_err(inner_cipher, "Inner cipher ID")?;

    // KDF type is always AES for KDBX3
    let kdf_config = KdfConfig::Aes {
        rounds: transform_rounds,
    };

    let header_hash = calculate_sha256(&[&data[0..pos]]).to_vec();

    Ok(KDBX3Header {
        version,
        outer_cipher,
        compression,
        master_seed,
        transform_seed,
        kdf_config,
        outer_iv,
        protected_stream_key,
        stream_start,
        inner_cipher,
        body_start: pos,
        header_hash,
    })
}

/// Open, decrypt and parse a KDBX3 database from its raw bytes and a key
pub(crate) fn parse_kdbx3(data: &[u8], db_key: &DatabaseKey) -> Result<Database, DatabaseOpenError> {
    let (mut inner_decryptor, payload) =
        decrypt_kdbx3_inner(data, db_key, IntegrityMode::Strict)?;

    let content = crate::xml_db::parse::parse(&payload.data, &mut *inner_decryptor)
        .map_err(DatabaseIntegrityError::from)?;

    let db = Database {
        name: content.meta.database_name,
        custom_icons: content.meta.custom_icons,
        groups: content.groups,
        header_hash: content.meta.header_hash,
    };

    // a header hash recorded inside the payload must match the actual header
    if let Some(expected) = &db.header_hash {
        if expected != &payload.header_hash {
            return Err(DatabaseIntegrityError::HeaderHashMismatch.into());
        }
    }

    Ok(db)
}

/// Decrypt a KDBX3 database to its raw payload, stopping at the first
/// corrupted payload block
pub fn decrypt_kdbx3(
    data: &[u8],
    db_key: &DatabaseKey,
) -> Result<DecryptedPayload, DatabaseOpenError> {
    decrypt_kdbx3_with_mode(data, db_key, IntegrityMode::Strict)
}

/// Decrypt a KDBX3 database to its raw payload with an explicit integrity
/// mode for the payload block stream
pub fn decrypt_kdbx3_with_mode(
    data: &[u8],
    db_key: &DatabaseKey,
    mode: IntegrityMode,
) -> Result<DecryptedPayload, DatabaseOpenError> {
    let (_, payload) = decrypt_kdbx3_inner(data, db_key, mode)?;
    Ok(payload)
}

pub(crate) fn decrypt_kdbx3_inner(
    data: &[u8],
    db_key: &DatabaseKey,
    mode: IntegrityMode,
) -> Result<(Box<dyn Cipher>, DecryptedPayload), DatabaseOpenError> {
    let header = parse_outer_header(data)?;
    header.check()?;

    // Derive the stream key for decrypting inner protected values and set up
    // the decryption context
    let stream_key = calculate_sha256(&[header.protected_stream_key.as_ref()]);

    let inner_decryptor = header
        .inner_cipher
        .get_cipher(&stream_key)
        .map_err(DatabaseIntegrityError::from)?;

    // Rest of file after header is the encrypted payload
    let payload_encrypted = &data[header.body_start..];

    // derive master key from composite key, transform_seed, transform_rounds
    // and master_seed
    let key_elements = db_key.get_key_elements()?;
    let key_elements: Vec<&[u8]> = key_elements.iter().map(|v| &v[..]).collect();
    let composite_key = calculate_sha256(&key_elements);

    let transformed_key = header
        .kdf_config
        .get_kdf_seeded(&header.transform_seed)
        .transform_key(&composite_key)
        .map_err(DatabaseIntegrityError::from)?;

    let master_key = calculate_sha256(&[header.master_seed.as_ref(), &transformed_key]);

    // Decrypt the payload. An unpadding failure means the derived key was
    // wrong: with the correct key the padding is always well-formed.
    let payload = match header
        .outer_cipher
        .get_cipher(&master_key, header.outer_iv.as_ref())
        .map_err(DatabaseIntegrityError::from)?
        .decrypt(payload_encrypted)
    {
        Ok(payload) => payload,
        Err(CryptographyError::Unpadding(_)) => {
            return Err(DatabaseKeyError::IncorrectKey.into());
        }
        Err(e) => return Err(DatabaseIntegrityError::from(e).into()),
    };

    // Check if we decrypted correctly
    if payload.len() < header.stream_start.len()
        || &payload[0..header.stream_start.len()] != header.stream_start.as_slice()
    {
        return Err(DatabaseKeyError::IncorrectKey.into());
    }

    // The rest of the payload is a hashed block stream
    let (buf, corrupted) =
        read_hashed_block_stream(&payload[header.stream_start.len()..], mode)
            .map_err(DatabaseIntegrityError::from)?;

    let data = header
        .compression
        .get_compression()
        .decompress(&buf)
        .map_err(DatabaseIntegrityError::from)?;

    Ok((
        inner_decryptor,
        DecryptedPayload {
            data,
            header_hash: header.header_hash,
            corrupted,
        },
    ))
}
