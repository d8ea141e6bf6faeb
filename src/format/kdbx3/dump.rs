use crate::{
    config::{CompressionConfig, InnerCipherConfig, KdfConfig, OuterCipherConfig},
    crypt::calculate_sha256,
    error::DatabaseSaveError,
    format::kdbx3::KDBX3Header,
    format::{DatabaseVersion, KDBX3_CURRENT_MINOR_VERSION, KDBX3_MAJOR_VERSION},
    hashed_block_stream::write_hashed_block_stream,
    key::DatabaseKey,
};

/// Build a fresh header for encryption, with random seed material and the
/// fixed cipher setup of the encrypt path: AES-256 outer cipher, no
/// compression, no inner stream.
///
/// The returned header is sealed, i.e. its `header_hash` is the digest of
/// the exact bytes `dump_kdbx3` will emit.
pub(crate) fn prepare_header(rounds: u64) -> Result<KDBX3Header, DatabaseSaveError> {
    let mut master_seed = vec![0; 32];
    let mut transform_seed = vec![0; 32];
    let mut outer_iv = vec![0; 16];
    let mut protected_stream_key = vec![0; 32];
    let mut stream_start = vec![0; 32];

    getrandom::getrandom(&mut master_seed)?;
    getrandom::getrandom(&mut transform_seed)?;
    getrandom::getrandom(&mut outer_iv)?;
    getrandom::getrandom(&mut protected_stream_key)?;
    getrandom::getrandom(&mut stream_start)?;

    let mut header = KDBX3Header {
        version: DatabaseVersion {
            file_major_version: KDBX3_MAJOR_VERSION,
            file_minor_version: KDBX3_CURRENT_MINOR_VERSION,
        },
        outer_cipher: OuterCipherConfig::AES256,
        compression: CompressionConfig::None,
        master_seed,
        transform_seed,
        kdf_config: KdfConfig::Aes { rounds },
        outer_iv,
        protected_stream_key,
        stream_start,
        inner_cipher: InnerCipherConfig::Plain,
        body_start: 0,
        header_hash: Vec::new(),
    };

    header.seal();

    Ok(header)
}

/// Encrypt a plaintext payload under a prepared header.
pub(crate) fn dump_kdbx3(
    header: &KDBX3Header,
    plaintext: &[u8],
    db_key: &DatabaseKey,
) -> Result<Vec<u8>, DatabaseSaveError> {
    let mut data = header.to_binary();

    // derive master key from composite key, transform_seed, transform_rounds
    // and master_seed
    let key_elements = db_key.get_key_elements()?;
    let key_elements: Vec<&[u8]> = key_elements.iter().map(|v| &v[..]).collect();
    let composite_key = calculate_sha256(&key_elements);

    let transformed_key = header
        .kdf_config
        .get_kdf_seeded(&header.transform_seed)
        .transform_key(&composite_key)?;

    let master_key = calculate_sha256(&[header.master_seed.as_ref(), &transformed_key]);

    // the plaintext canary goes in front of the block stream
    let mut payload = header.stream_start.clone();
    payload.extend_from_slice(&write_hashed_block_stream(plaintext));

    let payload_encrypted = header
        .outer_cipher
        .get_cipher(&master_key, header.outer_iv.as_ref())?
        .encrypt(&payload)?;

    data.extend_from_slice(&payload_encrypted);

    Ok(data)
}

/// Encrypt a plaintext payload into a fresh KDBX3 container.
pub fn encrypt_kdbx3(
    plaintext: &[u8],
    db_key: &DatabaseKey,
    rounds: u64,
) -> Result<Vec<u8>, DatabaseSaveError> {
    let header = prepare_header(rounds)?;
    dump_kdbx3(&header, plaintext, db_key)
}
