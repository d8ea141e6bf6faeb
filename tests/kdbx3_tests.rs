use anyhow::Result;

use kpdb::error::{DatabaseKeyError, DatabaseOpenError};
use kpdb::format::kdbx3::{decrypt_kdbx3, decrypt_kdbx3_with_mode, encrypt_kdbx3};
use kpdb::{DatabaseKey, IntegrityMode};

#[test]
fn encrypt_decrypt_roundtrip() -> Result<()> {
    let key = DatabaseKey::new().with_password("k");

    let encrypted = encrypt_kdbx3(b"hello", &key, 128)?;
    let payload = decrypt_kdbx3(&encrypted, &key)?;

    assert_eq!(payload.data, b"hello");
    assert_eq!(payload.header_hash.len(), 32);
    assert!(!payload.corrupted);

    Ok(())
}

#[test]
fn roundtrip_survives_payload_shapes_and_round_counts() -> Result<()> {
    let key = DatabaseKey::new().with_password("round trip");

    for rounds in [1u64, 13, 6000] {
        for payload in [&b""[..], &b"x"[..], &[0u8; 4096][..]] {
            let encrypted = encrypt_kdbx3(payload, &key, rounds)?;
            assert_eq!(decrypt_kdbx3(&encrypted, &key)?.data, payload);
        }
    }

    Ok(())
}

#[test]
fn distinct_credentials_never_decrypt() -> Result<()> {
    let encrypted = encrypt_kdbx3(
        b"credential sensitivity",
        &DatabaseKey::new().with_password("correct horse"),
        256,
    )?;

    for wrong in ["correct hors", "correct horsf", "", "Correct horse"] {
        let result = decrypt_kdbx3(&encrypted, &DatabaseKey::new().with_password(wrong));
        assert!(matches!(
            result,
            Err(DatabaseOpenError::Key(DatabaseKeyError::IncorrectKey))
        ));
    }

    Ok(())
}

#[test]
fn password_and_keyfile_form_one_composite_credential() -> Result<()> {
    let keyfile: Vec<u8> = (0u8..32).collect();

    let both = DatabaseKey::new()
        .with_password("pwd")
        .with_keyfile(&mut keyfile.as_slice())?;

    let encrypted = encrypt_kdbx3(b"secret payload", &both, 64)?;

    assert_eq!(decrypt_kdbx3(&encrypted, &both)?.data, b"secret payload");

    // each component alone is rejected
    for partial in [
        DatabaseKey::new().with_password("pwd"),
        DatabaseKey::new().with_keyfile(&mut keyfile.as_slice())?,
    ] {
        assert!(matches!(
            decrypt_kdbx3(&encrypted, &partial),
            Err(DatabaseOpenError::Key(DatabaseKeyError::IncorrectKey))
        ));
    }

    Ok(())
}

#[test]
fn empty_key_cannot_encrypt() {
    let result = encrypt_kdbx3(b"payload", &DatabaseKey::new(), 64);
    assert!(result.is_err());
}

#[test]
fn truncated_container_is_rejected() -> Result<()> {
    let key = DatabaseKey::new().with_password("k");
    let encrypted = encrypt_kdbx3(b"hello", &key, 64)?;

    for len in [0, 4, 11, 40] {
        assert!(decrypt_kdbx3(&encrypted[..len], &key).is_err());
    }

    Ok(())
}

#[test]
fn strict_is_the_default_integrity_mode() -> Result<()> {
    let key = DatabaseKey::new().with_password("k");
    let encrypted = encrypt_kdbx3(b"hello", &key, 64)?;

    let strict = decrypt_kdbx3_with_mode(&encrypted, &key, IntegrityMode::Strict)?;
    let default = decrypt_kdbx3(&encrypted, &key)?;

    assert_eq!(strict.data, default.data);
    Ok(())
}
