//! Composite database credentials: a password and/or a key file.

use std::io::Read;

use base64::{engine::general_purpose as base64_engine, Engine as _};
use thiserror::Error;
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypt::calculate_sha256;

pub type KeyElement = Vec<u8>;

/// Length of the secret a key file must resolve to.
const KEYFILE_KEY_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum KeyFileError {
    #[error("Key data in XML key file is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Key file key must be {} bytes, got {}", KEYFILE_KEY_SIZE, size)]
    WrongKeySize { size: usize },

    #[error("Unrecognized key file format")]
    UnrecognizedFormat,
}

/// Try to read the buffer as an XML key file with a `KeyFile/Key/Data`
/// element holding the base64 of a 32-byte key.
///
/// Returns `Ok(None)` if the buffer is not such a document, so that the
/// other key file forms can be tried; returns an error if the document
/// matches the XML form but its key data is unusable.
fn parse_xml_keyfile(xml: &[u8]) -> Result<Option<KeyElement>, KeyFileError> {
    let parser = EventReader::new(xml);

    let mut tag_stack = Vec::new();
    let mut key_value: Option<String> = None;

    for ev in parser {
        let ev = match ev {
            Ok(ev) => ev,
            // not well-formed XML; not the XML key file form
            Err(_) => return Ok(None),
        };

        match ev {
            XmlEvent::StartElement {
                name: OwnedName { ref local_name, .. },
                ..
            } => {
                tag_stack.push(local_name.clone());
            }
            XmlEvent::EndElement { .. } => {
                tag_stack.pop();
            }
            XmlEvent::Characters(s) => {
                if tag_stack == ["KeyFile", "Key", "Data"] {
                    key_value = Some(s);
                }
            }
            _ => {}
        }
    }

    let key_value = match key_value {
        Some(v) => v,
        None => return Ok(None),
    };

    let key = base64_engine::STANDARD.decode(key_value.trim())?;

    if key.len() != KEYFILE_KEY_SIZE {
        return Err(KeyFileError::WrongKeySize { size: key.len() });
    }

    Ok(Some(key))
}

/// Resolve a key file to its 32-byte key.
///
/// Recognition order: XML form, raw binary form (exactly 32 bytes), hex form
/// (exactly 64 ASCII hex characters). Everything else is rejected; an
/// unrecognized key file never contributes to the composite key.
pub(crate) fn parse_keyfile(buffer: &[u8]) -> Result<KeyElement, KeyFileError> {
    if let Some(key) = parse_xml_keyfile(buffer)? {
        return Ok(key);
    }

    if buffer.len() == KEYFILE_KEY_SIZE {
        return Ok(buffer.to_vec());
    }

    if buffer.len() == 2 * KEYFILE_KEY_SIZE && buffer.iter().all(u8::is_ascii_hexdigit) {
        // length and characters are checked, so this cannot fail
        return hex::decode(buffer).map_err(|_| KeyFileError::UnrecognizedFormat);
    }

    Err(KeyFileError::UnrecognizedFormat)
}

/// Derive the password under which a cache envelope is stored from the full
/// database password: its first half, or the whole password when it is
/// shorter than 4 characters.
pub fn cache_password(password: &str) -> String {
    let chars: Vec<char> = password.chars().collect();
    if chars.len() < 4 {
        password.to_string()
    } else {
        chars[..chars.len() / 2].iter().collect()
    }
}

/// A composite database credential consisting of a password and/or a key file
#[derive(Debug, Clone, Default, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct DatabaseKey {
    password: Option<String>,
    keyfile: Option<Vec<u8>>,
}

impl DatabaseKey {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_keyfile(mut self, keyfile: &mut dyn Read) -> Result<Self, std::io::Error> {
        let mut buf = Vec::new();
        keyfile.read_to_end(&mut buf)?;

        self.keyfile = Some(buf);

        Ok(self)
    }

    /// Returns true if the key is not associated with any key component.
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.keyfile.is_none()
    }

    /// The ordered 32-byte members of the composite key: the hashed password
    /// first, then the key-file key.
    pub(crate) fn get_key_elements(&self) -> Result<Vec<KeyElement>, DatabaseKeyError> {
        let mut out = Vec::new();

        if let Some(p) = &self.password {
            out.push(calculate_sha256(&[p.as_bytes()]).to_vec());
        }

        if let Some(f) = &self.keyfile {
            out.push(parse_keyfile(f)?);
        }

        if out.is_empty() {
            return Err(DatabaseKeyError::EmptyKey);
        }

        Ok(out)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseKeyError {
    #[error("Incorrect key")]
    IncorrectKey,

    #[error("Invalid key - no key components")]
    EmptyKey,

    #[error("Error parsing key file: {0}")]
    Keyfile(#[from] KeyFileError),
}

#[cfg(test)]
mod key_tests {
    use anyhow::Result;
    use sha2::{Digest, Sha256};

    use super::*;

    #[test]
    fn password_only_key() -> Result<()> {
        let ke = DatabaseKey::new().with_password("asdf").get_key_elements()?;

        assert_eq!(ke.len(), 1);
        assert_eq!(ke[0], Sha256::digest(b"asdf").to_vec());

        Ok(())
    }

    #[test]
    fn binary_keyfile_contributes_raw_bytes() -> Result<()> {
        let keyfile: Vec<u8> = (0u8..32).collect();

        let ke = DatabaseKey::new()
            .with_password("pwd")
            .with_keyfile(&mut keyfile.as_slice())?
            .get_key_elements()?;

        assert_eq!(ke.len(), 2);
        assert_eq!(ke[0], Sha256::digest(b"pwd").to_vec());
        assert_eq!(ke[1], keyfile);

        // the composite hash is the digest of the concatenated members
        let elements: Vec<&[u8]> = ke.iter().map(|v| &v[..]).collect();
        let composite = calculate_sha256(&elements);

        let mut concatenated = Sha256::digest(b"pwd").to_vec();
        concatenated.extend_from_slice(&keyfile);
        assert_eq!(composite.to_vec(), Sha256::digest(&concatenated).to_vec());

        Ok(())
    }

    #[test]
    fn hex_keyfile_contributes_decoded_bytes() -> Result<()> {
        let keyfile = "00".repeat(16) + &"FF".repeat(16);

        let ke = DatabaseKey::new()
            .with_keyfile(&mut keyfile.as_bytes())?
            .get_key_elements()?;

        let mut expected = vec![0u8; 16];
        expected.extend(vec![0xFFu8; 16]);

        assert_eq!(ke.len(), 1);
        assert_eq!(ke[0], expected);

        Ok(())
    }

    #[test]
    fn xml_keyfile_contributes_decoded_base64() -> Result<()> {
        let ke = DatabaseKey::new()
            .with_keyfile(
                &mut "<KeyFile><Key><Data>NXyYiJMHg3ls+eBmjbAjWec9lcOToJiofbhNiFMTJMw=</Data></Key></KeyFile>"
                    .as_bytes(),
            )?
            .get_key_elements()?;

        assert_eq!(ke.len(), 1);
        assert_eq!(ke[0].len(), 32);

        Ok(())
    }

    #[test]
    fn xml_keyfile_with_wrong_key_size_is_rejected() -> Result<()> {
        let result = DatabaseKey::new()
            .with_keyfile(&mut "<KeyFile><Key><Data>c2hvcnQ=</Data></Key></KeyFile>".as_bytes())?
            .get_key_elements();

        assert!(matches!(
            result,
            Err(DatabaseKeyError::Keyfile(KeyFileError::WrongKeySize { .. }))
        ));

        Ok(())
    }

    #[test]
    fn unrecognized_keyfile_is_rejected() -> Result<()> {
        // 33 bytes, not hex, not XML
        let result = DatabaseKey::new()
            .with_keyfile(&mut "this is not a usable key file, no".as_bytes())?
            .get_key_elements();

        assert!(matches!(
            result,
            Err(DatabaseKeyError::Keyfile(KeyFileError::UnrecognizedFormat))
        ));

        // well-formed XML that is not a key file
        let result = DatabaseKey::new()
            .with_keyfile(&mut "<Not><A><KeyFile></KeyFile></A></Not>".as_bytes())?
            .get_key_elements();

        assert!(matches!(
            result,
            Err(DatabaseKeyError::Keyfile(KeyFileError::UnrecognizedFormat))
        ));

        Ok(())
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            DatabaseKey::new().get_key_elements(),
            Err(DatabaseKeyError::EmptyKey)
        ));
    }

    #[test]
    fn cache_password_takes_first_half() {
        assert_eq!(cache_password("abcdefg"), "abc");
        assert_eq!(cache_password("abcdefgh"), "abcd");

        // short passwords are kept whole
        assert_eq!(cache_password(""), "");
        assert_eq!(cache_password("abc"), "abc");
        assert_eq!(cache_password("abcd"), "ab");
    }
}
