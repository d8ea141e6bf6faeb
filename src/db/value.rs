use std::fmt;

use zeroize::Zeroize;

/// A string value that is kept in its on-the-wire encrypted form.
///
/// The value holds the ciphertext together with the exact keystream slice
/// that was consumed when the value was read; the plaintext is the XOR of
/// the two and is only materialized on demand. Both buffers are zeroized on
/// drop.
#[derive(Clone, Default)]
pub struct ProtectedString {
    ciphertext: Vec<u8>,
    pad: Vec<u8>,
}

impl ProtectedString {
    pub(crate) fn new(ciphertext: Vec<u8>, pad: Vec<u8>) -> Self {
        debug_assert_eq!(ciphertext.len(), pad.len());
        ProtectedString { ciphertext, pad }
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    /// Recover the plaintext bytes.
    pub fn reveal(&self) -> Vec<u8> {
        self.ciphertext
            .iter()
            .zip(&self.pad)
            .map(|(c, p)| c ^ p)
            .collect()
    }

    /// Recover the plaintext as a string, if it is valid UTF-8.
    pub fn reveal_string(&self) -> Option<String> {
        String::from_utf8(self.reveal()).ok()
    }
}

impl fmt::Debug for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedString(***)")
    }
}

impl PartialEq for ProtectedString {
    fn eq(&self, other: &Self) -> bool {
        self.reveal() == other.reveal()
    }
}

impl Eq for ProtectedString {}

impl Drop for ProtectedString {
    fn drop(&mut self) {
        self.ciphertext.zeroize();
        self.pad.zeroize();
    }
}

/// A field value of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// cleartext value
    Unprotected(String),

    /// value stored encrypted under the inner stream cipher
    Protected(ProtectedString),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Unprotected(data) => data.is_empty(),
            Value::Protected(data) => data.is_empty(),
        }
    }

    /// The cleartext form of the value, decrypting protected values on the
    /// fly. `None` for protected values that do not decrypt to UTF-8.
    pub fn to_plain(&self) -> Option<String> {
        match self {
            Value::Unprotected(data) => Some(data.clone()),
            Value::Protected(data) => data.reveal_string(),
        }
    }
}
