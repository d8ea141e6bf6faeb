//! Types for representing data contained in a KeePass database

pub(crate) mod entry;
pub(crate) mod group;
pub mod projection;
pub(crate) mod value;

use std::collections::HashMap;

pub use crate::db::{
    entry::Entry,
    group::Group,
    projection::{DefaultFilter, Filter},
    value::{ProtectedString, Value},
};

use crate::{
    error::DatabaseOpenError,
    format::kdbx3::{decrypt_kdbx3, parse_kdbx3},
    key::DatabaseKey,
};

/// A decrypted KeePass database
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Database {
    /// Name of the database, as recorded in its metadata
    pub name: Option<String>,

    /// Custom icon UUID (base64) to raw PNG data
    pub custom_icons: HashMap<String, Vec<u8>>,

    /// The top-level groups of the database
    pub groups: Vec<Group>,

    /// SHA-256 of the outer header as recorded inside the payload, verified
    /// against the actual header during opening
    pub header_hash: Option<Vec<u8>>,
}

impl Database {
    /// Parse a database from a std::io::Read
    pub fn open(
        source: &mut dyn std::io::Read,
        key: &DatabaseKey,
    ) -> Result<Database, DatabaseOpenError> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        parse_kdbx3(data.as_ref(), key)
    }

    /// Decrypt a database into its inner XML document without parsing it
    pub fn get_xml(
        source: &mut dyn std::io::Read,
        key: &DatabaseKey,
    ) -> Result<Vec<u8>, DatabaseOpenError> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        Ok(decrypt_kdbx3(data.as_ref(), key)?.data)
    }

    /// Depth-first search for an entry by its base64 UUID.
    pub fn find_entry(&self, uuid: &str) -> Option<&Entry> {
        self.groups.iter().find_map(|g| g.find_entry(uuid))
    }

    /// The decoded password of the first entry with the given base64 UUID.
    pub fn get_password(&self, uuid: &str) -> Option<String> {
        self.find_entry(uuid).and_then(Entry::get_password)
    }
}
