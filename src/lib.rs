//! kpdb: a read-only KeePass .kdbx (version 3) database parser with
//! encrypted list caches.
//!
//! Primary databases are opened with [`Database::open`] and a
//! [`DatabaseKey`] built from a password and/or a key file. A sanitized
//! projection of an opened database can be wrapped into a
//! [`CacheEnvelope`], a second encrypted container with a cheap key
//! transform, so that list-style queries do not have to pay for the primary
//! database's key derivation again.
//!
//! ```
//! use kpdb::{CacheEnvelope, Database, DatabaseKey, DefaultFilter, Entry, Group, Value};
//!
//! // build a database by hand; normally this comes from Database::open
//! let mut entry = Entry::default();
//! entry.uuid = "bG9naW4tZW50cnk=".to_string();
//! entry.fields.insert(
//!     "Title".to_string(),
//!     Value::Unprotected("example.com".to_string()),
//! );
//! entry.password = Some(Value::Unprotected("secret".to_string()));
//!
//! let mut group = Group::new("Root");
//! group.entries.push(entry);
//!
//! let mut db = Database::default();
//! db.name = Some("Passwords".to_string());
//! db.groups.push(group);
//!
//! // wrap it into an encrypted cache envelope and load it back
//! let key = DatabaseKey::new().with_password("cache-pass");
//! let mut envelope = CacheEnvelope::wrap(db, b"primary database bytes", None);
//! let bytes = envelope.to_kdbx(&key, &DefaultFilter).unwrap();
//!
//! let reloaded = CacheEnvelope::from_kdbx(&bytes, &key).unwrap();
//! let cached = reloaded.db.unwrap();
//!
//! // passwords are projected away, everything else is preserved
//! assert_eq!(cached.get_password("bG9naW4tZW50cnk="), None);
//! assert_eq!(
//!     cached.find_entry("bG9naW4tZW50cnk=").unwrap().get_title().as_deref(),
//!     Some("example.com"),
//! );
//! ```

pub mod cache;
pub(crate) mod compression;
pub mod config;
pub(crate) mod crypt;
pub mod db;
pub mod error;
pub mod format;
pub(crate) mod hashed_block_stream;
pub mod key;
pub mod xml_db;

pub use crate::{
    cache::{CacheEnvelope, WrappedDatabaseType},
    db::{Database, DefaultFilter, Entry, Filter, Group, ProtectedString, Value},
    format::kdbx3::DecryptedPayload,
    hashed_block_stream::IntegrityMode,
    key::{cache_password, DatabaseKey},
};
