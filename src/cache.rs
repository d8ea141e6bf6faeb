//! The cache envelope: a JSON projection of a database wrapped in its own
//! KDBX3 container, so that list-style queries can skip the expensive key
//! transform of the primary database.

use base64::{engine::general_purpose as base64_engine, Engine as _};
use serde_json::{json, Map, Value as Json};
use thiserror::Error;

use crate::{
    crypt::calculate_sha1_hex,
    db::{projection, Database, Filter},
    error::{DatabaseOpenError, DatabaseSaveError, ProjectionError},
    format::kdbx3::{decrypt_kdbx3, dump_kdbx3, prepare_header},
    key::DatabaseKey,
};

/// Version of the cache envelope format written by this library.
pub const CACHE_FORMAT_VERSION: u64 = 1;

/// Fixed key-transform round count for cache envelopes. The envelope only
/// guards a sanitized projection, so it trades hardening for fast loads.
pub const CACHE_KDF_ROUNDS: u64 = 128;

const KEY_VERSION: &str = "version";
const KEY_TYPE: &str = "type";
const KEY_DB_FILE: &str = "dbfile";
const KEY_KEY_FILE: &str = "keyfile";
const KEY_HEADER_HASH: &str = "headerhash";
const KEY_DB: &str = "db";

const TYPE_NONE: u64 = 1;
const TYPE_KDBX: u64 = 2;

/// What kind of database an envelope wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrappedDatabaseType {
    /// no database is cached
    None,
    /// a projection of a KDBX database
    Kdbx,
}

impl WrappedDatabaseType {
    fn dump(&self) -> u64 {
        match self {
            WrappedDatabaseType::None => TYPE_NONE,
            WrappedDatabaseType::Kdbx => TYPE_KDBX,
        }
    }
}

/// Errors when reading or writing a cache envelope
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Open(#[from] DatabaseOpenError),

    #[error(transparent)]
    Save(#[from] DatabaseSaveError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Cache envelope header hash does not match its container")]
    HeaderHashMismatch,

    #[error("Unsupported cache envelope version: {}", version)]
    UnsupportedVersion { version: u64 },

    #[error("Unsupported wrapped database type: {}", db_type)]
    UnsupportedType { db_type: u64 },

    #[error("Malformed cache envelope field: {}", field)]
    MalformedField { field: &'static str },
}

/// A cache envelope: bookkeeping about the primary database plus an optional
/// projection of its contents.
#[derive(Debug)]
pub struct CacheEnvelope {
    /// Envelope format version
    pub version: u64,

    /// Whether a database projection is present
    pub db_type: WrappedDatabaseType,

    /// Lowercase hex SHA-1 of the primary database file's bytes
    pub db_file: Option<String>,

    /// Lowercase hex SHA-1 of the associated key file's bytes, if any
    pub key_file: Option<String>,

    /// SHA-256 of the envelope's own outer header; recorded during encrypt
    /// and verified on load
    pub header_hash: Option<Vec<u8>>,

    /// The projected database
    pub db: Option<Database>,
}

impl CacheEnvelope {
    /// Build an envelope around a database, addressing the primary file and
    /// key file by the digest of their raw bytes.
    pub fn wrap(db: Database, db_file: &[u8], key_file: Option<&[u8]>) -> CacheEnvelope {
        CacheEnvelope {
            version: CACHE_FORMAT_VERSION,
            db_type: WrappedDatabaseType::Kdbx,
            db_file: Some(calculate_sha1_hex(db_file)),
            key_file: key_file.map(calculate_sha1_hex),
            header_hash: None,
            db: Some(db),
        }
    }

    /// Build an envelope that records the primary file but caches nothing.
    pub fn empty(db_file: &[u8], key_file: Option<&[u8]>) -> CacheEnvelope {
        CacheEnvelope {
            version: CACHE_FORMAT_VERSION,
            db_type: WrappedDatabaseType::None,
            db_file: Some(calculate_sha1_hex(db_file)),
            key_file: key_file.map(calculate_sha1_hex),
            header_hash: None,
            db: None,
        }
    }

    /// Serialize the envelope into an encrypted KDBX3 container.
    ///
    /// The container's header is prepared first so that its digest can be
    /// recorded inside the encrypted JSON, binding payload to container.
    pub fn to_kdbx(
        &mut self,
        key: &DatabaseKey,
        filter: &dyn Filter,
    ) -> Result<Vec<u8>, CacheError> {
        let header = prepare_header(CACHE_KDF_ROUNDS)?;
        self.header_hash = Some(header.header_hash.clone());

        let payload = serde_json::to_vec(&self.to_json(filter))?;

        Ok(dump_kdbx3(&header, &payload, key)?)
    }

    /// Load an envelope from an encrypted KDBX3 container, verifying that
    /// the recorded header hash matches the container it came in.
    pub fn from_kdbx(data: &[u8], key: &DatabaseKey) -> Result<CacheEnvelope, CacheError> {
        let payload = decrypt_kdbx3(data, key)?;

        let json: Json = serde_json::from_slice(&payload.data)?;
        let obj = json
            .as_object()
            .ok_or(CacheError::MalformedField { field: "envelope" })?;

        let version = obj
            .get(KEY_VERSION)
            .and_then(Json::as_u64)
            .ok_or(CacheError::MalformedField { field: KEY_VERSION })?;
        if version > CACHE_FORMAT_VERSION {
            return Err(CacheError::UnsupportedVersion { version });
        }

        let db_type = match obj.get(KEY_TYPE).and_then(Json::as_u64) {
            Some(TYPE_NONE) => WrappedDatabaseType::None,
            Some(TYPE_KDBX) => WrappedDatabaseType::Kdbx,
            Some(db_type) => return Err(CacheError::UnsupportedType { db_type }),
            None => return Err(CacheError::MalformedField { field: KEY_TYPE }),
        };

        let db_file = obj
            .get(KEY_DB_FILE)
            .and_then(Json::as_str)
            .map(str::to_string);
        let key_file = obj
            .get(KEY_KEY_FILE)
            .and_then(Json::as_str)
            .map(str::to_string);

        let header_hash = match obj.get(KEY_HEADER_HASH).and_then(Json::as_str) {
            Some(encoded) => Some(
                base64_engine::STANDARD
                    .decode(encoded)
                    .map_err(|_| CacheError::MalformedField {
                        field: KEY_HEADER_HASH,
                    })?,
            ),
            None => None,
        };

        // the envelope must have been produced for exactly this container
        if header_hash.as_deref() != Some(payload.header_hash.as_slice()) {
            return Err(CacheError::HeaderHashMismatch);
        }

        let db = match db_type {
            WrappedDatabaseType::None => None,
            WrappedDatabaseType::Kdbx => {
                let value = obj
                    .get(KEY_DB)
                    .filter(|v| !v.is_null())
                    .ok_or(CacheError::MalformedField { field: KEY_DB })?;
                Some(projection::load_database(value)?)
            }
        };

        Ok(CacheEnvelope {
            version,
            db_type,
            db_file,
            key_file,
            header_hash,
            db,
        })
    }

    fn to_json(&self, filter: &dyn Filter) -> Json {
        let mut map = Map::new();

        map.insert(KEY_VERSION.to_string(), json!(self.version));
        map.insert(KEY_TYPE.to_string(), json!(self.db_type.dump()));
        map.insert(KEY_DB_FILE.to_string(), json!(self.db_file));
        map.insert(KEY_KEY_FILE.to_string(), json!(self.key_file));
        map.insert(
            KEY_HEADER_HASH.to_string(),
            match &self.header_hash {
                Some(hash) => json!(base64_engine::STANDARD.encode(hash)),
                None => Json::Null,
            },
        );
        map.insert(
            KEY_DB.to_string(),
            match &self.db {
                Some(db) => projection::dump_database(db, filter),
                None => Json::Null,
            },
        );

        Json::Object(map)
    }
}
