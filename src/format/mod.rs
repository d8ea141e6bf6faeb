pub mod kdbx3;

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::DatabaseIntegrityError;

const KDBX_IDENTIFIER: [u8; 4] = [0x03, 0xd9, 0xa2, 0x9a];

/// Identifier for the KeePass 2 formats.
pub const KEEPASS_LATEST_ID: u32 = 0xb54bfb67;

pub const KDBX3_MAJOR_VERSION: u16 = 3;
pub const KDBX3_CURRENT_MINOR_VERSION: u16 = 1;

/// The file format version of a KDBX database.
///
/// Only major versions up to 3 can be read by this library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseVersion {
    pub file_major_version: u16,
    pub file_minor_version: u16,
}

impl DatabaseVersion {
    pub fn parse(data: &[u8]) -> Result<DatabaseVersion, DatabaseIntegrityError> {
        if data.len() < DatabaseVersion::get_version_header_size() {
            return Err(DatabaseIntegrityError::InvalidKDBXIdentifier);
        }

        if data[0..4] != KDBX_IDENTIFIER {
            return Err(DatabaseIntegrityError::InvalidKDBXIdentifier);
        }

        let version = LittleEndian::read_u32(&data[4..8]);
        let file_minor_version = LittleEndian::read_u16(&data[8..10]);
        let file_major_version = LittleEndian::read_u16(&data[10..12]);

        if version != KEEPASS_LATEST_ID || file_major_version > KDBX3_MAJOR_VERSION {
            return Err(DatabaseIntegrityError::InvalidKDBXVersion {
                version,
                file_major_version: file_major_version as u32,
                file_minor_version: file_minor_version as u32,
            });
        }

        Ok(DatabaseVersion {
            file_major_version,
            file_minor_version,
        })
    }

    pub(crate) fn dump(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&KDBX_IDENTIFIER);

        let pos = data.len();
        data.resize(pos + 8, 0);
        LittleEndian::write_u32(&mut data[pos..(pos + 4)], KEEPASS_LATEST_ID);
        LittleEndian::write_u16(&mut data[(pos + 4)..(pos + 6)], self.file_minor_version);
        LittleEndian::write_u16(&mut data[(pos + 6)..(pos + 8)], self.file_major_version);
    }

    pub(crate) fn get_version_header_size() -> usize {
        12
    }
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KDBX{}.{}",
            self.file_major_version, self.file_minor_version
        )
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn version_header_roundtrip() {
        let version = DatabaseVersion {
            file_major_version: KDBX3_MAJOR_VERSION,
            file_minor_version: KDBX3_CURRENT_MINOR_VERSION,
        };

        let mut data = Vec::new();
        version.dump(&mut data);
        assert_eq!(data.len(), DatabaseVersion::get_version_header_size());

        assert_eq!(DatabaseVersion::parse(&data).unwrap(), version);
    }

    #[test]
    fn bad_identifier_is_rejected() {
        let data = [0u8; 12];
        assert!(matches!(
            DatabaseVersion::parse(&data),
            Err(DatabaseIntegrityError::InvalidKDBXIdentifier)
        ));
    }

    #[test]
    fn unknown_major_version_is_rejected() {
        let version = DatabaseVersion {
            file_major_version: 4,
            file_minor_version: 0,
        };

        let mut data = Vec::new();
        version.dump(&mut data);

        assert!(matches!(
            DatabaseVersion::parse(&data),
            Err(DatabaseIntegrityError::InvalidKDBXVersion {
                file_major_version: 4,
                ..
            })
        ));
    }
}
