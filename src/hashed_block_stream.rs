//! The SHA-256-authenticated block framing wrapped around a KDBX3 payload.
//!
//! Each record is `(block_index: u32, block_hash: [u8; 32], block_size: u32,
//! block_data: [u8; block_size])` with little-endian integers; a record with
//! `block_size == 0` terminates the stream.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::crypt::calculate_sha256;

/// Block size used when writing out a stream.
const BLOCK_SIZE: usize = 1024 * 1024;

/// Errors in the block framing of a payload
#[derive(Debug, Error)]
pub enum BlockStreamError {
    #[error("Block stream truncated in block {}", block_index)]
    Truncated { block_index: u32 },

    #[error("Block index mismatch: expected {}, got {}", expected, actual)]
    IndexMismatch { expected: u32, actual: u32 },

    #[error("Block hash mismatch for block {}", block_index)]
    HashMismatch { block_index: u32 },
}

/// How to react to an integrity failure while reading a block stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Stop at the first corrupted block. The default.
    Strict,
    /// Keep reading past corrupted blocks and report the corruption to the
    /// caller. For diagnostics only.
    Permissive,
}

/// Read a hashed block stream into a raw buffer.
///
/// Returns the concatenated block payloads and whether any block failed
/// verification (always `false` in strict mode, which errors out instead).
pub(crate) fn read_hashed_block_stream(
    data: &[u8],
    mode: IntegrityMode,
) -> Result<(Vec<u8>, bool), BlockStreamError> {
    let mut out = Vec::new();
    let mut corrupted = false;

    let mut pos = 0;
    let mut expected_index: u32 = 0;

    loop {
        if data.len() < pos + 40 {
            return Err(BlockStreamError::Truncated {
                block_index: expected_index,
            });
        }

        let block_index = LittleEndian::read_u32(&data[pos..(pos + 4)]);
        let block_hash = &data[(pos + 4)..(pos + 36)];
        let block_size = LittleEndian::read_u32(&data[(pos + 36)..(pos + 40)]) as usize;

        // a zero-sized block means we have reached the end of the stream
        if block_size == 0 {
            break;
        }

        if data.len() < pos + 40 + block_size {
            return Err(BlockStreamError::Truncated {
                block_index: expected_index,
            });
        }

        let block = &data[(pos + 40)..(pos + 40 + block_size)];

        if block_index != expected_index {
            if mode == IntegrityMode::Strict {
                return Err(BlockStreamError::IndexMismatch {
                    expected: expected_index,
                    actual: block_index,
                });
            }
            corrupted = true;
        }

        let block_hash_check = calculate_sha256(&[block]);
        if block_hash != block_hash_check.as_slice() {
            if mode == IntegrityMode::Strict {
                return Err(BlockStreamError::HashMismatch {
                    block_index: expected_index,
                });
            }
            corrupted = true;
        }

        out.extend_from_slice(block);

        pos += 40 + block_size;
        expected_index += 1;
    }

    Ok((out, corrupted))
}

/// Write a raw buffer as a hashed block stream, including the terminating
/// zero-sized block.
pub(crate) fn write_hashed_block_stream(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 48);

    let mut block_index: u32 = 0;

    for block in data.chunks(BLOCK_SIZE) {
        write_block_record(&mut out, block_index, block);
        block_index += 1;
    }

    // terminator: index, all-zero hash, zero size
    let pos = out.len();
    out.resize(pos + 40, 0);
    LittleEndian::write_u32(&mut out[pos..(pos + 4)], block_index);

    out
}

fn write_block_record(out: &mut Vec<u8>, block_index: u32, block: &[u8]) {
    let pos = out.len();
    out.resize(pos + 4, 0);
    LittleEndian::write_u32(&mut out[pos..(pos + 4)], block_index);

    out.extend_from_slice(&calculate_sha256(&[block]));

    let pos = out.len();
    out.resize(pos + 4, 0);
    LittleEndian::write_u32(&mut out[pos..(pos + 4)], block.len() as u32);

    out.extend_from_slice(block);
}
