//! Append-log block framing
//!
//! Every appended event is one block:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┐
//! │ len: u32 LE  │ crc32: u32 LE│ payload (len bytes) │
//! └──────────────┴──────────────┴─────────────────────┘
//! ```
//!
//! The checksum covers the payload only. The payload is a JSON-encoded
//! `PersistedEvent`.
//!
//! ## Recovery
//!
//! A crash mid-append can leave a partial block at the end of a log. Scanning
//! stops at the first bad frame and reports where the valid prefix ends:
//!
//! - A frame that runs past the end of the buffer is a torn tail.
//! - A complete frame with a bad checksum that ends exactly at the end of the
//!   buffer is a torn tail.
//! - A bad frame with further bytes after it is mid-log corruption and is
//!   returned as an error: dropping it would silently lose later events.

use byteorder::{ByteOrder, LittleEndian};

/// Size of the frame header (length + checksum)
pub const BLOCK_HEADER_SIZE: usize = 8;

/// Largest accepted payload (16 MiB)
pub const MAX_BLOCK_PAYLOAD: usize = 16 * 1024 * 1024;

/// Block framing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// Payload exceeds [`MAX_BLOCK_PAYLOAD`]
    #[error("block payload too large: {len} bytes")]
    TooLarge {
        /// Payload length
        len: usize,
    },

    /// Checksum mismatch on a frame followed by more data
    #[error("corrupt block at offset {offset}: checksum {actual:#010x}, expected {expected:#010x}")]
    Corrupt {
        /// Byte offset of the frame
        offset: u64,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },
}

/// Frame a payload into a block
///
/// The whole frame is built in one buffer so callers can write it with a
/// single call and roll back to the previous length on failure.
pub fn encode_block(payload: &[u8]) -> Result<Vec<u8>, BlockError> {
    if payload.len() > MAX_BLOCK_PAYLOAD {
        return Err(BlockError::TooLarge { len: payload.len() });
    }
    let mut buf = Vec::with_capacity(BLOCK_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&[0u8; BLOCK_HEADER_SIZE]);
    LittleEndian::write_u32(&mut buf[0..4], payload.len() as u32);
    LittleEndian::write_u32(&mut buf[4..8], crc32fast::hash(payload));
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Why a scan stopped before the end of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TornTail {
    /// Fewer bytes than a frame header
    PartialHeader,
    /// Header present, payload cut short
    PartialPayload,
    /// Last frame is complete but its checksum does not match
    ChecksumMismatch,
}

/// Result of scanning a log buffer
#[derive(Debug, Default)]
pub struct BlockScan<'a> {
    /// Payloads of every valid block, in order
    pub payloads: Vec<&'a [u8]>,
    /// Length of the valid prefix in bytes
    pub valid_len: u64,
    /// Set when the buffer ends in a torn block
    pub torn_tail: Option<TornTail>,
}

/// Split a log buffer into block payloads
pub fn scan_blocks(bytes: &[u8]) -> Result<BlockScan<'_>, BlockError> {
    let mut scan = BlockScan::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = &bytes[offset..];
        if remaining.len() < BLOCK_HEADER_SIZE {
            scan.torn_tail = Some(TornTail::PartialHeader);
            break;
        }

        let len = LittleEndian::read_u32(&remaining[0..4]) as usize;
        let expected = LittleEndian::read_u32(&remaining[4..8]);
        let frame_end = BLOCK_HEADER_SIZE.saturating_add(len);
        if frame_end > remaining.len() {
            scan.torn_tail = Some(TornTail::PartialPayload);
            break;
        }

        let payload = &remaining[BLOCK_HEADER_SIZE..frame_end];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            if frame_end == remaining.len() {
                scan.torn_tail = Some(TornTail::ChecksumMismatch);
                break;
            }
            return Err(BlockError::Corrupt {
                offset: offset as u64,
                expected,
                actual,
            });
        }

        scan.payloads.push(payload);
        offset += frame_end;
        scan.valid_len = offset as u64;
    }

    Ok(scan)
}
