//! On-disk byte formats for the append-log store.
//!
//! Keeping framing separate from store logic keeps format evolution in one
//! place.
//!
//! # Module Structure
//!
//! - `block`: length + crc32 framed event blocks
//! - `path`: escaping of identity components into file names

pub mod block;
pub mod path;

pub use block::{
    encode_block, scan_blocks, BlockError, BlockScan, TornTail, BLOCK_HEADER_SIZE,
    MAX_BLOCK_PAYLOAD,
};
pub use path::{escape_component, file_stem, unescape_component, MAX_FILE_STEM};
