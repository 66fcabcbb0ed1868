//! File-name escaping for identity components
//!
//! Bytes outside `[A-Za-z0-9_-]` are written as `%XX` (uppercase hex), so
//! any valid component maps to a portable file name and back.
//!
//! Escaping can triple a component's length. When the escaped form would not
//! fit in a file name, [`file_stem`] keeps a readable prefix and appends the
//! xxh3-128 digest of the raw component:
//!
//! ```text
//! <first 120 escaped bytes>~<32 hex digits>
//! ```
//!
//! `~` never appears in an escaped name, so [`unescape_component`] rejects
//! digest names; the store recovers the identity from the header file.

use std::fmt::Write;
use xxhash_rust::xxh3::xxh3_128;

/// Longest stem written to disk, leaving room for `.meta.tmp`
pub const MAX_FILE_STEM: usize = 200;

const DIGEST_PREFIX: usize = 120;

fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Escape a component for use as a file or directory name
pub fn escape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for &b in component.as_bytes() {
        if is_plain(b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}

/// File or directory name for a component, at most [`MAX_FILE_STEM`] bytes
pub fn file_stem(component: &str) -> String {
    let mut escaped = escape_component(component);
    if escaped.len() <= MAX_FILE_STEM {
        return escaped;
    }
    // Escaped names are ASCII, any byte offset is a char boundary.
    escaped.truncate(DIGEST_PREFIX);
    let _ = write!(escaped, "~{:032x}", xxh3_128(component.as_bytes()));
    escaped
}

/// Reverse [`escape_component`]; `None` for names it could not have produced
pub fn unescape_component(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if is_plain(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}
