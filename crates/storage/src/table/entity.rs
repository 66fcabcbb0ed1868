//! Row shapes of the partitioned-table store
//!
//! | Partition | Row key | Body |
//! |-----------|---------|------|
//! | instance key | `!header` | [`StreamHeader`] |
//! | instance key | sequence, zero-padded to 20 digits | persisted event JSON |
//! | `!index` | instance key | [`IndexCard`] |
//!
//! `!` sorts before every digit, so a partition scan returns the header row
//! first and the event rows in numeric order.

use chrono::{DateTime, Utc};
use factlog_core::StreamHeader;
use serde::{Deserialize, Serialize};

/// Row key of a stream's header row
pub const HEADER_ROW_KEY: &str = "!header";

/// Partition holding the entity type's index card
pub const INDEX_PARTITION: &str = "!index";

/// Row key of the event with `sequence`
pub fn event_row_key(sequence: u64) -> String {
    format!("{:020}", sequence)
}

/// Sequence number of an event row key
pub fn parse_event_row_key(row_key: &str) -> Option<u64> {
    if row_key.len() != 20 {
        return None;
    }
    row_key.parse().ok()
}

/// Optimistic concurrency tag of a row, changed on every write
pub type ETag = u64;

/// One entry of an entity type's index card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCard {
    /// Indexed instance key
    pub instance_key: String,
    /// Creation time of the stream
    pub created_at: DateTime<Utc>,
}

/// Body of a table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowBody {
    /// Stream header
    Header(StreamHeader),
    /// Serialized `PersistedEvent`
    Event(String),
    /// Index card entry
    Index(IndexCard),
}

/// A stored row with its ETag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Row key within the partition
    pub row_key: String,
    /// Current ETag
    pub etag: ETag,
    /// Row contents
    pub body: RowBody,
}
