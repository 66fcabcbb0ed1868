//! Partitioned-table backend
//!
//! - `entity`: row keys and row bodies
//! - `partition`: the in-process table (insert-if-absent, ETag replace, range scan)
//! - `store`: the [`TableStore`] stream backend

pub mod entity;
pub mod partition;
pub mod store;

pub use entity::{event_row_key, IndexCard, RowBody, TableRow, HEADER_ROW_KEY, INDEX_PARTITION};
pub use partition::{PartitionedTable, TableError};
pub use store::{TableStore, TABLE_BACKEND};
