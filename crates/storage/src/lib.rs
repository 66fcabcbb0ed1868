//! Storage backends for factlog
//!
//! Two interchangeable [`StreamBackend`](factlog_core::StreamBackend)
//! implementations with identical observable semantics:
//! - [`AppendLogStore`]: one growing log of framed blocks per stream, with
//!   optional file persistence governed by [`DurabilityMode`]
//! - [`TableStore`]: one row per event in a partitioned table, header row
//!   updated by ETag compare-and-swap, optional index card
//!
//! Both write the same `PersistedEvent` JSON shape.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod append_log;
pub mod durability;
pub mod error;
pub mod format;
pub mod table;

pub use append_log::{AppendLogStore, APPEND_LOG_BACKEND};
pub use durability::DurabilityMode;
pub use error::StorageError;
pub use table::{PartitionedTable, TableError, TableStore, TABLE_BACKEND};
