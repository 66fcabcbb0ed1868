//! In-process partitioned table
//!
//! Models the semantics a partitioned table service offers and nothing more:
//! rows addressed by `(partition key, row key)`, ordered row keys within a
//! partition, insert-if-absent, and replace conditioned on an ETag.
//!
//! # Design
//!
//! - DashMap over partitions with an Fx hasher: partitions never contend
//! - BTreeMap within a partition: ordered range scans by row key
//! - Global ETag counter: every write gets a fresh tag

use super::entity::{ETag, RowBody, TableRow};
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::collections::BTreeMap;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};

type Partition = BTreeMap<String, TableRow>;

/// Row operation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Insert of a row that already exists
    #[error("row {partition}/{row_key} already exists")]
    EntityExists {
        /// Partition key
        partition: String,
        /// Row key
        row_key: String,
    },

    /// Conditional replace against a stale or missing ETag
    #[error("precondition failed on row {partition}/{row_key}")]
    PreconditionFailed {
        /// Partition key
        partition: String,
        /// Row key
        row_key: String,
    },
}

/// One table: partitions of ordered rows
#[derive(Debug)]
pub struct PartitionedTable {
    partitions: DashMap<String, Partition, BuildHasherDefault<FxHasher>>,
    next_etag: AtomicU64,
}

impl Default for PartitionedTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionedTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            partitions: DashMap::with_hasher(BuildHasherDefault::default()),
            next_etag: AtomicU64::new(1),
        }
    }

    fn fresh_etag(&self) -> ETag {
        self.next_etag.fetch_add(1, Ordering::Relaxed)
    }

    /// Point read
    pub fn get(&self, partition: &str, row_key: &str) -> Option<TableRow> {
        self.partitions
            .get(partition)
            .and_then(|p| p.get(row_key).cloned())
    }

    /// Insert a row that must not exist yet
    pub fn insert(&self, partition: &str, row_key: &str, body: RowBody) -> Result<ETag, TableError> {
        let mut rows = self
            .partitions
            .entry(partition.to_string())
            .or_insert_with(Partition::new);
        if rows.contains_key(row_key) {
            return Err(TableError::EntityExists {
                partition: partition.to_string(),
                row_key: row_key.to_string(),
            });
        }
        let etag = self.fresh_etag();
        rows.insert(
            row_key.to_string(),
            TableRow {
                row_key: row_key.to_string(),
                etag,
                body,
            },
        );
        Ok(etag)
    }

    /// Replace a row whose ETag is still `if_match`
    pub fn replace(
        &self,
        partition: &str,
        row_key: &str,
        body: RowBody,
        if_match: ETag,
    ) -> Result<ETag, TableError> {
        let precondition_failed = || TableError::PreconditionFailed {
            partition: partition.to_string(),
            row_key: row_key.to_string(),
        };
        let mut rows = self
            .partitions
            .get_mut(partition)
            .ok_or_else(precondition_failed)?;
        let row = rows.get_mut(row_key).ok_or_else(precondition_failed)?;
        if row.etag != if_match {
            return Err(precondition_failed());
        }
        row.etag = self.fresh_etag();
        row.body = body;
        Ok(row.etag)
    }

    /// Insert or overwrite unconditionally
    pub fn upsert(&self, partition: &str, row_key: &str, body: RowBody) -> ETag {
        let etag = self.fresh_etag();
        let mut rows = self
            .partitions
            .entry(partition.to_string())
            .or_insert_with(Partition::new);
        rows.insert(
            row_key.to_string(),
            TableRow {
                row_key: row_key.to_string(),
                etag,
                body,
            },
        );
        etag
    }

    /// Remove one row; returns whether it existed
    pub fn delete_row(&self, partition: &str, row_key: &str) -> bool {
        self.partitions
            .get_mut(partition)
            .map(|mut rows| rows.remove(row_key).is_some())
            .unwrap_or(false)
    }

    /// Rows of `partition` with row key `>= from_row_key`, ascending
    pub fn query(&self, partition: &str, from_row_key: &str) -> Vec<TableRow> {
        self.partitions
            .get(partition)
            .map(|rows| {
                rows.range(from_row_key.to_string()..)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop a partition; returns the number of rows removed
    pub fn delete_partition(&self, partition: &str) -> usize {
        self.partitions
            .remove(partition)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0)
    }

    /// Every partition key, ascending
    pub fn partition_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.partitions.iter().map(|p| p.key().clone()).collect();
        keys.sort();
        keys
    }
}
