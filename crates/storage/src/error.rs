//! Store open errors and fault conversions

use crate::durability::DurabilityMode;
use factlog_concurrency::LeaseError;
use factlog_core::{StreamIdentity, WriteFault};
use std::io;
use std::path::PathBuf;

/// Failure to open a store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A file-backed mode was requested without a directory
    #[error("durability mode {mode:?} requires a storage path")]
    MissingPath {
        /// Requested mode
        mode: DurabilityMode,
    },

    /// The storage directory could not be prepared
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

pub(crate) fn lease_fault(identity: &StreamIdentity, sequence: u64, err: LeaseError) -> WriteFault {
    WriteFault::lease_conflict(identity.clone(), sequence, err.to_string()).with_source(err)
}

pub(crate) fn io_fault(identity: &StreamIdentity, sequence: u64, err: io::Error) -> WriteFault {
    WriteFault::storage_rejected(identity.clone(), sequence, err.to_string()).with_source(err)
}
