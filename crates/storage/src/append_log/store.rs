//! Append-log store
//!
//! One growing log ("blob") per stream plus a header holding the sequence
//! counter.
//!
//! ## Append order
//!
//! ```text
//! 1. acquire lease on identity
//! 2. read header → last_sequence_number
//! 3. validate existence constraint + expected top → next_sequence
//! 4. verify lease id, re-check existence, append block   (write point)
//! 5. advance header to next_sequence                      (counter point)
//! 6. release lease
//! ```
//!
//! The counter only moves after the block is written. A crash between 4 and
//! 5 leaves a header behind its log; recovery raises it to the highest block,
//! so no sequence number is handed out twice.
//!
//! Every stream on disk is recovered while the store opens. A stream whose
//! log cannot be decoded stays unreadable: reads fail as corrupt, appends are
//! rejected, and only deletion is allowed.
//!
//! # Thread Safety
//!
//! Streams live in a `DashMap`, so distinct identities only share a shard
//! lock, never a stream lock. File I/O for a stream runs under its lease
//! alone; the shard guard is held only to copy state in or out. Reads clone
//! the events under the shard read guard and never touch the lease.

use super::persist::LogFiles;
use crate::durability::DurabilityMode;
use crate::error::{io_fault, lease_fault, StorageError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use factlog_concurrency::{validate_append, validate_existence, LeaseConfig, LeaseManager};
use factlog_core::{
    AppendOptions, AppendResult, EntityType, EventRecord, ExistenceConstraint, PendingEvent,
    PersistedEvent, ReadFault, ReadFaultKind, StreamBackend, StreamHeader, StreamIdentity,
    WriteContext, WriteFault,
};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Backend name used in configuration
pub const APPEND_LOG_BACKEND: &str = "append-log";

#[derive(Debug, Clone)]
struct Blob {
    header: StreamHeader,
    events: Vec<EventRecord>,
    /// Valid length of the log file
    log_len: u64,
}

impl Blob {
    fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            header: StreamHeader::new(created_at),
            events: Vec::new(),
            log_len: 0,
        }
    }
}

/// Stream backend storing each stream as a log of framed blocks
#[derive(Debug)]
pub struct AppendLogStore {
    blobs: DashMap<StreamIdentity, Blob>,
    /// Streams found on disk that failed recovery
    unreadable: DashMap<StreamIdentity, (ReadFaultKind, String)>,
    leases: LeaseManager,
    files: Option<LogFiles>,
}

fn block_rejected(identity: &StreamIdentity, sequence: u64, err: io::Error) -> WriteFault {
    tracing::warn!(identity = %identity, sequence, error = %err, "block append rejected");
    io_fault(identity, sequence, err)
}

impl AppendLogStore {
    /// Memory-only store
    pub fn new(lease: LeaseConfig) -> Self {
        Self {
            blobs: DashMap::new(),
            unreadable: DashMap::new(),
            leases: LeaseManager::new(lease),
            files: None,
        }
    }

    /// Store under `root` with the given durability
    ///
    /// `DurabilityMode::None` ignores `root` and keeps everything in memory.
    /// Otherwise every stream under `root` is recovered before this returns.
    pub fn open(
        root: Option<&Path>,
        mode: DurabilityMode,
        lease: LeaseConfig,
    ) -> Result<Self, StorageError> {
        if !mode.requires_files() {
            return Ok(Self::new(lease));
        }
        let root = root.ok_or(StorageError::MissingPath { mode })?;
        let files = LogFiles::open(root, mode)?;

        let mut store = Self::new(lease);
        for (identity, recovered) in files.recover()? {
            match recovered {
                Ok(stream) => {
                    tracing::debug!(
                        identity = %identity,
                        events = stream.events.len(),
                        last_sequence = stream.header.last_sequence_number,
                        "stream recovered from disk"
                    );
                    store.blobs.insert(
                        identity,
                        Blob {
                            header: stream.header,
                            events: stream.events,
                            log_len: stream.log_len,
                        },
                    );
                }
                Err(fault) => {
                    tracing::error!(identity = %identity, error = %fault, "stream left unreadable");
                    store.unreadable.insert(identity, (fault.kind, fault.message));
                }
            }
        }
        tracing::info!(
            root = %root.display(),
            mode = mode.description(),
            streams = store.blobs.len(),
            unreadable = store.unreadable.len(),
            "append-log store opened"
        );
        store.files = Some(files);
        Ok(store)
    }

    /// Root directory, when file-backed
    pub fn root(&self) -> Option<PathBuf> {
        self.files.as_ref().map(|f| f.root().to_path_buf())
    }

    /// Lease manager guarding appends
    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    fn check_readable(&self, identity: &StreamIdentity) -> Result<(), ReadFault> {
        match self.unreadable.get(identity) {
            Some(entry) => {
                let (kind, message) = entry.value();
                Err(ReadFault::new(identity.clone(), *kind, message.clone()))
            }
            None => Ok(()),
        }
    }

    /// Write the block under the caller's lease, then advance the counter
    fn write_block(
        &self,
        identity: &StreamIdentity,
        lease_id: Uuid,
        constraint: ExistenceConstraint,
        record: EventRecord,
    ) -> Result<(), WriteFault> {
        let sequence = record.sequence_number;
        let payload = PersistedEvent::from_record(&record)
            .to_bytes()
            .map_err(|e| WriteFault::serialization(identity.clone(), sequence, e))?;

        self.leases
            .verify(identity, lease_id)
            .map_err(|e| lease_fault(identity, sequence, e))?;

        // Under the lease nobody else changes this entry, so a copy stays
        // current while the files are written.
        let (mut header, log_len, is_new) = match self.blobs.get(identity) {
            Some(blob) => (blob.header.clone(), blob.log_len, false),
            None => (StreamHeader::new(record.write_timestamp), 0, true),
        };
        validate_existence(identity, constraint, header.last_sequence_number)?;

        let mut new_len = log_len;
        if let Some(files) = &self.files {
            if is_new {
                files
                    .create(identity, &header)
                    .map_err(|e| block_rejected(identity, sequence, e))?;
            }
            new_len = files
                .append_block(identity, &payload, log_len)
                .map_err(|e| block_rejected(identity, sequence, e))?;
        }

        header.last_sequence_number = sequence;
        {
            let mut blob = self
                .blobs
                .entry(identity.clone())
                .or_insert_with(|| Blob::new(header.created_at));
            blob.events.push(record);
            blob.header.last_sequence_number = sequence;
            blob.log_len = new_len;
        }

        // The block is written; the counter has moved even if the header file
        // cannot be rewritten, recovery reconciles it from the log.
        if let Some(files) = &self.files {
            if let Err(e) = files.write_header(identity, &header) {
                tracing::warn!(identity = %identity, sequence, error = %e, "header write failed after block append");
            }
        }
        Ok(())
    }
}

impl StreamBackend for AppendLogStore {
    fn name(&self) -> &'static str {
        APPEND_LOG_BACKEND
    }

    fn read_header(&self, identity: &StreamIdentity) -> Result<Option<StreamHeader>, ReadFault> {
        self.check_readable(identity)?;
        Ok(self.blobs.get(identity).map(|b| b.header.clone()))
    }

    fn read_events(
        &self,
        identity: &StreamIdentity,
        from_sequence: u64,
    ) -> Result<Vec<EventRecord>, ReadFault> {
        self.check_readable(identity)?;
        let Some(blob) = self.blobs.get(identity) else {
            return Ok(Vec::new());
        };
        Ok(blob
            .events
            .iter()
            .filter(|e| e.sequence_number >= from_sequence)
            .cloned()
            .collect())
    }

    fn append(
        &self,
        identity: &StreamIdentity,
        mut pending: PendingEvent,
        context: &WriteContext,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault> {
        let lease = self
            .leases
            .acquire(identity)
            .map_err(|e| lease_fault(identity, 0, e))?;

        self.check_readable(identity).map_err(|e| {
            WriteFault::storage_rejected(identity.clone(), 0, "stream could not be recovered")
                .with_source(e)
        })?;
        let last = self
            .blobs
            .get(identity)
            .map(|b| b.header.last_sequence_number)
            .unwrap_or(0);
        let next = validate_append(identity, last, &options)?;

        if let Some(version) = options.version_number {
            pending.version_number = version;
        }
        let record = pending.into_record(next, Utc::now(), context.clone());
        let event_type = record.event_type_name.clone();
        self.write_block(identity, lease.lease_id(), options.existence_constraint, record)?;
        drop(lease);

        if next == 1 {
            tracing::info!(identity = %identity, "stream created");
        }
        tracing::debug!(identity = %identity, sequence = next, event_type = %event_type, "event appended");
        Ok(AppendResult::for_sequence(next))
    }

    fn delete_stream(&self, identity: &StreamIdentity) -> Result<(), WriteFault> {
        let _lease = self
            .leases
            .acquire(identity)
            .map_err(|e| lease_fault(identity, 0, e))?;

        if self.unreadable.contains_key(identity) {
            if let Some(files) = &self.files {
                files.remove(identity).map_err(|e| io_fault(identity, 0, e))?;
            }
            self.unreadable.remove(identity);
            tracing::info!(identity = %identity, "unreadable stream deleted");
            return Ok(());
        }

        let Some(header) = self.blobs.get(identity).map(|b| b.header.clone()) else {
            tracing::debug!(identity = %identity, "delete of missing stream ignored");
            return Ok(());
        };
        let last = header.last_sequence_number;

        // Memory changes only once the files are gone.
        if let Some(files) = &self.files {
            files
                .delete(identity, &header)
                .map_err(|e| io_fault(identity, last, e))?;
        }
        self.blobs.remove(identity);
        tracing::info!(identity = %identity, last_sequence = last, "stream deleted");
        Ok(())
    }

    fn write_index(&self, identity: &StreamIdentity) -> Result<(), WriteFault> {
        // Listing walks the blobs directly; there is no separate index.
        tracing::trace!(identity = %identity, "write_index is a no-op for the append-log store");
        Ok(())
    }

    fn instance_keys(
        &self,
        entity_type: &EntityType,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault> {
        let keys: BTreeSet<String> = self
            .blobs
            .iter()
            .filter(|entry| {
                let id = entry.key();
                id.domain_name() == entity_type.domain_name()
                    && id.entity_type_name() == entity_type.entity_type_name()
            })
            .filter(|entry| {
                let header = &entry.value().header;
                header.is_live() && as_of.map_or(true, |cutoff| header.created_at <= cutoff)
            })
            .map(|entry| entry.key().instance_key().to_string())
            .collect();
        Ok(keys.into_iter().collect())
    }
}
