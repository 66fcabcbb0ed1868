//! Partitioned-table store
//!
//! One table per `(domain, entity type)`, one partition per instance key,
//! one row per event, plus a header row and an index card partition. See
//! [`super::entity`] for the row layout.
//!
//! ## Append order
//!
//! ```text
//! 1. acquire lease on identity
//! 2. read header row + ETag → last_sequence_number
//! 3. validate existence constraint + expected top → next_sequence
//! 4. CAS header to next_sequence (insert-if-absent, or replace if ETag matches)
//! 5. insert event row at next_sequence (fails if the row exists)
//! 6. release lease
//! ```
//!
//! The header moves before the event row is written, so a writer that loses
//! the CAS never reserves a sequence it will not fill. A failure at step 5
//! leaves a gap at `next_sequence`; the sequence is never reused.

use super::entity::{
    event_row_key, parse_event_row_key, ETag, IndexCard, RowBody, HEADER_ROW_KEY, INDEX_PARTITION,
};
use super::partition::PartitionedTable;
use crate::error::lease_fault;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use factlog_concurrency::{validate_append, LeaseConfig, LeaseManager};
use factlog_core::{
    AppendOptions, AppendResult, EntityType, EventRecord, PendingEvent, PersistedEvent, ReadFault,
    StreamBackend, StreamHeader, StreamIdentity, WriteContext, WriteFault, WriteFaultKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Backend name used in configuration
pub const TABLE_BACKEND: &str = "table";

/// Stream backend storing one row per event in a partitioned table
#[derive(Debug)]
pub struct TableStore {
    tables: DashMap<EntityType, Arc<PartitionedTable>>,
    leases: LeaseManager,
}

impl TableStore {
    /// Create an empty store
    pub fn new(lease: LeaseConfig) -> Self {
        Self {
            tables: DashMap::new(),
            leases: LeaseManager::new(lease),
        }
    }

    /// Table of an entity type, created on first use
    pub fn table(&self, entity_type: &EntityType) -> Arc<PartitionedTable> {
        if let Some(table) = self.tables.get(entity_type) {
            return Arc::clone(table.value());
        }
        let table = self
            .tables
            .entry(entity_type.clone())
            .or_insert_with(|| Arc::new(PartitionedTable::new()));
        Arc::clone(table.value())
    }

    fn existing_table(&self, entity_type: &EntityType) -> Option<Arc<PartitionedTable>> {
        self.tables.get(entity_type).map(|t| Arc::clone(t.value()))
    }

    /// Lease manager guarding appends
    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    fn header_row(
        table: &PartitionedTable,
        identity: &StreamIdentity,
    ) -> Result<Option<(StreamHeader, ETag)>, ReadFault> {
        match table.get(identity.instance_key(), HEADER_ROW_KEY) {
            None => Ok(None),
            Some(row) => match row.body {
                RowBody::Header(header) => Ok(Some((header, row.etag))),
                _ => {
                    tracing::error!(identity = %identity, "header row holds a non-header body");
                    Err(ReadFault::corrupt(identity.clone(), "header row holds a non-header body"))
                }
            },
        }
    }

    fn reject_reserved(identity: &StreamIdentity) -> Result<(), WriteFault> {
        if identity.instance_key() == INDEX_PARTITION {
            return Err(WriteFault::storage_rejected(
                identity.clone(),
                0,
                format!("instance key {} is reserved", INDEX_PARTITION),
            ));
        }
        Ok(())
    }
}

impl StreamBackend for TableStore {
    fn name(&self) -> &'static str {
        TABLE_BACKEND
    }

    fn read_header(&self, identity: &StreamIdentity) -> Result<Option<StreamHeader>, ReadFault> {
        let Some(table) = self.existing_table(&identity.entity_type()) else {
            return Ok(None);
        };
        Ok(Self::header_row(&table, identity)?.map(|(header, _)| header))
    }

    fn read_events(
        &self,
        identity: &StreamIdentity,
        from_sequence: u64,
    ) -> Result<Vec<EventRecord>, ReadFault> {
        let Some(table) = self.existing_table(&identity.entity_type()) else {
            return Ok(Vec::new());
        };
        if matches!(Self::header_row(&table, identity)?, Some((h, _)) if h.deleting) {
            return Ok(Vec::new());
        }

        let rows = table.query(identity.instance_key(), &event_row_key(from_sequence));
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let sequence = parse_event_row_key(&row.row_key);
            let RowBody::Event(json) = row.body else {
                continue;
            };
            let persisted = PersistedEvent::from_bytes(json.as_bytes()).map_err(|e| {
                tracing::error!(identity = %identity, row_key = %row.row_key, error = %e, "undecodable event row");
                let mut fault = ReadFault::corrupt(identity.clone(), format!("undecodable event row: {}", e));
                fault.sequence = sequence;
                fault.with_source(e)
            })?;
            events.push(persisted.into_record());
        }
        Ok(events)
    }

    fn append(
        &self,
        identity: &StreamIdentity,
        mut pending: PendingEvent,
        context: &WriteContext,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault> {
        Self::reject_reserved(identity)?;
        let lease = self
            .leases
            .acquire(identity)
            .map_err(|e| lease_fault(identity, 0, e))?;

        let table = self.table(&identity.entity_type());
        let partition = identity.instance_key();
        let current = Self::header_row(&table, identity).map_err(|e| {
            WriteFault::storage_rejected(identity.clone(), 0, "stream header unreadable").with_source(e)
        })?;
        let last = current.as_ref().map(|(h, _)| h.last_sequence_number).unwrap_or(0);
        let next = validate_append(identity, last, &options)?;

        if let Some(version) = options.version_number {
            pending.version_number = version;
        }
        let record = pending.into_record(next, Utc::now(), context.clone());
        let payload = serde_json::to_string(&PersistedEvent::from_record(&record))
            .map_err(|e| WriteFault::serialization(identity.clone(), next, e))?;

        lease
            .verify()
            .map_err(|e| lease_fault(identity, next, e))?;

        let swapped = match current {
            None => {
                let mut header = StreamHeader::new(record.write_timestamp);
                header.last_sequence_number = next;
                table.insert(partition, HEADER_ROW_KEY, RowBody::Header(header))
            }
            Some((mut header, etag)) => {
                header.last_sequence_number = next;
                table.replace(partition, HEADER_ROW_KEY, RowBody::Header(header), etag)
            }
        };
        swapped.map_err(|e| {
            WriteFault::new(
                WriteFaultKind::Concurrency,
                identity.clone(),
                next,
                "stream header changed concurrently",
            )
            .with_source(e)
        })?;

        table
            .insert(partition, &event_row_key(next), RowBody::Event(payload))
            .map_err(|e| {
                tracing::warn!(identity = %identity, sequence = next, error = %e, "event row rejected, sequence left as a gap");
                WriteFault::storage_rejected(identity.clone(), next, e.to_string()).with_source(e)
            })?;
        drop(lease);

        if next == 1 {
            tracing::info!(identity = %identity, "stream created");
        }
        tracing::debug!(identity = %identity, sequence = next, event_type = %record.event_type_name, "event appended");
        Ok(AppendResult::for_sequence(next))
    }

    fn delete_stream(&self, identity: &StreamIdentity) -> Result<(), WriteFault> {
        let _lease = self
            .leases
            .acquire(identity)
            .map_err(|e| lease_fault(identity, 0, e))?;
        let Some(table) = self.existing_table(&identity.entity_type()) else {
            return Ok(());
        };

        let current = Self::header_row(&table, identity).map_err(|e| {
            WriteFault::storage_rejected(identity.clone(), 0, "stream header unreadable").with_source(e)
        })?;
        let Some((mut header, etag)) = current else {
            tracing::debug!(identity = %identity, "delete of missing stream ignored");
            return Ok(());
        };

        let last = header.last_sequence_number;
        header.deleting = true;
        table
            .replace(identity.instance_key(), HEADER_ROW_KEY, RowBody::Header(header), etag)
            .map_err(|e| {
                WriteFault::new(
                    WriteFaultKind::Concurrency,
                    identity.clone(),
                    last,
                    "stream header changed during delete",
                )
                .with_source(e)
            })?;

        let removed = table.delete_partition(identity.instance_key());
        table.delete_row(INDEX_PARTITION, identity.instance_key());
        tracing::info!(identity = %identity, rows = removed, "stream deleted");
        Ok(())
    }

    fn write_index(&self, identity: &StreamIdentity) -> Result<(), WriteFault> {
        Self::reject_reserved(identity)?;
        let table = self.table(&identity.entity_type());
        let header = Self::header_row(&table, identity).map_err(|e| {
            WriteFault::storage_rejected(identity.clone(), 0, "stream header unreadable").with_source(e)
        })?;
        let created_at = header
            .map(|(h, _)| h.created_at)
            .unwrap_or_else(Utc::now);
        table.upsert(
            INDEX_PARTITION,
            identity.instance_key(),
            RowBody::Index(IndexCard {
                instance_key: identity.instance_key().to_string(),
                created_at,
            }),
        );
        tracing::debug!(identity = %identity, "index card written");
        Ok(())
    }

    fn instance_keys(
        &self,
        entity_type: &EntityType,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault> {
        let Some(table) = self.existing_table(entity_type) else {
            return Ok(Vec::new());
        };
        let created_in_range = |created_at: DateTime<Utc>| as_of.map_or(true, |cutoff| created_at <= cutoff);
        let mut keys = BTreeSet::new();

        let cards = table.query(INDEX_PARTITION, "");
        if !cards.is_empty() {
            for row in cards {
                match row.body {
                    RowBody::Index(card) if created_in_range(card.created_at) => {
                        keys.insert(card.instance_key);
                    }
                    RowBody::Index(_) => {}
                    _ => {
                        tracing::error!(entity_type = %entity_type, row_key = %row.row_key, "index partition holds a non-index row");
                        return Err(ReadFault::corrupt(
                            entity_type.clone(),
                            "index partition holds a non-index row",
                        ));
                    }
                }
            }
            return Ok(keys.into_iter().collect());
        }

        for partition in table.partition_keys() {
            if partition == INDEX_PARTITION {
                continue;
            }
            let Ok(identity) = entity_type.instance(partition.as_str()) else {
                continue;
            };
            if let Some((header, _)) = Self::header_row(&table, &identity)? {
                if header.is_live() && created_in_range(header.created_at) {
                    keys.insert(partition);
                }
            }
        }
        Ok(keys.into_iter().collect())
    }
}
