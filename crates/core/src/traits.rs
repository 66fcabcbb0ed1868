//! Storage and stream traits
//!
//! Three seams, from lowest to highest:
//!
//! - [`StreamBackend`]: the storage strategy. One instance serves every
//!   identity; all methods take the identity explicitly.
//! - [`StreamReader`]: a read view bound to one identity. This is what the
//!   replay engine consumes.
//! - [`StreamWriter`]: a write view bound to one identity, carrying the
//!   write context applied to subsequent appends.
//!
//! ## Design
//!
//! `StreamBackend` is object-safe so the engine can select a backend at
//! runtime from configuration and hold it as `Arc<dyn StreamBackend>`.
//! Backends own the whole append algorithm (lease, header read, precondition
//! checks, write, counter advance) because the ordering of the write and the
//! counter advance differs per storage strategy.

use crate::context::WriteContext;
use crate::error::{ReadFault, WriteFault};
use crate::event::{AppendOptions, AppendResult, EventRecord, PendingEvent, StreamHeader};
use crate::identity::{EntityType, StreamIdentity};
use chrono::{DateTime, Utc};

/// Storage strategy for entity streams
///
/// ## Contract
///
/// - `append` assigns `last_sequence_number + 1` or fails; it never
///   overwrites an existing sequence number.
/// - `read_events` returns records in ascending sequence order.
/// - `delete_stream` on a missing stream succeeds.
/// - Reads never block on the write lease.
pub trait StreamBackend: Send + Sync {
    /// Short backend name, as used in configuration
    fn name(&self) -> &'static str;

    /// True when the stream holds at least one event
    fn exists(&self, identity: &StreamIdentity) -> Result<bool, ReadFault> {
        Ok(self
            .read_header(identity)?
            .map(|h| h.is_live())
            .unwrap_or(false))
    }

    /// Current header, `None` when the stream was never written
    fn read_header(&self, identity: &StreamIdentity) -> Result<Option<StreamHeader>, ReadFault>;

    /// Events with `sequence_number >= from_sequence`, ascending
    fn read_events(
        &self,
        identity: &StreamIdentity,
        from_sequence: u64,
    ) -> Result<Vec<EventRecord>, ReadFault>;

    /// Append one event under the lease and the options' preconditions
    fn append(
        &self,
        identity: &StreamIdentity,
        pending: PendingEvent,
        context: &WriteContext,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault>;

    /// Erase every record of the stream
    fn delete_stream(&self, identity: &StreamIdentity) -> Result<(), WriteFault>;

    /// Record the identity in the entity type's index, where the backend keeps one
    fn write_index(&self, identity: &StreamIdentity) -> Result<(), WriteFault>;

    /// Instance keys of the entity type, optionally restricted to streams
    /// created on or before `as_of`. Sorted ascending.
    fn instance_keys(
        &self,
        entity_type: &EntityType,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault>;
}

/// Read view of one stream
pub trait StreamReader {
    /// Identity being read
    fn identity(&self) -> &StreamIdentity;

    /// True when the stream holds at least one event
    fn exists(&self) -> Result<bool, ReadFault>;

    /// Every event, ascending
    fn get_all_events(&self) -> Result<Vec<EventRecord>, ReadFault> {
        self.get_events(1, None)
    }

    /// Events from `from_sequence` onward, stopping before the first event
    /// whose effective date exceeds `effective_date`
    fn get_events(
        &self,
        from_sequence: u64,
        effective_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, ReadFault>;

    /// Instance keys sharing this stream's entity type
    fn get_all_instance_keys(
        &self,
        as_of_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault>;
}

/// Write view of one stream
pub trait StreamWriter {
    /// Identity being written
    fn identity(&self) -> &StreamIdentity;

    /// Context applied to subsequent appends
    fn set_context(&mut self, context: WriteContext);

    /// True when the stream holds at least one event
    fn exists(&self) -> bool;

    /// Append an already-serialized event
    fn append_pending(
        &self,
        pending: PendingEvent,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault>;

    /// Erase the stream
    fn delete_stream(&self) -> Result<(), WriteFault>;

    /// Record the stream in its entity type's index
    fn write_index(&self) -> Result<(), WriteFault>;
}

/// Truncate `events` before the first record whose effective date exceeds
/// `cutoff`.
///
/// Effective dates are assumed non-decreasing along the stream, so a later
/// event with an earlier date is not considered once the cutoff is crossed.
pub fn truncate_at_effective_date(events: &mut Vec<EventRecord>, cutoff: Option<DateTime<Utc>>) {
    if let Some(cutoff) = cutoff {
        if let Some(pos) = events.iter().position(|e| e.effective_date() > cutoff) {
            events.truncate(pos);
        }
    }
}
