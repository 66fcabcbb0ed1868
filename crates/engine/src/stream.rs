//! EventStream facade
//!
//! [`EventStream`] is the write-side handle of one entity stream: it carries
//! the write context, delegates the append algorithm to the backend, and
//! publishes notifications once the write is durable. [`EventStreamReader`]
//! is the read-side handle consumed by projections and classifications.
//!
//! ## Append
//!
//! ```text
//! backend.append(identity, event, context, options)   lease + checks + write
//!   ├─ Err(fault)  → returned to the caller, nothing published
//!   └─ Ok(result)
//!        ├─ new stream and index maintained → backend.write_index (warn on failure)
//!        ├─ new stream → NewEntityCreated    (best-effort)
//!        └─ NewEventAppended                 (best-effort)
//! ```

use crate::notify::NotificationDispatcher;
use chrono::{DateTime, Utc};
use factlog_core::{
    truncate_at_effective_date, AppendOptions, AppendResult, DomainEvent, EventRecord,
    ExistenceConstraint, PendingEvent, ReadFault, StreamBackend, StreamHeader, StreamIdentity,
    StreamReader, StreamWriter, WriteContext, WriteFault,
};
use std::sync::Arc;

/// Write handle of one entity stream
pub struct EventStream {
    identity: StreamIdentity,
    backend: Arc<dyn StreamBackend>,
    dispatcher: Arc<NotificationDispatcher>,
    context: WriteContext,
    maintain_index: bool,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("identity", &self.identity)
            .field("backend", &self.backend.name())
            .field("context", &self.context)
            .field("maintain_index", &self.maintain_index)
            .finish()
    }
}

impl EventStream {
    /// Bind a stream handle
    pub fn new(
        identity: StreamIdentity,
        backend: Arc<dyn StreamBackend>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            identity,
            backend,
            dispatcher,
            context: WriteContext::default(),
            maintain_index: false,
        }
    }

    /// Write the index card when this handle creates the stream
    pub fn with_index_maintenance(mut self, maintain_index: bool) -> Self {
        self.maintain_index = maintain_index;
        self
    }

    /// Builder-style [`StreamWriter::set_context`]
    pub fn with_context(mut self, context: WriteContext) -> Self {
        self.context = context;
        self
    }

    /// Stream identity
    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    /// Context applied to appends
    pub fn context(&self) -> &WriteContext {
        &self.context
    }

    /// Name of the backend serving this stream
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// True when the stream holds at least one event
    ///
    /// A read fault is logged and reported as "absent". Use
    /// [`try_exists`](Self::try_exists) to see the fault.
    pub fn exists(&self) -> bool {
        match self.backend.exists(&self.identity) {
            Ok(exists) => exists,
            Err(fault) => {
                tracing::warn!(identity = %self.identity, error = %fault, "exists check degraded to false");
                false
            }
        }
    }

    /// True when the stream holds at least one event
    pub fn try_exists(&self) -> Result<bool, ReadFault> {
        self.backend.exists(&self.identity)
    }

    /// Current header
    pub fn header(&self) -> Result<Option<StreamHeader>, ReadFault> {
        self.backend.read_header(&self.identity)
    }

    /// Highest sequence number assigned so far (0 for an empty stream)
    pub fn last_sequence_number(&self) -> Result<u64, ReadFault> {
        Ok(self
            .header()?
            .filter(|h| !h.deleting)
            .map(|h| h.last_sequence_number)
            .unwrap_or(0))
    }

    /// Append a typed event
    ///
    /// `expected_top_sequence = 0` disables the optimistic check.
    pub fn append_event<E: DomainEvent>(
        &self,
        event: &E,
        expected_top_sequence: u64,
        existence_constraint: ExistenceConstraint,
    ) -> Result<AppendResult, WriteFault> {
        self.append_event_with(
            event,
            AppendOptions::new()
                .expecting(expected_top_sequence)
                .with_constraint(existence_constraint),
        )
    }

    /// Append a typed event with the full option set
    pub fn append_event_with<E: DomainEvent>(
        &self,
        event: &E,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault> {
        let pending = PendingEvent::from_event(event).map_err(|e| {
            WriteFault::serialization(self.identity.clone(), 0, e)
        })?;
        self.append_pending(pending, options)
    }

    /// Append an already-serialized event
    pub fn append_pending(
        &self,
        pending: PendingEvent,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault> {
        let event_type = pending.event_type_name.clone();
        let payload = pending.serialized_payload.clone();
        let result = self
            .backend
            .append(&self.identity, pending, &self.context, options)?;

        if result.new_stream_created {
            if self.maintain_index {
                if let Err(fault) = self.backend.write_index(&self.identity) {
                    tracing::warn!(identity = %self.identity, error = %fault, "index card not written");
                }
            }
            self.dispatcher
                .new_entity_created(&self.identity, &self.context);
        }
        self.dispatcher.new_event_appended(
            &self.identity,
            result.sequence_number,
            &event_type,
            &payload,
            &self.context,
        );
        Ok(result)
    }

    /// Erase every event of the stream; a missing stream is not an error
    pub fn delete_stream(&self) -> Result<(), WriteFault> {
        self.backend.delete_stream(&self.identity)
    }

    /// Record the stream in its entity type's index card
    pub fn write_index(&self) -> Result<(), WriteFault> {
        self.backend.write_index(&self.identity)
    }

    /// Read handle on the same stream
    pub fn reader(&self) -> EventStreamReader {
        EventStreamReader::new(self.identity.clone(), Arc::clone(&self.backend))
    }
}

impl StreamWriter for EventStream {
    fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    fn set_context(&mut self, context: WriteContext) {
        self.context = context;
    }

    fn exists(&self) -> bool {
        EventStream::exists(self)
    }

    fn append_pending(
        &self,
        pending: PendingEvent,
        options: AppendOptions,
    ) -> Result<AppendResult, WriteFault> {
        EventStream::append_pending(self, pending, options)
    }

    fn delete_stream(&self) -> Result<(), WriteFault> {
        EventStream::delete_stream(self)
    }

    fn write_index(&self) -> Result<(), WriteFault> {
        EventStream::write_index(self)
    }
}

/// Read handle of one entity stream
#[derive(Clone)]
pub struct EventStreamReader {
    identity: StreamIdentity,
    backend: Arc<dyn StreamBackend>,
}

impl std::fmt::Debug for EventStreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamReader")
            .field("identity", &self.identity)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl EventStreamReader {
    /// Bind a read handle
    pub fn new(identity: StreamIdentity, backend: Arc<dyn StreamBackend>) -> Self {
        Self { identity, backend }
    }
}

impl StreamReader for EventStreamReader {
    fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    fn exists(&self) -> Result<bool, ReadFault> {
        self.backend.exists(&self.identity)
    }

    fn get_events(
        &self,
        from_sequence: u64,
        effective_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, ReadFault> {
        let mut events = self.backend.read_events(&self.identity, from_sequence)?;
        truncate_at_effective_date(&mut events, effective_date);
        Ok(events)
    }

    fn get_all_instance_keys(
        &self,
        as_of_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault> {
        self.backend
            .instance_keys(&self.identity.entity_type(), as_of_date)
    }
}
