//! Event types for entity streams
//!
//! These types define the structure of facts in the append-only log:
//!
//! - [`DomainEvent`]: a typed business event (`MoneyDeposited`, `Opened`, ...)
//! - [`PendingEvent`]: an event serialized and waiting for a sequence number
//! - [`EventRecord`]: an event as read back from a stream
//! - [`PersistedEvent`]: the wire/storage shape, identical across backends
//! - [`StreamHeader`]: the per-stream sequence counter

use crate::context::WriteContext;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed business event
///
/// `EVENT_TYPE` is the name persisted with the event and used by the replay
/// registries to route it to a handler. It must be stable across releases.
///
/// ```
/// use factlog_core::DomainEvent;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct MoneyDeposited {
///     amount: i64,
/// }
///
/// impl DomainEvent for MoneyDeposited {
///     const EVENT_TYPE: &'static str = "MoneyDeposited";
/// }
/// ```
pub trait DomainEvent: Serialize + DeserializeOwned {
    /// Persisted event type name
    const EVENT_TYPE: &'static str;

    /// Payload schema version
    const VERSION: u32 = 1;

    /// Business effective date, when it differs from the write time
    ///
    /// Used by as-of replay cutoffs. Defaults to `None`, in which case the
    /// write timestamp is the effective date.
    fn as_of_date(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// An event that has been serialized but not yet sequenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Event type name
    pub event_type_name: String,
    /// Payload schema version
    pub version_number: u32,
    /// JSON-serialized payload
    pub serialized_payload: String,
    /// Business effective date, if declared by the event
    pub as_of_date: Option<DateTime<Utc>>,
    /// Name of the type the payload was serialized from
    pub schema_name: Option<String>,
}

impl PendingEvent {
    /// Create a pending event from an already-serialized payload
    pub fn new(event_type_name: impl Into<String>, serialized_payload: impl Into<String>) -> Self {
        Self {
            event_type_name: event_type_name.into(),
            version_number: 1,
            serialized_payload: serialized_payload.into(),
            as_of_date: None,
            schema_name: None,
        }
    }

    /// Serialize a typed event
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type_name: E::EVENT_TYPE.to_string(),
            version_number: E::VERSION,
            serialized_payload: serde_json::to_string(event)?,
            as_of_date: event.as_of_date(),
            schema_name: Some(std::any::type_name::<E>().to_string()),
        })
    }

    /// Override the version number
    pub fn with_version(mut self, version_number: u32) -> Self {
        self.version_number = version_number;
        self
    }

    /// Set the business effective date
    pub fn with_as_of_date(mut self, as_of_date: DateTime<Utc>) -> Self {
        self.as_of_date = Some(as_of_date);
        self
    }

    /// Assign a sequence number and write metadata, producing the record
    /// that a backend will persist.
    pub fn into_record(
        self,
        sequence_number: u64,
        write_timestamp: DateTime<Utc>,
        write_context: WriteContext,
    ) -> EventRecord {
        EventRecord {
            sequence_number,
            event_type_name: self.event_type_name,
            version_number: self.version_number,
            serialized_payload: self.serialized_payload,
            write_timestamp,
            as_of_date: self.as_of_date,
            schema_name: self.schema_name,
            write_context,
        }
    }
}

/// One fact read back from a stream
///
/// Sequence numbers are 1-based and strictly increasing within a stream.
/// Gaps are possible after a failed append, duplicates are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Position in the stream (1-based)
    pub sequence_number: u64,
    /// Event type name
    pub event_type_name: String,
    /// Payload schema version
    pub version_number: u32,
    /// JSON-serialized payload
    pub serialized_payload: String,
    /// When the event was written
    pub write_timestamp: DateTime<Utc>,
    /// Business effective date, if declared by the event
    pub as_of_date: Option<DateTime<Utc>>,
    /// Name of the type the payload was serialized from
    pub schema_name: Option<String>,
    /// Audit metadata
    pub write_context: WriteContext,
}

impl EventRecord {
    /// Date used for as-of cutoffs: the declared business date, else the write time
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.as_of_date.unwrap_or(self.write_timestamp)
    }

    /// True when this record carries an `E`
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.event_type_name == E::EVENT_TYPE
    }

    /// Deserialize the payload
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_str(&self.serialized_payload)
    }

    /// Payload as a generic JSON value
    pub fn payload_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.serialized_payload)
    }
}

/// Storage shape of an event, shared by every backend
///
/// The field set is part of the persistence contract: an event written by
/// one backend must decode identically when read through the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEvent {
    /// Event type name
    pub event_type_name: String,
    /// Payload schema version
    pub version_number: u32,
    /// Position in the stream
    pub sequence_number: u64,
    /// JSON-serialized payload
    pub serialized_payload: String,
    /// Who caused the write
    pub who: Option<String>,
    /// Originating system
    pub source: Option<String>,
    /// Free-text commentary
    pub commentary: Option<String>,
    /// Correlation identifier
    pub correlation_id: Option<String>,
    /// Causation identifier
    pub causation_id: Option<String>,
    /// Payload type name
    pub schema_name: Option<String>,
    /// Write time
    pub write_timestamp: DateTime<Utc>,
    /// Business effective date
    #[serde(default)]
    pub as_of_date: Option<DateTime<Utc>>,
}

impl PersistedEvent {
    /// Flatten a record into its storage shape
    pub fn from_record(record: &EventRecord) -> Self {
        let ctx = &record.write_context;
        Self {
            event_type_name: record.event_type_name.clone(),
            version_number: record.version_number,
            sequence_number: record.sequence_number,
            serialized_payload: record.serialized_payload.clone(),
            who: ctx.who.clone(),
            source: ctx.source.clone(),
            commentary: ctx.commentary.clone(),
            correlation_id: ctx.correlation_id.clone(),
            causation_id: ctx.causation_id.clone(),
            schema_name: record.schema_name.clone(),
            write_timestamp: record.write_timestamp,
            as_of_date: record.as_of_date,
        }
    }

    /// Rebuild the record
    pub fn into_record(self) -> EventRecord {
        EventRecord {
            sequence_number: self.sequence_number,
            event_type_name: self.event_type_name,
            version_number: self.version_number,
            serialized_payload: self.serialized_payload,
            write_timestamp: self.write_timestamp,
            as_of_date: self.as_of_date,
            schema_name: self.schema_name,
            write_context: WriteContext {
                who: self.who,
                source: self.source,
                commentary: self.commentary,
                correlation_id: self.correlation_id,
                causation_id: self.causation_id,
            },
        }
    }

    /// Encode as JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Per-stream counter, the synchronization point for appends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHeader {
    /// Highest sequence number ever reserved (0 for an empty stream)
    pub last_sequence_number: u64,
    /// Set while the stream is being deleted
    #[serde(default)]
    pub deleting: bool,
    /// When the first event was appended
    pub created_at: DateTime<Utc>,
}

impl StreamHeader {
    /// Header of a stream that is about to receive its first event
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            last_sequence_number: 0,
            deleting: false,
            created_at,
        }
    }

    /// Next sequence number to assign
    pub fn next_sequence_number(&self) -> u64 {
        self.last_sequence_number + 1
    }

    /// True when the stream holds at least one event and is not being deleted
    pub fn is_live(&self) -> bool {
        !self.deleting && self.last_sequence_number > 0
    }
}

/// Precondition on the existence of a stream before an append
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExistenceConstraint {
    /// No check
    #[default]
    Loose,
    /// The stream must not yet hold any events
    MustBeNew,
    /// The stream must already hold at least one event
    MustExist,
}

/// Append parameters beyond the event itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Last sequence number the caller observed; 0 disables the check
    pub expected_top_sequence: u64,
    /// Overrides the event's own version number
    pub version_number: Option<u32>,
    /// Existence precondition
    pub existence_constraint: ExistenceConstraint,
}

impl AppendOptions {
    /// Options with no preconditions
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the stream top to still be `expected_top_sequence`
    pub fn expecting(mut self, expected_top_sequence: u64) -> Self {
        self.expected_top_sequence = expected_top_sequence;
        self
    }

    /// Set the existence constraint
    pub fn with_constraint(mut self, existence_constraint: ExistenceConstraint) -> Self {
        self.existence_constraint = existence_constraint;
        self
    }

    /// Override the version number
    pub fn with_version(mut self, version_number: u32) -> Self {
        self.version_number = Some(version_number);
        self
    }
}

/// Outcome of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    /// Sequence number assigned to the event
    pub sequence_number: u64,
    /// True when this append created the stream
    pub new_stream_created: bool,
}

impl AppendResult {
    /// Build the result for `sequence_number`
    pub fn for_sequence(sequence_number: u64) -> Self {
        Self {
            sequence_number,
            new_stream_created: sequence_number == 1,
        }
    }
}
