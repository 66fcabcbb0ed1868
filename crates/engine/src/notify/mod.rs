//! Best-effort notifications
//!
//! After a durable write (or a completed replay) the engine publishes a
//! [`Notification`] through an injected [`NotificationTransport`]. Delivery
//! is retried a bounded number of times for transient failures only, and a
//! failure never reaches the caller of the write.
//!
//! - `transport`: the transport seam and the built-in transports
//! - `dispatcher`: bounded retry with fixed backoff

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{DeliveryOutcome, DispatchStats, NotificationDispatcher, RetryPolicy};
pub use transport::{
    MemoryTransport, NotificationTransport, NullTransport, TransportError, TransportErrorKind,
};

use chrono::{DateTime, Utc};
use factlog_core::{ClassificationResult, StreamIdentity, WriteContext};
use serde::{Deserialize, Serialize};

/// A published fact about a stream
///
/// Serialized as a JSON object tagged by `kind`:
///
/// ```json
/// {"kind":"newEventAppended","identity":{...},"sequenceNumber":3,...}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    /// The first event of a stream was appended
    #[serde(rename_all = "camelCase")]
    NewEntityCreated {
        /// New stream
        identity: StreamIdentity,
        /// Context of the creating append
        context: WriteContext,
        /// Publication time
        published_at: DateTime<Utc>,
    },

    /// An event was appended
    #[serde(rename_all = "camelCase")]
    NewEventAppended {
        /// Stream written
        identity: StreamIdentity,
        /// Sequence number assigned
        sequence_number: u64,
        /// Type of the appended event
        event_type_name: String,
        /// Serialized event payload, as stored
        payload: String,
        /// Context of the append
        context: WriteContext,
        /// Publication time
        published_at: DateTime<Utc>,
    },

    /// A projection finished replaying a stream
    #[serde(rename_all = "camelCase")]
    ProjectionCompleted {
        /// Stream replayed
        identity: StreamIdentity,
        /// Projection type
        projection_name: String,
        /// Cutoff used, if any
        as_of_date: Option<DateTime<Utc>>,
        /// Last sequence number applied
        as_of_sequence: u64,
        /// Publication time
        published_at: DateTime<Utc>,
    },

    /// A classification finished replaying a stream
    #[serde(rename_all = "camelCase")]
    ClassificationCompleted {
        /// Stream replayed
        identity: StreamIdentity,
        /// Classification type
        classification_name: String,
        /// Final result
        result: ClassificationResult,
        /// Cutoff used, if any
        as_of_date: Option<DateTime<Utc>>,
        /// Last sequence number applied
        as_of_sequence: u64,
        /// Publication time
        published_at: DateTime<Utc>,
    },
}

impl Notification {
    /// Stream the notification is about
    pub fn identity(&self) -> &StreamIdentity {
        match self {
            Notification::NewEntityCreated { identity, .. }
            | Notification::NewEventAppended { identity, .. }
            | Notification::ProjectionCompleted { identity, .. }
            | Notification::ClassificationCompleted { identity, .. } => identity,
        }
    }

    /// Tag used in the serialized form
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::NewEntityCreated { .. } => "newEntityCreated",
            Notification::NewEventAppended { .. } => "newEventAppended",
            Notification::ProjectionCompleted { .. } => "projectionCompleted",
            Notification::ClassificationCompleted { .. } => "classificationCompleted",
        }
    }

    /// JSON envelope
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
