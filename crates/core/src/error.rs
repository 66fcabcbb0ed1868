//! Fault types for stream reads and writes
//!
//! | Fault | Raised by | Propagation |
//! |-------|-----------|-------------|
//! | [`ReadFault`] | backend reads, listings | returned; existence checks may degrade to "absent" |
//! | [`WriteFault`] | appends, deletes, index writes | always returned to the caller |
//!
//! Write faults are classified by [`WriteFaultKind`]. Only transient storage
//! faults are worth retrying; a concurrency fault means the caller's view of
//! the stream is stale and the command must be re-evaluated.

use crate::event::ExistenceConstraint;
use crate::identity::{EntityType, StreamIdentity};
use std::fmt;

/// Boxed underlying cause
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a read fault was reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTarget {
    /// A single stream
    Stream(StreamIdentity),
    /// Every stream of an entity type (instance listing)
    EntityType(EntityType),
}

impl fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultTarget::Stream(id) => write!(f, "{}", id),
            FaultTarget::EntityType(et) => write!(f, "{}", et),
        }
    }
}

impl From<StreamIdentity> for FaultTarget {
    fn from(id: StreamIdentity) -> Self {
        FaultTarget::Stream(id)
    }
}

impl From<EntityType> for FaultTarget {
    fn from(et: EntityType) -> Self {
        FaultTarget::EntityType(et)
    }
}

/// Read fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFaultKind {
    /// Retrieval may succeed if retried
    Transient,
    /// Retrieval will not succeed (missing medium, permission)
    Permanent,
    /// Persisted data could not be decoded
    Corrupt,
}

fn sequence_suffix(sequence: &Option<u64>) -> String {
    match sequence {
        Some(seq) => format!(" at sequence {}", seq),
        None => String::new(),
    }
}

/// Failure to read a stream
#[derive(Debug, thiserror::Error)]
#[error("read fault on {target}{}: {message}", sequence_suffix(.sequence))]
pub struct ReadFault {
    /// Stream or entity type being read
    pub target: FaultTarget,
    /// Sequence number being read, when known
    pub sequence: Option<u64>,
    /// Classification
    pub kind: ReadFaultKind,
    /// Description
    pub message: String,
    /// Underlying cause
    #[source]
    pub source: Option<BoxError>,
}

impl ReadFault {
    /// Build a fault
    pub fn new(target: impl Into<FaultTarget>, kind: ReadFaultKind, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sequence: None,
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Persisted data failed to decode
    pub fn corrupt(target: impl Into<FaultTarget>, message: impl Into<String>) -> Self {
        Self::new(target, ReadFaultKind::Corrupt, message)
    }

    /// I/O failure while reading
    pub fn io(target: impl Into<FaultTarget>, err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock => ReadFaultKind::Transient,
            _ => ReadFaultKind::Permanent,
        };
        Self::new(target, kind, err.to_string()).with_source(err)
    }

    /// Attach the sequence number being read
    pub fn at_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True when a retry may succeed
    pub fn is_transient(&self) -> bool {
        self.kind == ReadFaultKind::Transient
    }
}

/// Write fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFaultKind {
    /// Another writer advanced the stream past the caller's expected top
    Concurrency,
    /// The existence constraint did not hold
    ExistenceConstraint,
    /// The identity's lease is held by another writer
    LeaseConflict,
    /// The storage medium refused the write (conflicting row, I/O, throttling)
    StorageRejected,
    /// The event or header could not be serialized
    Serialization,
}

impl WriteFaultKind {
    /// True for faults that surface as a conflict to the business layer
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            WriteFaultKind::Concurrency
                | WriteFaultKind::ExistenceConstraint
                | WriteFaultKind::LeaseConflict
        )
    }

    /// True when retrying the same command unchanged may succeed
    ///
    /// A concurrency fault is never retryable: the caller's state is stale.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WriteFaultKind::LeaseConflict | WriteFaultKind::StorageRejected
        )
    }
}

impl fmt::Display for WriteFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteFaultKind::Concurrency => "concurrency",
            WriteFaultKind::ExistenceConstraint => "existence constraint",
            WriteFaultKind::LeaseConflict => "lease conflict",
            WriteFaultKind::StorageRejected => "storage rejected",
            WriteFaultKind::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Failure to write to a stream
///
/// Carries the identity and the sequence number the write was aimed at.
#[derive(Debug, thiserror::Error)]
#[error("{kind} write fault on {identity} at sequence {sequence}: {message}")]
pub struct WriteFault {
    /// Classification
    pub kind: WriteFaultKind,
    /// Stream being written
    pub identity: StreamIdentity,
    /// Sequence number the write targeted
    pub sequence: u64,
    /// Description
    pub message: String,
    /// Underlying cause
    #[source]
    pub source: Option<BoxError>,
}

impl WriteFault {
    /// Build a fault
    pub fn new(
        kind: WriteFaultKind,
        identity: StreamIdentity,
        sequence: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identity,
            sequence,
            message: message.into(),
            source: None,
        }
    }

    /// The caller expected the top of the stream at `expected_top`, but the
    /// next sequence is already `next_sequence`.
    pub fn concurrency(identity: StreamIdentity, expected_top: u64, next_sequence: u64) -> Self {
        Self::new(
            WriteFaultKind::Concurrency,
            identity,
            next_sequence,
            format!(
                "expected top sequence {} but stream is already at {}",
                expected_top,
                next_sequence - 1
            ),
        )
    }

    /// The existence constraint failed against a stream whose last sequence
    /// is `last_sequence`.
    pub fn existence(
        identity: StreamIdentity,
        constraint: ExistenceConstraint,
        last_sequence: u64,
    ) -> Self {
        let message = match constraint {
            ExistenceConstraint::MustBeNew => {
                format!("stream must be new but already holds {} event(s)", last_sequence)
            }
            ExistenceConstraint::MustExist => "stream must exist but holds no events".to_string(),
            ExistenceConstraint::Loose => "unexpected existence check".to_string(),
        };
        Self::new(
            WriteFaultKind::ExistenceConstraint,
            identity,
            last_sequence + 1,
            message,
        )
    }

    /// The lease could not be acquired or was lost
    pub fn lease_conflict(identity: StreamIdentity, sequence: u64, message: impl Into<String>) -> Self {
        Self::new(WriteFaultKind::LeaseConflict, identity, sequence, message)
    }

    /// The storage medium refused the write
    pub fn storage_rejected(identity: StreamIdentity, sequence: u64, message: impl Into<String>) -> Self {
        Self::new(WriteFaultKind::StorageRejected, identity, sequence, message)
    }

    /// Serialization failed
    pub fn serialization(identity: StreamIdentity, sequence: u64, err: serde_json::Error) -> Self {
        Self::new(
            WriteFaultKind::Serialization,
            identity,
            sequence,
            err.to_string(),
        )
        .with_source(err)
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// See [`WriteFaultKind::is_conflict`]
    pub fn is_conflict(&self) -> bool {
        self.kind.is_conflict()
    }

    /// See [`WriteFaultKind::is_retryable`]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
