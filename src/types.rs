//! Public types for the factlog unified API.
//!
//! Re-exports from the internal crates so callers depend on `factlog` only.

// Identities and events
pub use factlog_core::{
    AppendOptions, AppendResult, DomainEvent, EntityType, EventRecord, ExistenceConstraint,
    PendingEvent, StreamHeader, StreamIdentity, WriteContext,
};

// Storage seams and faults
pub use factlog_core::{
    ReadFault, ReadFaultKind, StreamBackend, StreamReader, StreamWriter, WriteFault,
    WriteFaultKind,
};

// Engine
pub use factlog_engine::{
    DomainConfig, EngineConfig, EventStream, EventStreamReader, MemoryTransport, Notification,
    NotificationDispatcher, NotificationTransport, NullTransport, RetryPolicy, TransportError,
    TransportErrorKind,
};

// Replay
pub use factlog_replay::{
    Classification, ClassificationRegistry, ClassificationResult, ClassificationState,
    ClassifyContext, HandlerRegistry, ProjectionState, RegistryError, ReplayError,
};

// Storage configuration
pub use factlog_storage::{DurabilityMode, APPEND_LOG_BACKEND, TABLE_BACKEND};
pub use factlog_concurrency::LeaseConfig;
