//! Core types for factlog
//!
//! This crate defines the value types every other crate builds on:
//! - [`StreamIdentity`]: the `(domain, entity type, instance key)` stream key
//! - [`PendingEvent`] / [`EventRecord`] / [`PersistedEvent`]: events before,
//!   after and during persistence
//! - [`WriteContext`]: audit metadata
//! - [`ReadFault`] / [`WriteFault`]: storage failures
//! - [`StreamBackend`], [`StreamReader`], [`StreamWriter`]: the storage seams

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classification;
pub mod context;
pub mod error;
pub mod event;
pub mod identity;
pub mod traits;

pub use classification::ClassificationResult;
pub use context::WriteContext;
pub use error::{BoxError, FaultTarget, ReadFault, ReadFaultKind, WriteFault, WriteFaultKind};
pub use event::{
    AppendOptions, AppendResult, DomainEvent, EventRecord, ExistenceConstraint, PendingEvent,
    PersistedEvent, StreamHeader,
};
pub use identity::{EntityType, IdentityError, StreamIdentity, MAX_COMPONENT_LENGTH};
pub use traits::{truncate_at_effective_date, StreamBackend, StreamReader, StreamWriter};
