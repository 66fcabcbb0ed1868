//! Replay errors

use factlog_core::ReadFault;
use thiserror::Error;

/// Handler registration failure, raised while a registry is being built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two handlers for one event type on the same state type
    #[error("{owner} already has a handler for event type '{event_type}'")]
    DuplicateHandler {
        /// State or classification type owning the registry
        owner: &'static str,
        /// Event type registered twice
        event_type: &'static str,
    },
}

/// Replay failure
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The stream could not be read
    #[error(transparent)]
    Read(#[from] ReadFault),

    /// A handled event's payload did not deserialize
    #[error("cannot decode '{event_type}' at sequence {sequence}: {message}")]
    Decode {
        /// Sequence number of the offending event
        sequence: u64,
        /// Its event type
        event_type: String,
        /// Deserializer message
        message: String,
    },

    /// The handler registry was rejected
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ReplayError {
    /// True when the underlying read failure may clear on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ReplayError::Read(fault) if fault.is_transient())
    }
}
