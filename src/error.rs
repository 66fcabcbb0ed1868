//! Unified error type for factlog.
//!
//! Wraps the layer-specific errors so callers can handle every failure with
//! one type, while keeping the original error reachable through `source()`.

use factlog_core::{IdentityError, ReadFault, WriteFault};
use factlog_engine::{ConfigError, EngineError};
use factlog_replay::{RegistryError, ReplayError};
use thiserror::Error;

/// All factlog errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid stream identity
    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),

    /// Stream could not be read
    #[error(transparent)]
    Read(#[from] ReadFault),

    /// Append, delete or index write refused
    #[error(transparent)]
    Write(#[from] WriteFault),

    /// Projection or classification failed
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine failed to open
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for factlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Replay(ReplayError::Registry(e))
    }
}

impl Error {
    /// Check if this is a business-level conflict.
    ///
    /// Concurrency, existence-constraint and lease faults.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Write(fault) if fault.is_conflict())
    }

    /// Check if retrying the same call unchanged may succeed.
    ///
    /// True for lease conflicts, rejected storage writes and transient read
    /// faults. A stale `expected_top_sequence` is never retryable: the caller
    /// must re-read first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Write(fault) => fault.is_retryable(),
            Error::Read(fault) => fault.is_transient(),
            Error::Replay(e) => e.is_transient(),
            _ => false,
        }
    }

    /// The write fault, if this is one
    pub fn as_write_fault(&self) -> Option<&WriteFault> {
        match self {
            Error::Write(fault) => Some(fault),
            _ => None,
        }
    }
}
