//! Convenient imports for factlog.
//!
//! ```ignore
//! use factlog::prelude::*;
//!
//! let log = Factlog::ephemeral()?;
//! ```

// Main entry point
pub use crate::database::{Factlog, FactlogBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Writing
pub use crate::types::{
    AppendOptions, DomainEvent, ExistenceConstraint, PendingEvent, StreamIdentity, WriteContext,
};

// Reading and replay
pub use crate::types::{
    Classification, ClassificationRegistry, ClassificationResult, ClassificationState,
    ClassifyContext, HandlerRegistry, ProjectionState, RegistryError, StreamReader, StreamWriter,
};
