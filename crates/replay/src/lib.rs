//! Replay engine for factlog
//!
//! Folds entity streams into derived views:
//! - [`Projector`]: typed state built by per-event handlers
//! - [`Classifier`]: tri-state membership, last non-`Unchanged` vote wins
//!
//! Both consult an explicit handler registry built once per type, both
//! honour an optional as-of cutoff, and both can resume from a seeded
//! checkpoint.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classification;
pub mod error;
pub mod projection;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use classification::{Classification, ClassificationState, Classifier};
pub use error::{RegistryError, ReplayError};
pub use factlog_core::ClassificationResult;
pub use projection::{ProjectionState, Projector};
pub use registry::{ClassificationRegistry, ClassifyContext, HandlerRegistry};
