//! # factlog
//!
//! Event-sourced persistence core: every business entity is an append-only
//! stream of facts, named by `(domain, entity type, instance key)`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use factlog::prelude::*;
//!
//! let log = Factlog::ephemeral()?;
//! let account = log.stream_for("Bank", "Account", "ACC-1")?;
//!
//! account.append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)?;
//! account.append_event(&MoneyDeposited { amount: 100 }, 1, ExistenceConstraint::MustExist)?;
//!
//! // Fold the stream into typed state
//! let balance: Balance = log.project(account.identity(), None)?;
//!
//! // Decide membership
//! let state = log.classify::<InterestAccruedToday>(account.identity(), None)?;
//! ```
//!
//! ## Layers
//!
//! - `factlog-core`: identities, events, faults, storage traits
//! - `factlog-concurrency`: per-stream leases and append preconditions
//! - `factlog-storage`: the append-log and partitioned-table backends
//! - `factlog-engine`: configuration, [`EventStream`], notifications
//! - `factlog-replay`: projections and classifications
//!
//! ## Concurrency
//!
//! Appends to one stream are serialized by a short lease *and* checked
//! against the caller's `expected_top_sequence`. A stale caller gets a
//! [`WriteFault`] with kind `Concurrency`; [`Error::is_conflict`] and
//! [`Error::is_retryable`] tell the two apart from transient failures.

#![warn(missing_docs)]

mod database;
mod error;
mod types;

pub mod prelude;

// Re-export main entry points
pub use database::{Factlog, FactlogBuilder};
pub use error::{Error, Result};

// Re-export types
pub use types::*;
