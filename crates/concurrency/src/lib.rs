//! Concurrency layer for factlog
//!
//! Appends are protected by two complementary mechanisms:
//! - [`LeaseManager`]: a short, time-bounded exclusive lease per stream identity
//! - [`validate_append`]: the existence constraint and the optimistic
//!   expected-top-sequence check, evaluated under that lease
//!
//! Neither replaces the other. The lease serializes writers on one stream;
//! the expected-top check catches callers acting on a stale read.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lease;
pub mod validation;

pub use lease::{
    LeaseConfig, LeaseError, LeaseGuard, LeaseManager, DEFAULT_ACQUIRE_TIMEOUT,
    DEFAULT_LEASE_DURATION,
};
pub use validation::{validate_append, validate_existence, validate_expected_top};
