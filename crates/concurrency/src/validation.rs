//! Append precondition checks
//!
//! Run inside the lease, against the header as read under that lease:
//!
//! 1. Existence constraint: `MustBeNew` fails on a stream with events,
//!    `MustExist` fails on a stream without, `Loose` never fails.
//! 2. Expected top: with `expected_top_sequence > 0`, the append fails when
//!    `expected_top_sequence + 1 < next_sequence`, i.e. another writer has
//!    appended since the caller read the stream.
//!
//! An expected top ahead of the stream is not rejected. Zero disables the
//! check entirely.

use factlog_core::{AppendOptions, ExistenceConstraint, StreamIdentity, WriteFault};

/// Check the existence constraint against the stream's last sequence number
pub fn validate_existence(
    identity: &StreamIdentity,
    constraint: ExistenceConstraint,
    last_sequence: u64,
) -> Result<(), WriteFault> {
    let violated = match constraint {
        ExistenceConstraint::Loose => false,
        ExistenceConstraint::MustBeNew => last_sequence > 0,
        ExistenceConstraint::MustExist => last_sequence == 0,
    };
    if violated {
        return Err(WriteFault::existence(
            identity.clone(),
            constraint,
            last_sequence,
        ));
    }
    Ok(())
}

/// Check the caller's expected top against the sequence about to be assigned
pub fn validate_expected_top(
    identity: &StreamIdentity,
    expected_top_sequence: u64,
    next_sequence: u64,
) -> Result<(), WriteFault> {
    if expected_top_sequence > 0 && expected_top_sequence + 1 < next_sequence {
        return Err(WriteFault::concurrency(
            identity.clone(),
            expected_top_sequence,
            next_sequence,
        ));
    }
    Ok(())
}

/// Run every precondition and return the sequence number to assign
pub fn validate_append(
    identity: &StreamIdentity,
    last_sequence: u64,
    options: &AppendOptions,
) -> Result<u64, WriteFault> {
    validate_existence(identity, options.existence_constraint, last_sequence)?;
    let next_sequence = last_sequence + 1;
    validate_expected_top(identity, options.expected_top_sequence, next_sequence)?;
    Ok(next_sequence)
}
