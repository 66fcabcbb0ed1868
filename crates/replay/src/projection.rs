//! Projections
//!
//! A projection folds a stream's events into caller-defined state. The fold
//! is deterministic: two projections over the same prefix are equal, and a
//! state seeded from a checkpoint resumes one past its high-water mark.
//!
//! ## Replay
//!
//! ```text
//! from = state.current_sequence_number() + 1
//! reader.get_events(from, as_of)            stops at the first event past as_of
//!   for each record:
//!     handler registered?  → decode payload, apply
//!     always               → state.set_current_sequence_number(record.seq)
//! ```

use crate::error::{RegistryError, ReplayError};
use crate::registry::HandlerRegistry;
use chrono::{DateTime, Utc};
use factlog_core::StreamReader;
use std::sync::Arc;

/// Caller-defined projection state
///
/// # Example
///
/// ```
/// use factlog_core::DomainEvent;
/// use factlog_replay::{HandlerRegistry, ProjectionState, RegistryError};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct MoneyDeposited { amount: i64 }
///
/// impl DomainEvent for MoneyDeposited {
///     const EVENT_TYPE: &'static str = "MoneyDeposited";
/// }
///
/// #[derive(Default)]
/// struct Balance { amount: i64, seq: u64 }
///
/// impl ProjectionState for Balance {
///     const NAME: &'static str = "Balance";
///
///     fn current_sequence_number(&self) -> u64 { self.seq }
///     fn set_current_sequence_number(&mut self, seq: u64) { self.seq = seq }
///
///     fn register(handlers: &mut HandlerRegistry<Self>) -> Result<(), RegistryError> {
///         handlers.on::<MoneyDeposited, _>(|b, e| b.amount += e.amount)?;
///         Ok(())
///     }
/// }
/// ```
pub trait ProjectionState: Default + Send + Sync + 'static {
    /// Projection name, as published in `ProjectionCompleted`
    const NAME: &'static str;

    /// Sequence number of the last event folded in (0 before any)
    fn current_sequence_number(&self) -> u64;

    /// Advance the high-water mark
    fn set_current_sequence_number(&mut self, sequence_number: u64);

    /// Register this state's event handlers
    fn register(handlers: &mut HandlerRegistry<Self>) -> Result<(), RegistryError>;
}

/// Replays streams into `S`
///
/// Cloning shares the registry.
pub struct Projector<S> {
    handlers: Arc<HandlerRegistry<S>>,
}

impl<S> Clone for Projector<S> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<S> std::fmt::Debug for Projector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl<S: ProjectionState> Projector<S> {
    /// Build and validate the registry of `S`
    pub fn new() -> Result<Self, RegistryError> {
        let mut handlers = HandlerRegistry::new(S::NAME);
        S::register(&mut handlers)?;
        tracing::debug!(projection = S::NAME, handlers = handlers.len(), "projection registered");
        Ok(Self {
            handlers: Arc::new(handlers),
        })
    }

    /// Registry in use
    pub fn handlers(&self) -> &HandlerRegistry<S> {
        &self.handlers
    }

    /// Replay the stream from the beginning
    pub fn process<R>(&self, reader: &R, as_of: Option<DateTime<Utc>>) -> Result<S, ReplayError>
    where
        R: StreamReader + ?Sized,
    {
        self.process_from(reader, S::default(), as_of)
    }

    /// Resume from `seed`, replaying events after its high-water mark
    pub fn process_from<R>(
        &self,
        reader: &R,
        mut seed: S,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<S, ReplayError>
    where
        R: StreamReader + ?Sized,
    {
        let from = seed.current_sequence_number() + 1;
        let events = reader.get_events(from, as_of)?;

        let mut applied = 0usize;
        for record in &events {
            if self.handlers.apply(&mut seed, record)? {
                applied += 1;
            }
            seed.set_current_sequence_number(record.sequence_number);
        }

        tracing::debug!(
            identity = %reader.identity(),
            projection = S::NAME,
            from,
            events = events.len(),
            applied,
            as_of_sequence = seed.current_sequence_number(),
            "projection replayed"
        );
        Ok(seed)
    }
}
