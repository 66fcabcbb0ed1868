//! Classifications
//!
//! A classification replays a stream and decides membership: each handled
//! event votes `Include`, `Exclude` or `Unchanged`, and the latest
//! non-`Unchanged` vote is the result. The audit flags remember whether the
//! entity was ever in or out along the way.

use crate::error::{RegistryError, ReplayError};
use crate::registry::{ClassificationRegistry, ClassifyContext};
use chrono::{DateTime, Utc};
use factlog_core::{ClassificationResult, StreamReader};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A membership rule over one entity type
///
/// Implementors may carry parameters (thresholds, reference dates) that
/// handlers read through their first argument.
pub trait Classification: Send + Sync + 'static {
    /// Classification name, as published in `ClassificationCompleted`
    const NAME: &'static str;

    /// Register this classification's event handlers
    fn register(handlers: &mut ClassificationRegistry<Self>) -> Result<(), RegistryError>
    where
        Self: Sized;
}

/// Outcome of a classification replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationState {
    /// Latest non-`Unchanged` outcome
    pub current_result: ClassificationResult,
    /// Some event voted `Include`
    pub ever_included: bool,
    /// Some event voted `Exclude`
    pub ever_excluded: bool,
    /// Sequence number of the last event seen
    pub current_sequence_number: u64,
}

impl ClassificationState {
    /// Fold one event's outcome
    pub fn fold(&mut self, outcome: ClassificationResult, sequence_number: u64) {
        match outcome {
            ClassificationResult::Include => {
                self.current_result = outcome;
                self.ever_included = true;
            }
            ClassificationResult::Exclude => {
                self.current_result = outcome;
                self.ever_excluded = true;
            }
            ClassificationResult::Unchanged => {}
        }
        self.current_sequence_number = sequence_number;
    }

    /// Shorthand for `current_result`
    pub fn result(&self) -> ClassificationResult {
        self.current_result
    }
}

/// Replays streams through the classification `C`
pub struct Classifier<C> {
    definition: Arc<C>,
    handlers: Arc<ClassificationRegistry<C>>,
}

impl<C> Clone for Classifier<C> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<C> std::fmt::Debug for Classifier<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl<C: Classification> Classifier<C> {
    /// Build and validate the registry of `C`
    pub fn new(definition: C) -> Result<Self, RegistryError> {
        let mut handlers = ClassificationRegistry::new(C::NAME);
        C::register(&mut handlers)?;
        tracing::debug!(
            classification = C::NAME,
            handlers = handlers.len(),
            "classification registered"
        );
        Ok(Self {
            definition: Arc::new(definition),
            handlers: Arc::new(handlers),
        })
    }

    /// The rule's parameters
    pub fn definition(&self) -> &C {
        &self.definition
    }

    /// Registry in use
    pub fn handlers(&self) -> &ClassificationRegistry<C> {
        &self.handlers
    }

    /// Classify the stream from the beginning
    pub fn classify<R>(
        &self,
        reader: &R,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<ClassificationState, ReplayError>
    where
        R: StreamReader + ?Sized,
    {
        self.classify_from(reader, ClassificationState::default(), as_of)
    }

    /// Resume from `seed`, classifying events after its high-water mark
    pub fn classify_from<R>(
        &self,
        reader: &R,
        mut seed: ClassificationState,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<ClassificationState, ReplayError>
    where
        R: StreamReader + ?Sized,
    {
        let from = seed.current_sequence_number + 1;
        let events = reader.get_events(from, as_of)?;

        for record in &events {
            let context = ClassifyContext::for_record(record, as_of);
            let outcome = self.handlers.classify(&self.definition, record, &context)?;
            seed.fold(outcome, record.sequence_number);
        }

        tracing::debug!(
            identity = %reader.identity(),
            classification = C::NAME,
            from,
            events = events.len(),
            result = %seed.current_result,
            "classification replayed"
        );
        Ok(seed)
    }
}
