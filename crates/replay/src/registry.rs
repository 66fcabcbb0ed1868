//! Handler registries
//!
//! A registry maps event-type names to typed apply functions. It is built
//! once per state type, rejects duplicate registrations immediately, and is
//! then frozen behind an `Arc` and shared by every replay of that type.
//!
//! ```text
//! on::<MoneyDeposited>(apply)
//!   └─ "MoneyDeposited" → |state, record| apply(state, record.decode()?)
//! ```

use crate::error::{RegistryError, ReplayError};
use chrono::{DateTime, Utc};
use factlog_core::{ClassificationResult, DomainEvent, EventRecord};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

/// What a classification handler sees besides the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Cutoff of the replay, if any
    pub as_of_date: Option<DateTime<Utc>>,
    /// Sequence number of the event being classified
    pub sequence_number: u64,
    /// Effective date of the event being classified
    pub effective_date: DateTime<Utc>,
}

impl ClassifyContext {
    pub(crate) fn for_record(record: &EventRecord, as_of_date: Option<DateTime<Utc>>) -> Self {
        Self {
            as_of_date,
            sequence_number: record.sequence_number,
            effective_date: record.effective_date(),
        }
    }
}

type ProjectionHandler<S> =
    Box<dyn Fn(&mut S, &EventRecord) -> Result<(), ReplayError> + Send + Sync>;

type ClassificationHandler<C> = Box<
    dyn Fn(&C, &EventRecord, &ClassifyContext) -> Result<ClassificationResult, ReplayError>
        + Send
        + Sync,
>;

fn decode<E: DomainEvent>(record: &EventRecord) -> Result<E, ReplayError> {
    record.decode::<E>().map_err(|e| ReplayError::Decode {
        sequence: record.sequence_number,
        event_type: record.event_type_name.clone(),
        message: e.to_string(),
    })
}

fn insert_unique<V>(
    handlers: &mut FxHashMap<&'static str, V>,
    owner: &'static str,
    event_type: &'static str,
    handler: V,
) -> Result<(), RegistryError> {
    match handlers.entry(event_type) {
        Entry::Occupied(_) => Err(RegistryError::DuplicateHandler { owner, event_type }),
        Entry::Vacant(slot) => {
            slot.insert(handler);
            Ok(())
        }
    }
}

/// Event handlers of one projection state type
pub struct HandlerRegistry<S> {
    owner: &'static str,
    handlers: FxHashMap<&'static str, ProjectionHandler<S>>,
}

impl<S> std::fmt::Debug for HandlerRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("owner", &self.owner)
            .field("event_types", &types)
            .finish()
    }
}

impl<S: 'static> HandlerRegistry<S> {
    /// Empty registry for the state type named `owner`
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            handlers: FxHashMap::default(),
        }
    }

    /// Register the handler for `E`
    ///
    /// Fails when `E` already has a handler.
    pub fn on<E, F>(&mut self, apply: F) -> Result<&mut Self, RegistryError>
    where
        E: DomainEvent + 'static,
        F: Fn(&mut S, E) + Send + Sync + 'static,
    {
        let handler: ProjectionHandler<S> = Box::new(move |state: &mut S, record: &EventRecord| {
            apply(state, decode::<E>(record)?);
            Ok(())
        });
        insert_unique(&mut self.handlers, self.owner, E::EVENT_TYPE, handler)?;
        Ok(self)
    }

    /// Name of the owning state type
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// True when `event_type` has a handler
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Apply `record` to `state`; returns false when no handler matched
    pub(crate) fn apply(&self, state: &mut S, record: &EventRecord) -> Result<bool, ReplayError> {
        match self.handlers.get(record.event_type_name.as_str()) {
            Some(handler) => handler(state, record).map(|()| true),
            None => Ok(false),
        }
    }
}

/// Event handlers of one classification type
pub struct ClassificationRegistry<C> {
    owner: &'static str,
    handlers: FxHashMap<&'static str, ClassificationHandler<C>>,
}

impl<C> std::fmt::Debug for ClassificationRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("ClassificationRegistry")
            .field("owner", &self.owner)
            .field("event_types", &types)
            .finish()
    }
}

impl<C: 'static> ClassificationRegistry<C> {
    /// Empty registry for the classification named `owner`
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            handlers: FxHashMap::default(),
        }
    }

    /// Register the handler for `E`
    ///
    /// Fails when `E` already has a handler.
    pub fn on<E, F>(&mut self, classify: F) -> Result<&mut Self, RegistryError>
    where
        E: DomainEvent + 'static,
        F: Fn(&C, E, &ClassifyContext) -> ClassificationResult + Send + Sync + 'static,
    {
        let handler: ClassificationHandler<C> = Box::new(
            move |definition: &C, record: &EventRecord, context: &ClassifyContext| {
                Ok(classify(definition, decode::<E>(record)?, context))
            },
        );
        insert_unique(&mut self.handlers, self.owner, E::EVENT_TYPE, handler)?;
        Ok(self)
    }

    /// Name of the owning classification
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// True when `event_type` has a handler
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Outcome of `record`; `Unchanged` when no handler matched
    pub(crate) fn classify(
        &self,
        definition: &C,
        record: &EventRecord,
        context: &ClassifyContext,
    ) -> Result<ClassificationResult, ReplayError> {
        match self.handlers.get(record.event_type_name.as_str()) {
            Some(handler) => handler(definition, record, context),
            None => Ok(ClassificationResult::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factlog_core::{PendingEvent, WriteContext};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Deposited {
        amount: i64,
    }

    impl DomainEvent for Deposited {
        const EVENT_TYPE: &'static str = "MoneyDeposited";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Closed;

    impl DomainEvent for Closed {
        const EVENT_TYPE: &'static str = "Closed";
    }

    fn record(seq: u64, pending: PendingEvent) -> EventRecord {
        pending.into_record(seq, Utc::now(), WriteContext::new())
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut registry = HandlerRegistry::<i64>::new("Balance");
        registry
            .on::<Deposited, _>(|b, e| *b += e.amount)
            .unwrap();
        let err = registry
            .on::<Deposited, _>(|b, e| *b -= e.amount)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateHandler {
                owner: "Balance",
                event_type: "MoneyDeposited"
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_chained_registration() {
        let mut registry = HandlerRegistry::<i64>::new("Balance");
        registry
            .on::<Deposited, _>(|b, e| *b += e.amount)
            .and_then(|r| r.on::<Closed, _>(|b, _| *b = 0))
            .unwrap();
        assert!(registry.handles("MoneyDeposited"));
        assert!(registry.handles("Closed"));
        assert!(!registry.handles("Opened"));
    }

    #[test]
    fn test_apply_decodes_and_skips_unknown() {
        let mut registry = HandlerRegistry::<i64>::new("Balance");
        registry.on::<Deposited, _>(|b, e| *b += e.amount).unwrap();

        let mut balance = 0;
        let deposit = record(1, PendingEvent::from_event(&Deposited { amount: 40 }).unwrap());
        assert!(registry.apply(&mut balance, &deposit).unwrap());
        assert!(!registry
            .apply(&mut balance, &record(2, PendingEvent::new("Opened", "{}")))
            .unwrap());
        assert_eq!(balance, 40);
    }

    #[test]
    fn test_decode_failure_carries_sequence() {
        let mut registry = HandlerRegistry::<i64>::new("Balance");
        registry.on::<Deposited, _>(|b, e| *b += e.amount).unwrap();

        let bad = record(7, PendingEvent::new("MoneyDeposited", r#"{"amount":"lots"}"#));
        match registry.apply(&mut 0, &bad).unwrap_err() {
            ReplayError::Decode {
                sequence,
                event_type,
                ..
            } => {
                assert_eq!(sequence, 7);
                assert_eq!(event_type, "MoneyDeposited");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_classification_registry_passes_context() {
        struct Large {
            threshold: i64,
        }
        let mut registry = ClassificationRegistry::<Large>::new("Large");
        registry
            .on::<Deposited, _>(|def, e, ctx| {
                assert_eq!(ctx.sequence_number, 3);
                if e.amount >= def.threshold {
                    ClassificationResult::Include
                } else {
                    ClassificationResult::Exclude
                }
            })
            .unwrap();

        let deposit = record(3, PendingEvent::from_event(&Deposited { amount: 500 }).unwrap());
        let ctx = ClassifyContext::for_record(&deposit, None);
        let outcome = registry
            .classify(&Large { threshold: 100 }, &deposit, &ctx)
            .unwrap();
        assert_eq!(outcome, ClassificationResult::Include);

        let other = record(4, PendingEvent::new("Opened", "{}"));
        let ctx = ClassifyContext::for_record(&other, None);
        assert_eq!(
            registry.classify(&Large { threshold: 100 }, &other, &ctx).unwrap(),
            ClassificationResult::Unchanged
        );
    }
}
