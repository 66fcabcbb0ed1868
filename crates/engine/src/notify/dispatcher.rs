//! Bounded-retry notification dispatch
//!
//! ## Delivery rules
//!
//! | Transport result | Action |
//! |------------------|--------|
//! | `Ok` | delivered |
//! | transient error, attempts left | sleep `backoff`, retry |
//! | transient error, budget exhausted | `warn`, drop |
//! | permanent error | `warn`, drop |
//!
//! Nothing is ever returned to the writer: the write the notification
//! describes is already durable.

use super::transport::{NotificationTransport, NullTransport, TransportError};
use super::Notification;
use chrono::{DateTime, Utc};
use factlog_core::{ClassificationResult, StreamIdentity, WriteContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Retry budget for one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// What happened to one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered after `attempts` tries
    Delivered {
        /// Tries used
        attempts: u32,
    },
    /// Given up after `attempts` tries
    Dropped {
        /// Tries used
        attempts: u32,
        /// Last transport error
        error: TransportError,
    },
    /// Dispatch is disabled
    Disabled,
}

/// Counters since the dispatcher was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Notifications delivered
    pub delivered: u64,
    /// Notifications dropped
    pub dropped: u64,
    /// Retries performed (attempts beyond the first)
    pub retries: u64,
}

/// Publishes notifications through a transport with bounded retry
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    policy: RetryPolicy,
    enabled: bool,
    delivered: AtomicU64,
    dropped: AtomicU64,
    retries: AtomicU64,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("policy", &self.policy)
            .field("enabled", &self.enabled)
            .field("stats", &self.stats())
            .finish()
    }
}

impl NotificationDispatcher {
    /// Dispatcher delivering through `transport`
    pub fn new(transport: Arc<dyn NotificationTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            enabled: true,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Dispatcher that publishes nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Arc::new(NullTransport), RetryPolicy::default())
        }
    }

    /// True when notifications are published
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Retry budget in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Counters snapshot
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    /// Deliver one notification, retrying transient failures
    pub fn dispatch(&self, notification: &Notification) -> DeliveryOutcome {
        if !self.enabled {
            return DeliveryOutcome::Disabled;
        }

        let mut attempt = 1;
        loop {
            match self.transport.deliver(notification) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        kind = notification.kind(),
                        identity = %notification.identity(),
                        attempts = attempt,
                        "notification delivered"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(error) if error.is_transient() && attempt < self.policy.max_attempts => {
                    tracing::debug!(
                        kind = notification.kind(),
                        identity = %notification.identity(),
                        attempt,
                        error = %error,
                        "transient notification failure, retrying"
                    );
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    attempt += 1;
                    if !self.policy.backoff.is_zero() {
                        thread::sleep(self.policy.backoff);
                    }
                }
                Err(error) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        kind = notification.kind(),
                        identity = %notification.identity(),
                        attempts = attempt,
                        transient = error.is_transient(),
                        error = %error,
                        "notification dropped"
                    );
                    return DeliveryOutcome::Dropped {
                        attempts: attempt,
                        error,
                    };
                }
            }
        }
    }

    /// Publish `NewEntityCreated`
    pub fn new_entity_created(
        &self,
        identity: &StreamIdentity,
        context: &WriteContext,
    ) -> DeliveryOutcome {
        self.dispatch(&Notification::NewEntityCreated {
            identity: identity.clone(),
            context: context.clone(),
            published_at: Utc::now(),
        })
    }

    /// Publish `NewEventAppended`
    pub fn new_event_appended(
        &self,
        identity: &StreamIdentity,
        sequence_number: u64,
        event_type_name: &str,
        payload: &str,
        context: &WriteContext,
    ) -> DeliveryOutcome {
        self.dispatch(&Notification::NewEventAppended {
            identity: identity.clone(),
            sequence_number,
            event_type_name: event_type_name.to_string(),
            payload: payload.to_string(),
            context: context.clone(),
            published_at: Utc::now(),
        })
    }

    /// Publish `ProjectionCompleted`
    pub fn projection_completed(
        &self,
        identity: &StreamIdentity,
        projection_name: &str,
        as_of_date: Option<DateTime<Utc>>,
        as_of_sequence: u64,
    ) -> DeliveryOutcome {
        self.dispatch(&Notification::ProjectionCompleted {
            identity: identity.clone(),
            projection_name: projection_name.to_string(),
            as_of_date,
            as_of_sequence,
            published_at: Utc::now(),
        })
    }

    /// Publish `ClassificationCompleted`
    pub fn classification_completed(
        &self,
        identity: &StreamIdentity,
        classification_name: &str,
        result: ClassificationResult,
        as_of_date: Option<DateTime<Utc>>,
        as_of_sequence: u64,
    ) -> DeliveryOutcome {
        self.dispatch(&Notification::ClassificationCompleted {
            identity: identity.clone(),
            classification_name: classification_name.to_string(),
            result,
            as_of_date,
            as_of_sequence,
            published_at: Utc::now(),
        })
    }
}
