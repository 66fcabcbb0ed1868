//! Notification transports
//!
//! The transport is the only piece that talks to a message bus. It reports
//! failures through [`TransportError`], whose kind decides whether the
//! dispatcher retries.

use super::Notification;
use parking_lot::Mutex;
use std::fmt;

/// Transport failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The bus did not answer in time
    Timeout,
    /// The bus asked the caller to slow down
    Throttled,
    /// The bus is temporarily unreachable
    Unavailable,
    /// The connection dropped mid-delivery
    ConnectionReset,
    /// The bus refused the message; retrying will not help
    Rejected,
    /// The message could not be encoded
    Serialization,
}

impl TransportErrorKind {
    /// True for the kinds worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::Throttled
                | TransportErrorKind::Unavailable
                | TransportErrorKind::ConnectionReset
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Throttled => "throttled",
            TransportErrorKind::Unavailable => "unavailable",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::Rejected => "rejected",
            TransportErrorKind::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Failure to deliver one notification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Classification
    pub kind: TransportErrorKind,
    /// Description
    pub message: String,
}

impl TransportError {
    /// Build an error
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// See [`TransportErrorKind::is_transient`]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Delivers notifications to a bus
pub trait NotificationTransport: Send + Sync {
    /// Deliver one notification
    fn deliver(&self, notification: &Notification) -> Result<(), TransportError>;
}

impl<F> NotificationTransport for F
where
    F: Fn(&Notification) -> Result<(), TransportError> + Send + Sync,
{
    fn deliver(&self, notification: &Notification) -> Result<(), TransportError> {
        self(notification)
    }
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl NotificationTransport for NullTransport {
    fn deliver(&self, _notification: &Notification) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Collects notifications in memory, for tests and local development
#[derive(Debug, Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<Notification>>,
}

impl MemoryTransport {
    /// Empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    /// Drain everything delivered so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.delivered.lock())
    }

    /// Number of notifications delivered
    pub fn len(&self) -> usize {
        self.delivered.lock().len()
    }

    /// True when nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.delivered.lock().is_empty()
    }
}

impl NotificationTransport for MemoryTransport {
    fn deliver(&self, notification: &Notification) -> Result<(), TransportError> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}
