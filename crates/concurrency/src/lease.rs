//! Per-identity write leases
//!
//! A lease is a short, time-bounded, exclusive claim on one
//! [`StreamIdentity`]. Appends hold it for the duration of a single write so
//! the header read, the precondition checks, the write and the counter
//! advance observe a consistent stream.
//!
//! ## Design
//!
//! - One slot per identity, held in a `DashMap`. Distinct identities never
//!   contend on the same lock.
//! - Acquisition waits on the slot's condvar for at most `acquire_timeout`,
//!   then fails with [`LeaseError::Timeout`].
//! - A lease that outlives `duration` is expired and may be taken over by the
//!   next writer. Its holder discovers the loss through [`LeaseGuard::verify`].
//! - Release is by lease id, so a holder whose lease was taken over cannot
//!   release the new holder's lease.

use dashmap::DashMap;
use factlog_core::StreamIdentity;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default lease duration
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(15);

/// Default time to wait for a held lease
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lease timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// How long a granted lease stays valid
    pub duration: Duration,
    /// How long acquisition waits for a held lease
    pub acquire_timeout: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_LEASE_DURATION,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Lease failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseError {
    /// Another writer held the lease for the whole acquire timeout
    #[error("lease on {identity} still held after waiting {waited_ms}ms")]
    Timeout {
        /// Contended identity
        identity: StreamIdentity,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// The lease expired and was taken over, or was never granted
    #[error("lease {lease_id} on {identity} is no longer held")]
    Lost {
        /// Identity the lease was for
        identity: StreamIdentity,
        /// The stale lease id
        lease_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    id: Uuid,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct LeaseSlot {
    current: Mutex<Option<Lease>>,
    released: Condvar,
}

/// Grants and tracks per-identity leases
#[derive(Debug, Default)]
pub struct LeaseManager {
    slots: DashMap<StreamIdentity, Arc<LeaseSlot>>,
    config: LeaseConfig,
}

impl LeaseManager {
    /// Create a manager with the given timing
    pub fn new(config: LeaseConfig) -> Self {
        Self {
            slots: DashMap::new(),
            config,
        }
    }

    /// Lease timing in effect
    pub fn config(&self) -> LeaseConfig {
        self.config
    }

    fn slot(&self, identity: &StreamIdentity) -> Arc<LeaseSlot> {
        if let Some(slot) = self.slots.get(identity) {
            return Arc::clone(slot.value());
        }
        let entry = self
            .slots
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(LeaseSlot::default()));
        Arc::clone(entry.value())
    }

    /// Acquire the lease on `identity`, waiting up to the acquire timeout
    pub fn acquire(&self, identity: &StreamIdentity) -> Result<LeaseGuard<'_>, LeaseError> {
        let slot = self.slot(identity);
        let started = Instant::now();
        let deadline = started + self.config.acquire_timeout;

        let mut current = slot.current.lock();
        loop {
            let now = Instant::now();
            let held = *current;
            match held {
                None => break,
                Some(lease) if lease.expires_at <= now => {
                    tracing::warn!(
                        identity = %identity,
                        lease_id = %lease.id,
                        "taking over expired lease"
                    );
                    break;
                }
                Some(lease) => {
                    if now >= deadline {
                        return Err(LeaseError::Timeout {
                            identity: identity.clone(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    let wake_at = deadline.min(lease.expires_at);
                    let _ = slot.released.wait_until(&mut current, wake_at);
                }
            }
        }

        let lease = Lease {
            id: Uuid::new_v4(),
            expires_at: Instant::now() + self.config.duration,
        };
        *current = Some(lease);
        drop(current);

        tracing::debug!(identity = %identity, lease_id = %lease.id, "lease acquired");
        Ok(LeaseGuard {
            manager: self,
            identity: identity.clone(),
            lease_id: lease.id,
        })
    }

    /// True when `lease_id` is the current, unexpired lease on `identity`
    pub fn is_held(&self, identity: &StreamIdentity, lease_id: Uuid) -> bool {
        let Some(slot) = self.slots.get(identity).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let current = slot.current.lock();
        matches!(*current, Some(lease) if lease.id == lease_id && lease.expires_at > Instant::now())
    }

    /// Fail unless `lease_id` is still held
    pub fn verify(&self, identity: &StreamIdentity, lease_id: Uuid) -> Result<(), LeaseError> {
        if self.is_held(identity, lease_id) {
            Ok(())
        } else {
            Err(LeaseError::Lost {
                identity: identity.clone(),
                lease_id,
            })
        }
    }

    /// Release `lease_id`; returns false when it was no longer the current lease
    pub fn release(&self, identity: &StreamIdentity, lease_id: Uuid) -> bool {
        let Some(slot) = self.slots.get(identity).map(|s| Arc::clone(s.value())) else {
            return false;
        };

        let released = {
            let mut current = slot.current.lock();
            let held = *current;
            match held {
                Some(lease) if lease.id == lease_id => {
                    *current = None;
                    true
                }
                _ => false,
            }
        };

        if released {
            slot.released.notify_one();
            drop(slot);
            // Drop idle slots; a waiter holds its own Arc, which keeps the slot alive.
            self.slots.remove_if(identity, |_, s| {
                Arc::strong_count(s) == 1 && s.current.lock().is_none()
            });
        }
        released
    }

    /// Number of identities with a tracked slot
    pub fn tracked_identities(&self) -> usize {
        self.slots.len()
    }
}

/// A held lease, released on drop
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    manager: &'a LeaseManager,
    identity: StreamIdentity,
    lease_id: Uuid,
}

impl LeaseGuard<'_> {
    /// Lease id, presented to storage on every guarded write
    pub fn lease_id(&self) -> Uuid {
        self.lease_id
    }

    /// Leased identity
    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    /// True while the lease has not expired or been taken over
    pub fn is_valid(&self) -> bool {
        self.manager.is_held(&self.identity, self.lease_id)
    }

    /// Fail if the lease was lost
    pub fn verify(&self) -> Result<(), LeaseError> {
        self.manager.verify(&self.identity, self.lease_id)
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if !self.manager.release(&self.identity, self.lease_id) {
            tracing::debug!(
                identity = %self.identity,
                lease_id = %self.lease_id,
                "lease already lost at release"
            );
        }
    }
}
