//! Bounded admission for generation requests
//!
//! A request either gets a permit immediately or is rejected as busy; nothing
//! waits in line.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Rejection returned when every permit is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("System busy, try again in a moment")]
pub struct Busy;

/// Permit held for the duration of one admitted request
///
/// Dropping the permit frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Admit a request or reject it without waiting
    pub fn try_admit(&self) -> Result<AdmissionPermit, Busy> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map(|permit| AdmissionPermit { _permit: permit })
            .map_err(|_| Busy)
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
