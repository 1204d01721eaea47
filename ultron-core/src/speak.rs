//! Single-slot speaking exclusion.
//!
//! Only one synthesized response may be spoken at a time. Waiters park on a
//! one-permit semaphore and are woken in FIFO order; the permit is returned
//! when the `SpeakPermit` guard is dropped, on every exit path.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

/// Serializes spoken output across concurrently finishing tool calls.
#[derive(Clone)]
pub struct SpeakMutex {
    slot: Arc<Semaphore>,
}

/// Proof of holding the speaking slot. Releases on drop.
#[must_use = "the speaking slot is released as soon as the permit is dropped"]
pub struct SpeakPermit {
    _permit: OwnedSemaphorePermit,
}

impl SpeakMutex {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait until the slot is free and take it.
    pub async fn acquire(&self) -> SpeakPermit {
        let permit = match Arc::clone(&self.slot).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed.
            Err(_) => unreachable!("speak semaphore closed"),
        };
        trace!("Speak slot acquired");
        SpeakPermit { _permit: permit }
    }

    /// Take the slot if it is free right now.
    pub fn try_acquire(&self) -> Option<SpeakPermit> {
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => Some(SpeakPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Whether someone currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

impl Default for SpeakMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpeakMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakMutex")
            .field("busy", &self.is_busy())
            .finish()
    }
}
