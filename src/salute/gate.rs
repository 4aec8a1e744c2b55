use crate::error::SaluteError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded counting semaphore shared by every outbound call.
///
/// A slot is held for exactly one HTTP attempt and is released when the permit drops,
/// whether the attempt succeeded, failed or was cancelled.
#[derive(Debug, Clone)]
pub struct RequestGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl RequestGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot. Fails only after [`RequestGate::close`].
    pub async fn enter(&self) -> Result<OwnedSemaphorePermit, SaluteError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SaluteError::Stopped)
    }

    /// Rejects all current waiters and future callers.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}
