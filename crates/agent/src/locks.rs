use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use propbot_core::domain::lead::LeadId;

/// One async mutex per lead. Messages for the same lead are processed one at
/// a time; different leads never contend.
#[derive(Default)]
pub struct LeadLocks {
    locks: std::sync::Mutex<HashMap<LeadId, Arc<Mutex<()>>>>,
}

/// Held for the whole read-merge-write of one message.
pub struct LeadGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LeadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, lead_id: &LeadId) -> LeadGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on can go.
            locks.retain(|id, lock| id == lead_id || Arc::strong_count(lock) > 1);
            locks.entry(lead_id.clone()).or_default().clone()
        };
        LeadGuard { _guard: lock.lock_owned().await }
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
