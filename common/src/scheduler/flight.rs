// In-memory single-flight tracking keyed by monitor id

use crate::models::MonitorId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of monitor ids with a check currently in progress
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<MonitorId>>>,
}

fn lock(ids: &Mutex<HashSet<MonitorId>>) -> MutexGuard<'_, HashSet<MonitorId>> {
    // The set holds plain ids; a panic while holding the lock cannot corrupt it
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if a check for it is already running
    pub fn try_claim(&self, id: MonitorId) -> Option<FlightGuard> {
        if lock(&self.ids).insert(id) {
            Some(FlightGuard {
                id,
                ids: Arc::clone(&self.ids),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: MonitorId) -> bool {
        lock(&self.ids).contains(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the claim when dropped, whether the check finished, timed out,
/// panicked or was aborted
#[derive(Debug)]
pub struct FlightGuard {
    id: MonitorId,
    ids: Arc<Mutex<HashSet<MonitorId>>>,
}

impl FlightGuard {
    pub fn id(&self) -> MonitorId {
        self.id
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.ids).remove(&self.id);
    }
}
