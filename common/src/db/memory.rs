// In-process monitor store
//
// Same semantics as the PostgreSQL store, held behind a tokio RwLock. Used by
// tests and for running the engine without a database.

use crate::db::MonitorStore;
use crate::errors::PersistenceError;
use crate::models::{KnownIds, Monitor, MonitorId, NewMonitor};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: MonitorId,
    monitors: BTreeMap<MonitorId, Monitor>,
}

#[derive(Debug, Default)]
pub struct InMemoryMonitorStore {
    inner: RwLock<Inner>,
}

impl InMemoryMonitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a monitor regardless of its active flag
    pub async fn get(&self, id: MonitorId) -> Option<Monitor> {
        self.inner.read().await.monitors.get(&id).cloned()
    }
}

#[async_trait]
impl MonitorStore for InMemoryMonitorStore {
    async fn create(
        &self,
        monitor: &NewMonitor,
        primed_known_ids: &KnownIds,
    ) -> Result<MonitorId, PersistenceError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.monitors.insert(
            id,
            Monitor {
                id,
                owner_id: monitor.owner_id,
                destination_id: monitor.destination_id,
                params: monitor.params.clone(),
                interval: monitor.interval,
                last_check_at: None,
                known_ids: primed_known_ids.clone(),
                active: true,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn list_active_for_owner(&self, owner_id: i64) -> Result<Vec<Monitor>, PersistenceError> {
        let inner = self.inner.read().await;
        // Newest first, matching the SQL ordering
        Ok(inner
            .monitors
            .values()
            .rev()
            .filter(|m| m.active && m.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_all_active(&self) -> Result<Vec<Monitor>, PersistenceError> {
        let inner = self.inner.read().await;
        Ok(inner.monitors.values().filter(|m| m.active).cloned().collect())
    }

    async fn deactivate(&self, id: MonitorId) -> Result<bool, PersistenceError> {
        let mut inner = self.inner.write().await;
        match inner.monitors.get_mut(&id) {
            Some(monitor) if monitor.active => {
                monitor.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_all_for_owner(&self, owner_id: i64) -> Result<u64, PersistenceError> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for monitor in inner.monitors.values_mut() {
            if monitor.active && monitor.owner_id == owner_id {
                monitor.active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn deactivate_expired(&self, today: NaiveDate) -> Result<u64, PersistenceError> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for monitor in inner.monitors.values_mut() {
            if monitor.active && monitor.params.date < today {
                monitor.active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn record_check(
        &self,
        id: MonitorId,
        now: DateTime<Utc>,
        known_ids: &KnownIds,
    ) -> Result<bool, PersistenceError> {
        let mut inner = self.inner.write().await;
        let Some(monitor) = inner.monitors.get_mut(&id) else {
            return Ok(false);
        };
        if monitor.last_check_at.is_some_and(|last| last > now) {
            return Ok(false);
        }
        monitor.last_check_at = Some(now);
        monitor.known_ids = known_ids.clone();
        Ok(true)
    }
}
