// Monitor store abstraction

use crate::errors::PersistenceError;
use crate::models::{KnownIds, Monitor, MonitorId, NewMonitor};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};

/// Persistent CRUD over monitors
///
/// Every operation is atomic with respect to a single monitor. Deactivation is
/// terminal: no operation moves `active` back to `true`, and rows are never
/// deleted.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Insert a monitor with its primed baseline and return the assigned id
    async fn create(
        &self,
        monitor: &NewMonitor,
        primed_known_ids: &KnownIds,
    ) -> Result<MonitorId, PersistenceError>;

    /// Active monitors for one owner, newest first
    async fn list_active_for_owner(&self, owner_id: i64) -> Result<Vec<Monitor>, PersistenceError>;

    /// All active monitors
    async fn list_all_active(&self) -> Result<Vec<Monitor>, PersistenceError>;

    /// Deactivate one monitor; returns whether it was active before
    async fn deactivate(&self, id: MonitorId) -> Result<bool, PersistenceError>;

    /// Deactivate every active monitor of an owner; returns how many changed
    async fn deactivate_all_for_owner(&self, owner_id: i64) -> Result<u64, PersistenceError>;

    /// Deactivate active monitors whose travel date is before `today`
    async fn deactivate_expired(&self, today: NaiveDate) -> Result<u64, PersistenceError>;

    /// Commit a successful check: `last_check_at` and the replacement known-set
    /// are written together.
    ///
    /// Returns `false` when nothing was written, either because the monitor is
    /// unknown or because a check with a later timestamp has already been
    /// recorded.
    async fn record_check(
        &self,
        id: MonitorId,
        now: DateTime<chrono::Utc>,
        known_ids: &KnownIds,
    ) -> Result<bool, PersistenceError>;
}
