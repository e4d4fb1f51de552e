// Deactivation of monitors whose travel date has passed

use crate::db::MonitorStore;
use crate::errors::PersistenceError;
use crate::telemetry;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::instrument;

/// Calendar date of `now` in the given timezone
pub fn local_date(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn MonitorStore>,
    timezone: Tz,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn MonitorStore>, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Deactivate every active monitor dated strictly before today
    ///
    /// Only ever moves `active` from true to false, so it is idempotent and may
    /// run alongside a scheduling pass.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let today = local_date(now, self.timezone);
        let count = self.store.deactivate_expired(today).await?;
        if count > 0 {
            telemetry::record_reaped(count);
            tracing::info!(count = count, today = %today, "Cleaned up expired monitors");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryMonitorStore;
    use crate::models::{CheckInterval, KnownIds, NewMonitor, QueryParams};
    use chrono::TimeZone;

    fn new_monitor(date: NaiveDate) -> NewMonitor {
        NewMonitor {
            owner_id: 1,
            destination_id: 1,
            params: QueryParams {
                origin: "2900000".to_string(),
                destination: "2900700".to_string(),
                date,
            },
            interval: CheckInterval::from_minutes(5).unwrap(),
        }
    }

    #[test]
    fn test_local_date_crosses_midnight_in_timezone() {
        // 20:30 UTC is already the next day in Tashkent (UTC+5)
        let now = Utc.with_ymd_and_hms(2025, 10, 15, 20, 30, 0).unwrap();
        assert_eq!(
            local_date(now, chrono_tz::Asia::Tashkent),
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
        );
        assert_eq!(
            local_date(now, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
        );
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = Arc::new(InMemoryMonitorStore::new());
        let yesterday = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        let expired = store.create(&new_monitor(yesterday), &KnownIds::new()).await.unwrap();
        let current = store.create(&new_monitor(today), &KnownIds::new()).await.unwrap();

        let reaper = ExpiryReaper::new(store.clone(), chrono_tz::UTC);
        let now = Utc.with_ymd_and_hms(2025, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(reaper.sweep(now).await.unwrap(), 1);
        assert_eq!(reaper.sweep(now).await.unwrap(), 0);

        assert!(!store.get(expired).await.unwrap().active);
        assert!(store.get(current).await.unwrap().active);
    }
}
