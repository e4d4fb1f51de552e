// Monitor repository implementation backed by PostgreSQL

use super::queries::monitor_queries;
use crate::db::{DbPool, MonitorStore};
use crate::errors::PersistenceError;
use crate::models::{CheckInterval, KnownIds, Monitor, MonitorId, NewMonitor, QueryParams};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use tracing::instrument;

/// Repository for monitor-related database operations
#[derive(Debug, Clone)]
pub struct PgMonitorStore {
    pool: DbPool,
}

impl PgMonitorStore {
    /// Create a new PgMonitorStore
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn monitor_from_row(row: &PgRow) -> Result<Monitor, PersistenceError> {
        let interval_minutes: i32 = row.try_get("check_interval_minutes")?;
        let interval = u32::try_from(interval_minutes)
            .ok()
            .and_then(CheckInterval::from_minutes)
            .ok_or_else(|| {
                PersistenceError::Serialization(format!(
                    "Invalid check_interval_minutes: {}",
                    interval_minutes
                ))
            })?;
        let Json(known_ids): Json<KnownIds> = row.try_get("known_ids")?;

        Ok(Monitor {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            destination_id: row.try_get("destination_id")?,
            params: QueryParams {
                origin: row.try_get("origin_code")?,
                destination: row.try_get("destination_code")?,
                date: row.try_get("travel_date")?,
            },
            interval,
            last_check_at: row.try_get("last_check_at")?,
            known_ids,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl MonitorStore for PgMonitorStore {
    #[instrument(skip(self, monitor, primed_known_ids), fields(owner_id = monitor.owner_id))]
    async fn create(
        &self,
        monitor: &NewMonitor,
        primed_known_ids: &KnownIds,
    ) -> Result<MonitorId, PersistenceError> {
        let interval = i32::try_from(monitor.interval.minutes()).map_err(|_| {
            PersistenceError::Serialization(format!(
                "Interval out of range: {}",
                monitor.interval.minutes()
            ))
        })?;

        let id: MonitorId = sqlx::query_scalar(
            r#"
            INSERT INTO monitors (
                owner_id, destination_id, origin_code, destination_code,
                travel_date, check_interval_minutes, known_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(monitor.owner_id)
        .bind(monitor.destination_id)
        .bind(&monitor.params.origin)
        .bind(&monitor.params.destination)
        .bind(monitor.params.date)
        .bind(interval)
        .bind(Json(primed_known_ids))
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(
            monitor_id = id,
            primed = primed_known_ids.len(),
            "Monitor created"
        );
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn list_active_for_owner(&self, owner_id: i64) -> Result<Vec<Monitor>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM monitors WHERE owner_id = $1 AND active = true ORDER BY created_at DESC, id DESC",
            monitor_queries::SELECT_ALL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(self.pool.pool())
            .await?;

        rows.iter().map(Self::monitor_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_all_active(&self) -> Result<Vec<Monitor>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM monitors WHERE active = true ORDER BY id",
            monitor_queries::SELECT_ALL_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(self.pool.pool()).await?;

        let monitors = rows
            .iter()
            .map(Self::monitor_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = monitors.len(), "Loaded active monitors");
        Ok(monitors)
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, id: MonitorId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE monitors SET active = false WHERE id = $1 AND active = true")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            tracing::info!(monitor_id = id, "Monitor stopped");
        }
        Ok(changed)
    }

    #[instrument(skip(self))]
    async fn deactivate_all_for_owner(&self, owner_id: i64) -> Result<u64, PersistenceError> {
        let result =
            sqlx::query("UPDATE monitors SET active = false WHERE owner_id = $1 AND active = true")
                .bind(owner_id)
                .execute(self.pool.pool())
                .await?;

        tracing::info!(
            owner_id = owner_id,
            count = result.rows_affected(),
            "Stopped all monitors for owner"
        );
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn deactivate_expired(&self, today: NaiveDate) -> Result<u64, PersistenceError> {
        let result =
            sqlx::query("UPDATE monitors SET active = false WHERE travel_date < $1 AND active = true")
                .bind(today)
                .execute(self.pool.pool())
                .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, known_ids), fields(known = known_ids.len()))]
    async fn record_check(
        &self,
        id: MonitorId,
        now: DateTime<Utc>,
        known_ids: &KnownIds,
    ) -> Result<bool, PersistenceError> {
        // Single statement so last_check_at and known_ids commit together
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET last_check_at = $2, known_ids = $3
            WHERE id = $1 AND (last_check_at IS NULL OR last_check_at <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(Json(known_ids))
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
