// Bootstrap utilities for binary initialization

use crate::config::Settings;
use crate::db::{DbPool, MonitorStore, PgMonitorStore};
use crate::detector::ChangeDetector;
use crate::messaging::TelegramGateway;
use crate::notifier::Notifier;
use crate::reaper::ExpiryReaper;
use crate::source::{RailwayClient, RailwayExtractor};
use crate::subscription::SubscriptionService;
use crate::telemetry;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;

/// Load settings and refuse to start on an invalid configuration
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(settings)
}

/// Initialize logging and, when a port is configured, the metrics exporter
pub fn init_observability(settings: &Settings) -> Result<()> {
    let observability = &settings.observability;
    telemetry::init_logging(&observability.log_level, observability.json_logs)?;
    if let Some(port) = observability.metrics_port {
        telemetry::init_metrics(port)?;
    }
    Ok(())
}

/// Initialize database pool and apply pending migrations
///
/// # Errors
/// Returns error if the database is unreachable or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;
    db_pool
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    db_pool
        .health_check()
        .await
        .context("Database health check failed")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Runtime collaborators shared by the scheduler and the subscription surface
#[derive(Clone)]
pub struct Components {
    pub store: Arc<dyn MonitorStore>,
    pub detector: ChangeDetector,
    pub notifier: Notifier,
    pub reaper: ExpiryReaper,
    pub timezone: Tz,
}

impl Components {
    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.store.clone(), self.detector.clone(), self.timezone)
    }
}

/// Wire the railway client, Telegram gateway and Postgres store together
///
/// # Errors
/// Returns error if an HTTP client cannot be built or the timezone is unknown
pub fn init_components(settings: &Settings, db_pool: DbPool) -> Result<Components> {
    let timezone = settings
        .scheduler
        .timezone()
        .map_err(|e| anyhow::anyhow!(e))?;

    let store = Arc::new(PgMonitorStore::new(db_pool)) as Arc<dyn MonitorStore>;

    let client = RailwayClient::new(&settings.railway).context("Failed to build railway client")?;
    let detector = ChangeDetector::new(Arc::new(client), Arc::new(RailwayExtractor));

    let gateway =
        TelegramGateway::new(&settings.telegram).context("Failed to build Telegram gateway")?;
    let notifier = Notifier::new(Arc::new(gateway));

    let reaper = ExpiryReaper::new(store.clone(), timezone);

    info!(
        railway_base_url = %settings.railway.base_url,
        timezone = %timezone,
        "Runtime components initialized"
    );

    Ok(Components {
        store,
        detector,
        notifier,
        reaper,
        timezone,
    })
}
