// Scheduler binary entry point

use anyhow::Result;
use common::bootstrap;
use common::scheduler::{Scheduler, SchedulerConfig, SchedulerEngine};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = bootstrap::load_settings()?;
    bootstrap::init_observability(&settings)?;

    info!(
        tick_seconds = settings.scheduler.tick_seconds,
        timezone = %settings.scheduler.timezone,
        "Starting Railwatch scheduler"
    );

    let db_pool = bootstrap::init_database_pool(&settings).await?;
    let components = bootstrap::init_components(&settings, db_pool.clone())?;

    let scheduler = Arc::new(SchedulerEngine::new(
        SchedulerConfig::from(&settings.scheduler),
        components.store.clone(),
        components.detector.clone(),
        components.notifier.clone(),
        components.reaper.clone(),
    ));
    info!("Scheduler engine created");

    let scheduler_for_shutdown = scheduler.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown");
        if let Err(e) = scheduler_for_shutdown.stop().await {
            error!(error = %e, "Error during scheduler shutdown");
        }
    });

    let result = scheduler.start().await;
    db_pool.close().await;

    if let Err(e) = result {
        error!(error = %e, "Scheduler error");
        return Err(anyhow::anyhow!(e));
    }

    info!("Scheduler stopped");
    Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
