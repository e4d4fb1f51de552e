// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over the configured level. JSON output carries
/// the current span so `monitor_id` fields show up on every line of a check.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer().with_target(false).with_filter(env_filter).boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, json = json, "Structured logging initialized");

    Ok(())
}

/// Initialize Prometheus metrics exporter
///
/// Registered metrics:
/// - monitor_checks_total{outcome}: checks by outcome (success, fetch_error, timeout, persist_error, stale, cancelled)
/// - monitor_new_records_total: newly appeared records across all monitors
/// - notifications_total{outcome}: delivery attempts by outcome
/// - monitors_reaped_total: monitors deactivated for an expired travel date
/// - monitors_active: active monitors seen on the last tick
/// - monitor_check_duration_seconds: time spent fetching and diffing
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("monitor_checks_total", "Monitor checks by outcome");
    describe_counter!(
        "monitor_new_records_total",
        "Records reported as newly available"
    );
    describe_counter!("notifications_total", "Notification deliveries by outcome");
    describe_counter!(
        "monitors_reaped_total",
        "Monitors deactivated because their travel date passed"
    );
    describe_gauge!("monitors_active", "Active monitors seen on the last tick");
    describe_histogram!(
        "monitor_check_duration_seconds",
        "Duration of a single monitor check in seconds"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Outcome label for `monitor_checks_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Success,
    FetchError,
    Timeout,
    PersistError,
    /// The store refused the result: a newer check exists or the monitor is gone
    Stale,
    /// Queued check dropped because shutdown started before it got a worker
    Cancelled,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Success => "success",
            CheckOutcome::FetchError => "fetch_error",
            CheckOutcome::Timeout => "timeout",
            CheckOutcome::PersistError => "persist_error",
            CheckOutcome::Stale => "stale",
            CheckOutcome::Cancelled => "cancelled",
        }
    }
}

#[inline]
pub fn record_check(outcome: CheckOutcome, duration_seconds: f64) {
    counter!("monitor_checks_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("monitor_check_duration_seconds").record(duration_seconds);
}

#[inline]
pub fn record_new_records(count: usize) {
    counter!("monitor_new_records_total").increment(count as u64);
}

#[inline]
pub fn record_notification(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!("notifications_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_reaped(count: u64) {
    counter!("monitors_reaped_total").increment(count);
}

#[inline]
pub fn update_active_monitors(count: usize) {
    gauge!("monitors_active").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_valid_level() {
        // A second initialization in the same process reports an error
        let result = init_logging("info", true);
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_metrics_recording_without_exporter() {
        record_check(CheckOutcome::Success, 0.25);
        record_check(CheckOutcome::Timeout, 20.0);
        record_new_records(3);
        record_notification(true);
        record_notification(false);
        record_reaped(2);
        update_active_monitors(10);
    }

    #[test]
    fn test_check_outcome_labels() {
        assert_eq!(CheckOutcome::Success.as_str(), "success");
        assert_eq!(CheckOutcome::FetchError.as_str(), "fetch_error");
        assert_eq!(CheckOutcome::Timeout.as_str(), "timeout");
        assert_eq!(CheckOutcome::PersistError.as_str(), "persist_error");
        assert_eq!(CheckOutcome::Stale.as_str(), "stale");
        assert_eq!(CheckOutcome::Cancelled.as_str(), "cancelled");
    }
}
