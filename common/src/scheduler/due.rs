// Due-monitor selection

use crate::models::{CheckInterval, Monitor};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A monitor is due when it was never checked or its interval has fully elapsed
pub fn is_due(monitor: &Monitor, now: DateTime<Utc>) -> bool {
    match monitor.last_check_at {
        None => true,
        Some(last) => now.signed_duration_since(last) >= monitor.interval.as_duration(),
    }
}

/// Group active monitors by check interval, shortest interval first
pub fn partition_by_interval(monitors: &[Monitor]) -> BTreeMap<CheckInterval, Vec<&Monitor>> {
    let mut groups: BTreeMap<CheckInterval, Vec<&Monitor>> = BTreeMap::new();
    for monitor in monitors.iter().filter(|m| m.active) {
        groups.entry(monitor.interval).or_default().push(monitor);
    }
    groups
}

/// Monitors that should be checked at `now`
///
/// Pure function of its inputs, so it can be exercised without a running loop.
pub fn due_monitors(now: DateTime<Utc>, monitors: &[Monitor]) -> Vec<Monitor> {
    partition_by_interval(monitors)
        .into_values()
        .flatten()
        .filter(|monitor| is_due(monitor, now))
        .cloned()
        .collect()
}
