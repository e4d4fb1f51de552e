// Change detection over opaque record identifiers

use crate::errors::FetchError;
use crate::models::{KnownIds, Monitor, QueryParams, Record};
use crate::source::{Extractor, ExternalQuery};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Result of one successful check
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    /// Records whose id was not in the previous known-set, in snapshot order
    pub new_records: Vec<Record>,
    /// Every id in the live snapshot; replaces the stored known-set wholesale
    pub known_ids: KnownIds,
}

impl ChangeSet {
    pub fn has_new_records(&self) -> bool {
        !self.new_records.is_empty()
    }
}

/// Compare a live record list against the previously known ids
///
/// Only identity matters: a known record whose fields changed is not new. The
/// returned known-set is the live set, not a union, so ids that vanished are
/// forgotten and will be reported again if they come back.
pub fn diff(records: Vec<Record>, previous: &KnownIds) -> ChangeSet {
    let known_ids: KnownIds = records.iter().map(|r| r.id.clone()).collect();

    let mut reported = HashSet::new();
    let new_records = records
        .into_iter()
        .filter(|r| !previous.contains(&r.id))
        .filter(|r| reported.insert(r.id.clone()))
        .collect();

    ChangeSet {
        new_records,
        known_ids,
    }
}

/// Queries the external source and diffs the result against a monitor
#[derive(Clone)]
pub struct ChangeDetector {
    query: Arc<dyn ExternalQuery>,
    extractor: Arc<dyn Extractor>,
}

impl ChangeDetector {
    pub fn new(query: Arc<dyn ExternalQuery>, extractor: Arc<dyn Extractor>) -> Self {
        Self { query, extractor }
    }

    /// Fetch and extract the records currently visible for `params`
    pub async fn snapshot(&self, params: &QueryParams) -> Result<Vec<Record>, FetchError> {
        let snapshot = self.query.fetch(params).await?;
        self.extractor.to_records(&snapshot)
    }

    /// Check a monitor for newly appeared records
    ///
    /// On error nothing about the monitor may change; the caller keeps the
    /// stored `last_check_at` and known ids as they are.
    #[instrument(skip(self, monitor), fields(monitor_id = monitor.id))]
    pub async fn check(&self, monitor: &Monitor) -> Result<ChangeSet, FetchError> {
        let records = self.snapshot(&monitor.params).await?;
        let changes = diff(records, &monitor.known_ids);

        tracing::debug!(
            live = changes.known_ids.len(),
            new = changes.new_records.len(),
            "Monitor checked"
        );
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            brand: "Sharq".to_string(),
            departure_date: "31.10.2025".to_string(),
            departure_time: "08:00".to_string(),
            arrival_date: "31.10.2025".to_string(),
            arrival_time: "12:00".to_string(),
            time_in_way: "04:00".to_string(),
            route_from: "TOSHKENT".to_string(),
            route_to: "BUXORO".to_string(),
            offers: Vec::new(),
        }
    }

    fn ids(changes: &ChangeSet) -> Vec<&str> {
        changes.new_records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_diff_reports_only_unseen_ids() {
        let known: KnownIds = ["100", "101"].into_iter().collect();
        let changes = diff(vec![record("100"), record("102")], &known);
        assert_eq!(ids(&changes), vec!["102"]);
        assert_eq!(changes.known_ids, ["100", "102"].into_iter().collect::<KnownIds>());
    }

    #[test]
    fn test_diff_replaces_rather_than_merges() {
        let known: KnownIds = ["100", "102"].into_iter().collect();
        let changes = diff(vec![record("102")], &known);
        assert!(!changes.has_new_records());
        assert_eq!(changes.known_ids, ["102"].into_iter().collect::<KnownIds>());
    }

    #[test]
    fn test_diff_ignores_content_changes() {
        let known: KnownIds = ["100"].into_iter().collect();
        let mut changed = record("100");
        changed.departure_time = "09:15".to_string();
        assert!(!diff(vec![changed], &known).has_new_records());
    }

    #[test]
    fn test_diff_reports_duplicate_ids_once() {
        let changes = diff(vec![record("7"), record("7")], &KnownIds::new());
        assert_eq!(ids(&changes), vec!["7"]);
        assert_eq!(changes.known_ids.len(), 1);
    }

    #[test]
    fn test_diff_empty_snapshot_forgets_everything() {
        let known: KnownIds = ["1", "2"].into_iter().collect();
        let changes = diff(Vec::new(), &known);
        assert!(!changes.has_new_records());
        assert!(changes.known_ids.is_empty());
    }
}
