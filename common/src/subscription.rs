// Subscription adapter between the conversational layer and the monitor store

use crate::db::MonitorStore;
use crate::detector::ChangeDetector;
use crate::errors::{SubscriptionError, ValidationError};
use crate::models::{KnownIds, Monitor, MonitorId, NewMonitor, QueryParams, Record};
use crate::reaper::local_date;
use crate::stations;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::instrument;

/// Create, list and stop monitors on behalf of a subscriber
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn MonitorStore>,
    detector: ChangeDetector,
    timezone: Tz,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn MonitorStore>, detector: ChangeDetector, timezone: Tz) -> Self {
        Self {
            store,
            detector,
            timezone,
        }
    }

    /// Check a query against the station table and the current date
    pub fn validate(&self, params: &QueryParams, now: DateTime<Utc>) -> Result<(), ValidationError> {
        for code in [&params.origin, &params.destination] {
            if stations::by_code(code).is_none() {
                return Err(ValidationError::UnknownStation(code.clone()));
            }
        }
        if params.origin == params.destination {
            return Err(ValidationError::SameStation);
        }
        if params.date < local_date(now, self.timezone) {
            return Err(ValidationError::DateInPast(params.date));
        }
        Ok(())
    }

    /// One-off lookup of what is bookable right now
    #[instrument(skip(self))]
    pub async fn search(&self, params: &QueryParams) -> Result<Vec<Record>, SubscriptionError> {
        self.validate(params, Utc::now())?;
        Ok(self.detector.snapshot(params).await?)
    }

    /// Create a monitor primed with the currently visible records
    ///
    /// Priming is best effort: if the fetch fails the monitor starts with an
    /// empty baseline and the first check reports everything it sees.
    #[instrument(skip(self, request), fields(owner_id = request.owner_id))]
    pub async fn subscribe(&self, request: NewMonitor) -> Result<MonitorId, SubscriptionError> {
        self.validate(&request.params, Utc::now())?;
        tracing::info!(
            origin = stations::display_name(&request.params.origin),
            destination = stations::display_name(&request.params.destination),
            date = %request.params.date,
            interval_minutes = request.interval.minutes(),
            "Creating monitor"
        );

        let primed = match self.detector.snapshot(&request.params).await {
            Ok(records) => {
                let ids: KnownIds = records.into_iter().map(|r| r.id).collect();
                tracing::info!(primed = ids.len(), "Initialized monitor baseline");
                ids
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not fetch baseline, starting empty");
                KnownIds::new()
            }
        };

        Ok(self.store.create(&request, &primed).await?)
    }

    pub async fn list(&self, owner_id: i64) -> Result<Vec<Monitor>, SubscriptionError> {
        Ok(self.store.list_active_for_owner(owner_id).await?)
    }

    /// Stop one of the owner's monitors; `false` if it is not theirs or not active
    #[instrument(skip(self))]
    pub async fn stop(&self, owner_id: i64, id: MonitorId) -> Result<bool, SubscriptionError> {
        let owned = self
            .store
            .list_active_for_owner(owner_id)
            .await?
            .iter()
            .any(|m| m.id == id);
        if !owned {
            return Ok(false);
        }
        Ok(self.store.deactivate(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn stop_all(&self, owner_id: i64) -> Result<u64, SubscriptionError> {
        Ok(self.store.deactivate_all_for_owner(owner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryMonitorStore;
    use crate::errors::FetchError;
    use crate::models::CheckInterval;
    use crate::source::{Extractor, ExternalQuery, Snapshot};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    /// Serves a fixed list of ids, or fails when `None`
    struct FixedQuery(Option<Vec<&'static str>>);

    #[async_trait]
    impl ExternalQuery for FixedQuery {
        async fn fetch(&self, _params: &QueryParams) -> Result<Snapshot, FetchError> {
            match &self.0 {
                Some(ids) => Ok(Snapshot::new(json!(ids))),
                None => Err(FetchError::Timeout(20)),
            }
        }
    }

    struct IdExtractor;

    impl Extractor for IdExtractor {
        fn to_records(&self, snapshot: &Snapshot) -> Result<Vec<Record>, FetchError> {
            let ids: Vec<String> = serde_json::from_value(snapshot.body.clone())
                .map_err(|e| FetchError::Malformed(e.to_string()))?;
            Ok(ids
                .into_iter()
                .map(|id| Record {
                    id,
                    brand: String::new(),
                    departure_date: String::new(),
                    departure_time: String::new(),
                    arrival_date: String::new(),
                    arrival_time: String::new(),
                    time_in_way: String::new(),
                    route_from: String::new(),
                    route_to: String::new(),
                    offers: Vec::new(),
                })
                .collect())
        }
    }

    fn service(ids: Option<Vec<&'static str>>) -> (Arc<InMemoryMonitorStore>, SubscriptionService) {
        let store = Arc::new(InMemoryMonitorStore::new());
        let detector = ChangeDetector::new(Arc::new(FixedQuery(ids)), Arc::new(IdExtractor));
        let service = SubscriptionService::new(store.clone(), detector, chrono_tz::Asia::Tashkent);
        (store, service)
    }

    fn future_date() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(10)
    }

    fn request(owner_id: i64, origin: &str, destination: &str, date: NaiveDate) -> NewMonitor {
        NewMonitor {
            owner_id,
            destination_id: owner_id,
            params: QueryParams {
                origin: origin.to_string(),
                destination: destination.to_string(),
                date,
            },
            interval: CheckInterval::from_minutes(5).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_primes_known_ids() {
        let (store, service) = service(Some(vec!["100", "101"]));
        let id = service
            .subscribe(request(1, "2900000", "2900800", future_date()))
            .await
            .unwrap();

        let monitor = store.get(id).await.unwrap();
        assert_eq!(monitor.known_ids, ["100", "101"].into_iter().collect::<KnownIds>());
        assert!(monitor.last_check_at.is_none());
        assert!(monitor.active);
    }

    #[tokio::test]
    async fn test_subscribe_starts_empty_when_priming_fails() {
        let (store, service) = service(None);
        let id = service
            .subscribe(request(1, "2900000", "2900800", future_date()))
            .await
            .unwrap();
        assert!(store.get(id).await.unwrap().known_ids.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_queries() {
        let (store, service) = service(Some(Vec::new()));

        let err = service
            .subscribe(request(1, "0000000", "2900800", future_date()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::Validation(ValidationError::UnknownStation(ref code)) if code == "0000000"
        ));

        let err = service
            .subscribe(request(1, "2900800", "2900800", future_date()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Validation(ValidationError::SameStation)));

        let past = Utc::now().date_naive() - Duration::days(3);
        let err = service
            .subscribe(request(1, "2900000", "2900800", past))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Validation(ValidationError::DateInPast(_))));

        assert!(store.list_all_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_surfaces_fetch_errors() {
        let (_, service) = service(None);
        let params = request(1, "2900000", "2900800", future_date()).params;
        let err = service.search(&params).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Fetch(_)));
        assert_eq!(err.user_message(), "Something went wrong. Please try again later.");
    }

    #[tokio::test]
    async fn test_stop_only_affects_own_monitors() {
        let (store, service) = service(Some(Vec::new()));
        let mine = service
            .subscribe(request(1, "2900000", "2900800", future_date()))
            .await
            .unwrap();
        let theirs = service
            .subscribe(request(2, "2900000", "2900700", future_date()))
            .await
            .unwrap();

        assert!(!service.stop(1, theirs).await.unwrap());
        assert!(store.get(theirs).await.unwrap().active);

        assert!(service.stop(1, mine).await.unwrap());
        assert!(!service.stop(1, mine).await.unwrap());
        assert!(service.list(1).await.unwrap().is_empty());
        assert_eq!(service.list(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_deactivates_every_owned_monitor() {
        let (_, service) = service(Some(Vec::new()));
        for destination in ["2900800", "2900700", "2900172"] {
            service
                .subscribe(request(7, "2900000", destination, future_date()))
                .await
                .unwrap();
        }
        service
            .subscribe(request(8, "2900000", "2900800", future_date()))
            .await
            .unwrap();

        assert_eq!(service.stop_all(7).await.unwrap(), 3);
        assert_eq!(service.stop_all(7).await.unwrap(), 0);
        assert!(service.list(7).await.unwrap().is_empty());
        assert_eq!(service.list(8).await.unwrap().len(), 1);
    }
}
