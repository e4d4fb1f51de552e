use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::num::NonZeroU32;

/// Store-assigned monitor identifier
pub type MonitorId = i64;

/// Stable identifier of a record within a query result (the train number)
pub type RecordId = String;

// ============================================================================
// Monitor Models
// ============================================================================

/// What a monitor watches: one route on one calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
}

/// How often a monitor is checked, in whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckInterval(NonZeroU32);

impl CheckInterval {
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        NonZeroU32::new(minutes).map(Self)
    }

    pub fn minutes(&self) -> u32 {
        self.0.get()
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.0.get()))
    }
}

/// Record ids seen on the last successful check
///
/// The set is only ever replaced wholesale by the result of a new check, never
/// merged, so an id that drops out and later returns counts as new again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownIds(BTreeSet<RecordId>);

impl KnownIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordId> {
        self.0.iter()
    }

    /// Ids in `self` that are absent from `previous`
    pub fn difference(&self, previous: &KnownIds) -> KnownIds {
        KnownIds(self.0.difference(&previous.0).cloned().collect())
    }
}

impl<S: Into<RecordId>> FromIterator<S> for KnownIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KnownIds(iter.into_iter().map(Into::into).collect())
    }
}

/// Request to create a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMonitor {
    pub owner_id: i64,
    pub destination_id: i64,
    pub params: QueryParams,
    pub interval: CheckInterval,
}

/// Monitor is a persistent subscription to one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub owner_id: i64,
    pub destination_id: i64,
    pub params: QueryParams,
    pub interval: CheckInterval,
    pub last_check_at: Option<DateTime<Utc>>,
    pub known_ids: KnownIds,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Record Models
// ============================================================================

/// Free seats by berth position, as reported for a car's first tariff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatBreakdown {
    pub undefined: Option<u32>,
    pub lower: Option<u32>,
    pub upper: Option<u32>,
    pub lateral_lower: Option<u32>,
    pub lateral_upper: Option<u32>,
}

/// One purchasable car class on a train
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatOffer {
    pub car_type: String,
    pub free_seats: u32,
    /// Tariff plus commission fee
    pub price: u64,
    pub seats: SeatBreakdown,
}

/// One train with available seats in a query snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub brand: String,
    pub departure_date: String,
    pub departure_time: String,
    pub arrival_date: String,
    pub arrival_time: String,
    pub time_in_way: String,
    pub route_from: String,
    pub route_to: String,
    pub offers: Vec<SeatOffer>,
}

impl Record {
    pub fn total_free_seats(&self) -> u32 {
        self.offers.iter().map(|offer| offer.free_seats).sum()
    }

    /// Cheapest and most expensive offer, if any
    pub fn price_range(&self) -> Option<(u64, u64)> {
        let min = self.offers.iter().map(|offer| offer.price).min()?;
        let max = self.offers.iter().map(|offer| offer.price).max()?;
        Some((min, max))
    }
}
