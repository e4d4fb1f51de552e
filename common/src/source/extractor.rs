// Extraction of train records from e-ticket availability payloads

use super::{Extractor, Snapshot};
use crate::errors::FetchError;
use crate::models::{Record, SeatBreakdown, SeatOffer};
use serde::{Deserialize, Deserializer};

/// The API encodes most counters either as numbers or as numeric strings
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(u64),
    Float(f64),
    Text(String),
}

impl Lenient {
    fn to_u64(&self) -> Option<u64> {
        match self {
            Lenient::Number(n) => Some(*n),
            Lenient::Float(f) if *f >= 0.0 => Some(f.round() as u64),
            Lenient::Float(_) => None,
            Lenient::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Lenient::deserialize(deserializer)?;
    value
        .to_u64()
        .ok_or_else(|| serde::de::Error::custom("expected a non-negative number"))
}

fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Lenient>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.to_u64())
        .and_then(|n| u32::try_from(n).ok()))
}

#[derive(Deserialize)]
struct Payload {
    #[serde(rename = "hasError", default)]
    has_error: bool,
    #[serde(default)]
    direction: Vec<Direction>,
}

#[derive(Deserialize)]
struct Direction {
    #[serde(default)]
    trains: Vec<TrainGroup>,
}

#[derive(Deserialize)]
struct TrainGroup {
    #[serde(default)]
    train: Vec<Train>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Train {
    number: String,
    #[serde(default)]
    brand: Option<String>,
    departure: Moment,
    arrival: Moment,
    #[serde(default)]
    time_in_way: Option<String>,
    #[serde(default)]
    route: Option<Route>,
    #[serde(default)]
    places: Option<Places>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Moment {
    #[serde(default)]
    local_time: String,
    #[serde(default)]
    local_date: String,
}

#[derive(Deserialize)]
struct Route {
    #[serde(default)]
    station: Vec<String>,
}

#[derive(Deserialize)]
struct Places {
    #[serde(default)]
    cars: Vec<Car>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Car {
    #[serde(rename = "type", default)]
    car_type: String,
    #[serde(deserialize_with = "lenient_u64")]
    free_seats: u64,
    #[serde(default)]
    tariffs: Option<Tariffs>,
}

#[derive(Deserialize)]
struct Tariffs {
    #[serde(default)]
    tariff: Vec<Tariff>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tariff {
    #[serde(deserialize_with = "lenient_u64")]
    tariff: u64,
    // Field name is misspelled upstream
    #[serde(rename = "comissionFee", deserialize_with = "lenient_u64", default)]
    commission_fee: u64,
    #[serde(default)]
    seats: Option<Seats>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Seats {
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    seats_undef: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    seats_dn: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    seats_up: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    seats_lateral_dn: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    seats_lateral_up: Option<u32>,
}

impl From<Seats> for SeatBreakdown {
    fn from(seats: Seats) -> Self {
        SeatBreakdown {
            undefined: seats.seats_undef,
            lower: seats.seats_dn,
            upper: seats.seats_up,
            lateral_lower: seats.seats_lateral_dn,
            lateral_upper: seats.seats_lateral_up,
        }
    }
}

fn offer_from_car(car: Car) -> Option<SeatOffer> {
    // Only the first tariff is priced; cars without one cannot be booked
    let tariff = car.tariffs?.tariff.into_iter().next()?;
    Some(SeatOffer {
        car_type: car.car_type,
        free_seats: u32::try_from(car.free_seats).unwrap_or(u32::MAX),
        price: tariff.tariff.saturating_add(tariff.commission_fee),
        seats: tariff.seats.unwrap_or_default().into(),
    })
}

fn record_from_train(train: Train) -> Option<Record> {
    let cars = train.places.map(|p| p.cars).unwrap_or_default();
    let offers: Vec<SeatOffer> = cars.into_iter().filter_map(offer_from_car).collect();

    if offers.iter().all(|offer| offer.free_seats == 0) {
        return None;
    }

    let stations = train.route.map(|r| r.station).unwrap_or_default();
    Some(Record {
        id: train.number,
        brand: train.brand.unwrap_or_default(),
        departure_date: train.departure.local_date,
        departure_time: train.departure.local_time,
        arrival_date: train.arrival.local_date,
        arrival_time: train.arrival.local_time,
        time_in_way: train.time_in_way.unwrap_or_default(),
        route_from: stations.first().cloned().unwrap_or_default(),
        route_to: stations.last().cloned().unwrap_or_default(),
        offers,
    })
}

/// Extractor for the e-ticket "space between stations" payload
#[derive(Debug, Clone, Copy, Default)]
pub struct RailwayExtractor;

impl Extractor for RailwayExtractor {
    fn to_records(&self, snapshot: &Snapshot) -> Result<Vec<Record>, FetchError> {
        let payload = Payload::deserialize(&snapshot.body)?;
        if payload.has_error {
            return Err(FetchError::Upstream);
        }

        // The forward direction is always the first entry
        let direction = payload
            .direction
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed("response has no direction".to_string()))?;

        let records = direction
            .trains
            .into_iter()
            .flat_map(|group| group.train)
            .filter_map(record_from_train)
            .collect::<Vec<_>>();

        tracing::debug!(records = records.len(), "Extracted records from snapshot");
        Ok(records)
    }
}
