// Notification rendering and dispatch

use crate::errors::DeliveryError;
use crate::messaging::{MessagingGateway, MAX_MESSAGE_CHARS};
use crate::models::Record;
use crate::telemetry;
use std::sync::Arc;
use tracing::instrument;

/// Format an amount with comma thousands separators
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compact human summary of a record
pub fn format_summary(record: &Record) -> String {
    let price = match record.price_range() {
        Some((min, max)) if min == max => format!("from {} so'm", format_amount(min)),
        Some((min, max)) => format!("from {}-{} so'm", format_amount(min), format_amount(max)),
        None => "n/a".to_string(),
    };

    let mut lines = Vec::with_capacity(6);
    if record.brand.is_empty() {
        lines.push(format!("Train {}", record.id));
    } else {
        lines.push(format!("Train {} ({})", record.id, record.brand));
    }
    if !record.route_from.is_empty() || !record.route_to.is_empty() {
        lines.push(format!("Route: {} → {}", record.route_from, record.route_to));
    }
    lines.push(format!(
        "Departure: {} {}",
        record.departure_time, record.departure_date
    ));
    lines.push(format!("Arrival: {} {}", record.arrival_time, record.arrival_date));
    lines.push(format!("Seats: {}", record.total_free_seats()));
    lines.push(format!("Price: {}", price));
    lines.join("\n")
}

/// Split text into chunks of at most `limit` characters
///
/// Breaks at the last newline inside the window when there is one, otherwise
/// hard-splits on a character boundary.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(idx) if idx > 0 => idx,
            _ => window_end,
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].strip_prefix('\n').unwrap_or(&rest[cut..]);
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Renders records and hands them to the messaging gateway
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn MessagingGateway>,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { gateway }
    }

    pub fn render(record: &Record) -> String {
        format!("🔔 New train available!\n\n{}", format_summary(record))
    }

    /// Deliver one record notification
    ///
    /// Failures are returned, not retried. The record is already part of the
    /// monitor's known-set, so a failed delivery is not attempted again.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn dispatch(&self, destination_id: i64, record: &Record) -> Result<(), DeliveryError> {
        let text = Self::render(record);
        for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
            if let Err(e) = self.gateway.send(destination_id, &chunk).await {
                telemetry::record_notification(false);
                return Err(e);
            }
        }

        telemetry::record_notification(true);
        tracing::info!(destination_id = destination_id, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SeatBreakdown, SeatOffer};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct RecordingGateway {
        sent: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessagingGateway for RecordingGateway {
        async fn send(&self, destination_id: i64, text: &str) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Timeout);
            }
            self.sent.lock().await.push((destination_id, text.to_string()));
            Ok(())
        }
    }

    fn record(prices: &[(u32, u64)]) -> Record {
        Record {
            id: "762Ф".to_string(),
            brand: "Afrosiyob".to_string(),
            departure_date: "31.10.2025".to_string(),
            departure_time: "07:28".to_string(),
            arrival_date: "31.10.2025".to_string(),
            arrival_time: "09:38".to_string(),
            time_in_way: "02:10".to_string(),
            route_from: "TOSHKENT".to_string(),
            route_to: "BUXORO".to_string(),
            offers: prices
                .iter()
                .map(|&(free_seats, price)| SeatOffer {
                    car_type: "Ekonom".to_string(),
                    free_seats,
                    price,
                    seats: SeatBreakdown::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_000), "1,000");
        assert_eq!(format_amount(272_700), "272,700");
        assert_eq!(format_amount(1_234_567), "1,234,567");
    }

    #[test]
    fn test_summary_single_price() {
        let summary = format_summary(&record(&[(3, 270_000), (4, 270_000)]));
        assert!(summary.starts_with("Train 762Ф (Afrosiyob)"));
        assert!(summary.contains("Seats: 7"));
        assert!(summary.contains("Price: from 270,000 so'm"));
    }

    #[test]
    fn test_summary_price_range() {
        let summary = format_summary(&record(&[(3, 353_500), (12, 272_700)]));
        assert!(summary.contains("Seats: 15"));
        assert!(summary.contains("Price: from 272,700-353,500 so'm"));
        assert!(summary.contains("Route: TOSHKENT → BUXORO"));
    }

    #[test]
    fn test_split_short_message_is_single_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ж".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn test_dispatch_sends_rendered_summary() {
        let gateway = Arc::new(RecordingGateway {
            sent: Mutex::new(Vec::new()),
            fail: false,
        });
        let notifier = Notifier::new(gateway.clone());
        notifier.dispatch(42, &record(&[(1, 100)])).await.unwrap();

        let sent = gateway.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.starts_with("🔔 New train available!"));
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_delivery_error() {
        let gateway = Arc::new(RecordingGateway {
            sent: Mutex::new(Vec::new()),
            fail: true,
        });
        let notifier = Notifier::new(gateway);
        let result = notifier.dispatch(42, &record(&[(1, 100)])).await;
        assert!(matches!(result, Err(DeliveryError::Timeout)));
    }
}
