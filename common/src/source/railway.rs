// Railway e-ticket availability client

use super::{ExternalQuery, Snapshot};
use crate::config::RailwayConfig;
use crate::errors::FetchError;
use crate::models::QueryParams;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

const AVAILABILITY_PATH: &str = "/api/v3/trains/availability/space/between/stations";

/// Wire format of travel dates on the e-ticket API
pub const DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRequest<'a> {
    direction: [DirectionRequest; 1],
    station_from: &'a str,
    station_to: &'a str,
    detail_num_places: u8,
    show_without_places: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectionRequest {
    dep_date: String,
    fullday: bool,
    #[serde(rename = "type")]
    direction_type: &'static str,
}

/// RailwayClient queries seat availability between two stations
pub struct RailwayClient {
    client: Client,
    base_url: String,
    api_token: String,
    language: String,
    timeout_seconds: u64,
}

impl RailwayClient {
    /// Create a new client with the configured request timeout
    pub fn new(config: &RailwayConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            language: config.language.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn headers(&self) -> Result<HeaderMap, FetchError> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            FetchError::Http(format!("Invalid header value: {}", e))
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&self.language).map_err(invalid)?,
        );
        headers.insert("device-type", HeaderValue::from_static("BROWSER"));
        headers.insert(
            "x-xsrf-token",
            HeaderValue::from_str(&self.api_token).map_err(invalid)?,
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("XSRF-TOKEN={}", self.api_token)).map_err(invalid)?,
        );
        Ok(headers)
    }
}

/// Strip the `express` wrapper the API currently puts around the payload
fn unwrap_payload(body: serde_json::Value) -> serde_json::Value {
    match body {
        serde_json::Value::Object(mut map)
            if map.get("express").is_some_and(|inner| inner.is_object()) =>
        {
            map.remove("express").unwrap_or_default()
        }
        other => other,
    }
}

#[async_trait]
impl ExternalQuery for RailwayClient {
    #[instrument(skip(self), fields(origin = %params.origin, destination = %params.destination, date = %params.date))]
    async fn fetch(&self, params: &QueryParams) -> Result<Snapshot, FetchError> {
        let request = AvailabilityRequest {
            direction: [DirectionRequest {
                dep_date: params.date.format(DATE_FORMAT).to_string(),
                fullday: true,
                direction_type: "Forward",
            }],
            station_from: &params.origin,
            station_to: &params.destination,
            detail_num_places: 1,
            show_without_places: 0,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, AVAILABILITY_PATH))
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout_seconds)
                } else {
                    FetchError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Availability request rejected");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let bytes = response.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        let body = unwrap_payload(body);

        if body.get("hasError").and_then(|v| v.as_bool()).unwrap_or(false) {
            tracing::warn!("Availability API reported an error");
            return Err(FetchError::Upstream);
        }

        tracing::debug!(response_bytes = bytes.len(), "Availability snapshot fetched");
        Ok(Snapshot::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> RailwayConfig {
        RailwayConfig {
            base_url: base_url.to_string(),
            api_token: "xsrf-token".to_string(),
            timeout_seconds: 2,
            language: "uz".to_string(),
        }
    }

    fn params() -> QueryParams {
        QueryParams {
            origin: "2900000".to_string(),
            destination: "2900800".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 31).unwrap(),
        }
    }

    #[test]
    fn test_unwrap_payload() {
        let wrapped = json!({"express": {"hasError": false, "direction": []}});
        assert_eq!(unwrap_payload(wrapped), json!({"hasError": false, "direction": []}));

        let direct = json!({"hasError": false});
        assert_eq!(unwrap_payload(direct.clone()), direct);
    }

    #[tokio::test]
    async fn test_fetch_sends_query_and_unwraps_express() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(AVAILABILITY_PATH))
            .and(header("X-XSRF-TOKEN", "xsrf-token"))
            .and(body_partial_json(json!({
                "stationFrom": "2900000",
                "stationTo": "2900800",
                "direction": [{"depDate": "31.10.2025", "fullday": true, "type": "Forward"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "express": {"hasError": false, "direction": [{"trains": []}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RailwayClient::new(&config(&server.uri())).unwrap();
        let snapshot = client.fetch(&params()).await.unwrap();
        assert_eq!(snapshot.body["direction"][0]["trains"], json!([]));
    }

    #[tokio::test]
    async fn test_fetch_has_error_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "express": {"hasError": true}
            })))
            .mount(&server)
            .await;

        let client = RailwayClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch(&params()).await;
        assert!(matches!(result, Err(FetchError::Upstream)));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = RailwayClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch(&params()).await;
        assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_fetch_non_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = RailwayClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch(&params()).await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"hasError": false}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = RailwayClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch(&params()).await;
        assert!(matches!(result, Err(FetchError::Timeout(2))));
    }
}
