// Error handling framework

use thiserror::Error;

/// Persistence errors raised by monitor stores
///
/// A failed write never leaves a monitor partially updated: every mutation is a
/// single statement that either commits fully or not at all.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Transient failures while querying the external availability source
///
/// Any of these leaves the monitor's `last_check_at` and known ids untouched;
/// the next due tick retries naturally.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream reported an error")]
    Upstream,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Delivery timed out")]
    Timeout,

    #[error("Message rejected (status {status}): {description}")]
    Rejected { status: u16, description: String },
}

/// Validation errors for subscription requests
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown station code: {0}")]
    UnknownStation(String),

    #[error("Origin and destination must differ")]
    SameStation,

    #[error("Travel date {0} is in the past")]
    DateInPast(chrono::NaiveDate),
}

/// Errors surfaced by the subscription adapter to the conversational layer
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl SubscriptionError {
    /// Text safe to show to the subscriber.
    ///
    /// Validation problems are explained; infrastructure failures collapse to a
    /// generic retry hint so internal details never reach the chat.
    pub fn user_message(&self) -> String {
        match self {
            SubscriptionError::Validation(err) => err.to_string(),
            SubscriptionError::Persistence(_) | SubscriptionError::Fetch(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::ConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => PersistenceError::QueryFailed(db_err.message().to_string()),
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PersistenceError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PersistenceError::MigrationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_timeout_display() {
        let err = FetchError::Timeout(20);
        assert!(err.to_string().contains("20 seconds"));
    }

    #[test]
    fn test_validation_error_passes_through_to_user() {
        let err: SubscriptionError = ValidationError::SameStation.into();
        assert_eq!(err.user_message(), "Origin and destination must differ");
    }

    #[test]
    fn test_infrastructure_errors_are_generic_for_user() {
        let err: SubscriptionError = PersistenceError::QueryFailed("boom".to_string()).into();
        assert!(err.user_message().contains("try again"));
        assert!(!err.user_message().contains("boom"));

        let err: SubscriptionError = FetchError::Upstream.into();
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: PersistenceError = json_err.into();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }
}
