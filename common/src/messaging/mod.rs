// Outbound messaging to subscribers

pub mod telegram;

pub use telegram::TelegramGateway;

use crate::errors::DeliveryError;
use async_trait::async_trait;

/// Largest message body the gateway accepts in one call
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A channel that can deliver plain-text messages to a destination
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send one message of at most [`MAX_MESSAGE_CHARS`] characters
    async fn send(&self, destination_id: i64, text: &str) -> Result<(), DeliveryError>;
}
