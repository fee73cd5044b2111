mod fcm;
mod inmemory;

pub use fcm::{FcmError, FcmPushGateway, ServiceAccountKey};
pub use inmemory::{InMemoryPushGateway, SentNotification};

use remindr_domain::{DeliveryOutcome, Notification};

/// Transport that pushes a `Notification` to device tokens
#[async_trait::async_trait]
pub trait IPushGateway: Send + Sync {
    /// Sends to every token and returns one outcome per token. A failing token
    /// does not affect the others.
    async fn send(&self, notification: &Notification, tokens: &[String]) -> Vec<DeliveryOutcome>;
}
