use super::IPushGateway;
use remindr_domain::{DeliveryOutcome, Notification};
use std::{collections::HashMap, sync::Mutex};

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub notification: Notification,
    pub tokens: Vec<String>,
}

/// Gateway that only records what it was asked to send. Every token is
/// delivered unless it was registered with `fail_token`.
pub struct InMemoryPushGateway {
    sent: Mutex<Vec<SentNotification>>,
    failing_tokens: Mutex<HashMap<String, String>>,
}

impl InMemoryPushGateway {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_token(&self, token: &str, reason: &str) {
        self.failing_tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), reason.to_string());
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for InMemoryPushGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IPushGateway for InMemoryPushGateway {
    async fn send(&self, notification: &Notification, tokens: &[String]) -> Vec<DeliveryOutcome> {
        self.sent.lock().unwrap().push(SentNotification {
            notification: notification.clone(),
            tokens: tokens.to_vec(),
        });

        let failing_tokens = self.failing_tokens.lock().unwrap();
        tokens
            .iter()
            .map(|token| match failing_tokens.get(token) {
                Some(reason) => DeliveryOutcome::failed(token, reason.as_str()),
                None => DeliveryOutcome::delivered(token),
            })
            .collect()
    }
}
