mod auth_provider;
mod messaging_api;

pub use auth_provider::ServiceAccountKey;

use super::IPushGateway;
use auth_provider::AuthProvider;
use chrono::Utc;
use futures::{stream, Future, StreamExt};
use messaging_api::{FcmMessagingApi, SendRequest};
use remindr_domain::{DeliveryOutcome, Notification};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum FcmError {
    #[error("unable to read the service account key at {path}: {source}")]
    ReadKey {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid service account key: {0}")]
    InvalidKey(#[from] serde_json::Error),
    #[error("invalid service account private key: {0}")]
    InvalidPrivateKey(jsonwebtoken::errors::Error),
    #[error("unable to sign the token assertion: {0}")]
    Assertion(jsonwebtoken::errors::Error),
    #[error("access token exchange failed: {0}")]
    TokenExchange(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Firebase Cloud Messaging HTTP v1 transport. Each token gets its own
/// `messages:send` request, at most `concurrency` of them in flight.
pub struct FcmPushGateway {
    auth: AuthProvider,
    api: FcmMessagingApi,
    concurrency: usize,
}

impl FcmPushGateway {
    /// Every request to Google is abandoned after `request_timeout`
    pub fn new(
        key: ServiceAccountKey,
        concurrency: usize,
        request_timeout: Duration,
    ) -> Result<Self, FcmError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        let api = FcmMessagingApi::new(client.clone(), key.project_id.clone());
        let auth = AuthProvider::new(key, client)?;
        Ok(Self {
            auth,
            api,
            concurrency: concurrency.max(1),
        })
    }

    pub fn from_service_account_file(
        path: &str,
        concurrency: usize,
        request_timeout: Duration,
    ) -> Result<Self, FcmError> {
        Self::new(ServiceAccountKey::from_file(path)?, concurrency, request_timeout)
    }
}

#[async_trait::async_trait]
impl IPushGateway for FcmPushGateway {
    async fn send(&self, notification: &Notification, tokens: &[String]) -> Vec<DeliveryOutcome> {
        let access_token = match self.auth.get_access_token().await {
            Ok(access_token) => access_token,
            Err(e) => {
                error!(
                    "Unable to get an FCM access token for project {}. Error: {}",
                    self.auth.project_id(),
                    e
                );
                let reason = e.to_string();
                return tokens
                    .iter()
                    .map(|token| DeliveryOutcome::failed(token, reason.as_str()))
                    .collect();
            }
        };

        let now_secs = Utc::now().timestamp();
        let access_token = access_token.as_str();
        deliver_all(tokens, self.concurrency, move |token| async move {
            let body = SendRequest::new(notification, token, now_secs);
            match self.api.send(access_token, &body).await {
                Ok(()) => DeliveryOutcome::delivered(token),
                Err(reason) => DeliveryOutcome::failed(token, reason),
            }
        })
        .await
    }
}

/// Runs `deliver` for every token with at most `concurrency` of them in flight.
/// The outcomes are in the same order as `tokens`.
async fn deliver_all<'a, F, Fut>(
    tokens: &'a [String],
    concurrency: usize,
    deliver: F,
) -> Vec<DeliveryOutcome>
where
    F: Fn(&'a String) -> Fut,
    Fut: Future<Output = DeliveryOutcome>,
{
    let sends: Vec<_> = tokens.iter().map(deliver).collect();
    stream::iter(sends).buffered(concurrency.max(1)).collect().await
}
