use super::FcmError;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

// https://developers.google.com/identity/protocols/oauth2/service-account#httprest

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const ASSERTION_LIFETIME_SECS: i64 = 60 * 60;

/// The parts of a Google service account JSON key needed to talk to FCM
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, FcmError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &str) -> Result<Self, FcmError> {
        let json = std::fs::read_to_string(path).map_err(|source| FcmError::ReadKey {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    // Access token expires in specified in seconds
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_ts: i64,
}

/// Hands out OAuth access tokens for the service account and keeps the current
/// one until it is about to expire
pub struct AuthProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl AuthProvider {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, FcmError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(FcmError::InvalidPrivateKey)?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    pub async fn get_access_token(&self) -> Result<String, FcmError> {
        // Held across the exchange so that concurrent callers wait for one refresh
        let mut cached = self.cached.lock().await;

        let now = Utc::now().timestamp_millis();
        let one_minute_in_millis = 1000 * 60;
        if let Some(token) = cached.as_ref() {
            if now + one_minute_in_millis <= token.expires_ts {
                return Ok(token.access_token.clone());
            }
        }

        let tokens = self.exchange_assertion(now / 1000).await?;
        info!(
            "Refreshed FCM access token, expires in {} secs",
            tokens.expires_in
        );
        let access_token = tokens.access_token.clone();
        *cached = Some(CachedToken {
            access_token: tokens.access_token,
            expires_ts: now + tokens.expires_in * 1000,
        });
        Ok(access_token)
    }

    fn create_assertion(&self, now_secs: i64) -> Result<String, FcmError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.key.token_uri,
            iat: now_secs,
            exp: now_secs + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key).map_err(FcmError::Assertion)
    }

    async fn exchange_assertion(&self, now_secs: i64) -> Result<TokenResponse, FcmError> {
        let assertion = self.create_assertion(now_secs)?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];
        let res = self
            .client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FcmError::TokenExchange(format!("{}: {}", status, body)));
        }

        Ok(res.json::<TokenResponse>().await?)
    }
}
