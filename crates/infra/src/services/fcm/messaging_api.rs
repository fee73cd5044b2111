use remindr_domain::{Notification, NotificationPriority};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

// https://firebase.google.com/docs/reference/fcm/rest/v1/projects.messages/send

const FCM_API_BASE_URL: &str = "https://fcm.googleapis.com/v1/projects";
const FCM_ERROR_TYPE: &str = "type.googleapis.com/google.firebase.fcm.v1.FcmError";

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: MessageNotification<'a>,
    data: &'a BTreeMap<String, String>,
    android: AndroidConfig<'a>,
    apns: ApnsConfig,
}

#[derive(Debug, Serialize)]
struct MessageNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct AndroidConfig<'a> {
    priority: &'static str,
    ttl: String,
    collapse_key: &'a str,
}

#[derive(Debug, Serialize)]
struct ApnsConfig {
    headers: BTreeMap<&'static str, String>,
}

impl<'a> SendRequest<'a> {
    pub fn new(notification: &'a Notification, token: &'a str, now_secs: i64) -> Self {
        let hints = &notification.hints;
        let (android_priority, apns_priority) = match hints.priority {
            NotificationPriority::High => ("HIGH", "10"),
            NotificationPriority::Normal => ("NORMAL", "5"),
        };

        let mut headers = BTreeMap::new();
        headers.insert("apns-priority", apns_priority.to_string());
        headers.insert(
            "apns-expiration",
            (now_secs + hints.ttl_secs as i64).to_string(),
        );
        headers.insert("apns-collapse-id", hints.collapse_key.clone());

        Self {
            message: Message {
                token,
                notification: MessageNotification {
                    title: &notification.title,
                    body: &notification.body,
                },
                data: &notification.data,
                android: AndroidConfig {
                    priority: android_priority,
                    ttl: format!("{}s", hints.ttl_secs),
                    collapse_key: &hints.collapse_key,
                },
                apns: ApnsConfig { headers },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

/// Turns an FCM error response into a short failure reason, preferring the FCM
/// specific error code (e.g. `UNREGISTERED`) over the generic status
pub fn failure_reason(http_status: u16, body: &str) -> String {
    let res = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(res) => res.error,
        Err(_) => return format!("HTTP {}", http_status),
    };
    res.details
        .iter()
        .filter(|detail| detail.kind == FCM_ERROR_TYPE)
        .find_map(|detail| detail.error_code.clone())
        .or(res.status)
        .or(res.message)
        .unwrap_or_else(|| format!("HTTP {}", http_status))
}

pub struct FcmMessagingApi {
    client: Client,
    project_id: String,
}

impl FcmMessagingApi {
    pub fn new(client: Client, project_id: String) -> Self {
        Self { client, project_id }
    }

    /// Sends to a single device token. The error is the reason the token failed.
    pub async fn send(&self, access_token: &str, body: &SendRequest<'_>) -> Result<(), String> {
        let url = format!("{}/{}/messages:send", FCM_API_BASE_URL, self.project_id);
        let res = match self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", access_token))
            .json(body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                error!(
                    "[Network Error] FCM messages:send error. Error message: {:?}",
                    e
                );
                return Err(e.to_string());
            }
        };

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let text = res.text().await.unwrap_or_default();
        Err(failure_reason(status.as_u16(), &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remindr_domain::DeliveryHints;
    use serde_json::json;

    fn notification() -> Notification {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), "appointment".to_string());
        Notification {
            title: "Appointment reminder".into(),
            body: "Alice: don't forget your appointment on 22/02/2021 00:00.".into(),
            data,
            hints: DeliveryHints {
                priority: NotificationPriority::High,
                ttl_secs: 3600,
                collapse_key: "appointment-24h-abc".into(),
            },
        }
    }

    #[test]
    fn maps_hints_to_platform_options() {
        let notification = notification();
        let body = serde_json::to_value(SendRequest::new(&notification, "device-1", 1000)).unwrap();
        assert_eq!(
            body,
            json!({
                "message": {
                    "token": "device-1",
                    "notification": {
                        "title": "Appointment reminder",
                        "body": "Alice: don't forget your appointment on 22/02/2021 00:00."
                    },
                    "data": { "type": "appointment" },
                    "android": {
                        "priority": "HIGH",
                        "ttl": "3600s",
                        "collapse_key": "appointment-24h-abc"
                    },
                    "apns": {
                        "headers": {
                            "apns-collapse-id": "appointment-24h-abc",
                            "apns-expiration": "4600",
                            "apns-priority": "10"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn failure_reasons() {
        let unregistered = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        }"#;
        assert_eq!(failure_reason(404, unregistered), "UNREGISTERED");

        let invalid = r#"{ "error": { "code": 400, "status": "INVALID_ARGUMENT" } }"#;
        assert_eq!(failure_reason(400, invalid), "INVALID_ARGUMENT");

        assert_eq!(failure_reason(502, "<html>Bad gateway</html>"), "HTTP 502");
    }
}
