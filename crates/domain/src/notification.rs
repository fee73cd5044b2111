use std::{collections::BTreeMap, fmt::Display, str::FromStr};

/// How urgently the transport should wake the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPriority {
    High,
    Normal,
}

impl FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            _ => Err(format!("Unknown notification priority: {}", s)),
        }
    }
}

impl Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Transport level hints attached to a `Notification`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryHints {
    pub priority: NotificationPriority,
    /// For how long the transport should keep trying to reach an offline device
    pub ttl_secs: u64,
    /// Notifications sharing this key replace each other on the device instead of stacking
    pub collapse_key: String,
}

/// Transport independent push notification payload
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Routing metadata handed to the client app
    pub data: BTreeMap<String, String>,
    pub hints: DeliveryHints,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed { reason: String },
}

/// Result of delivering one `Notification` to one device token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub token: String,
    pub status: DeliveryStatus,
}

impl DeliveryOutcome {
    pub fn delivered(token: &str) -> Self {
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Delivered,
        }
    }

    pub fn failed(token: &str, reason: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}
