use crate::notification::DeliveryOutcome;
use std::{fmt::Display, str::FromStr};

/// Decides whether a record is acknowledged after its notification was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Acknowledge once delivery was attempted, whatever the per-token outcome
    AfterAttempt,
    /// Acknowledge only if every token was delivered, otherwise leave the
    /// record pending so the next scan sends to all of its tokens again
    AllDelivered,
}

impl AckPolicy {
    pub fn should_acknowledge(&self, outcomes: &[DeliveryOutcome]) -> bool {
        match self {
            Self::AfterAttempt => true,
            Self::AllDelivered => outcomes.iter().all(|o| o.is_delivered()),
        }
    }
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self::AfterAttempt
    }
}

impl Display for AckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AfterAttempt => write!(f, "after_attempt"),
            Self::AllDelivered => write!(f, "all_delivered"),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "after_attempt" => Ok(Self::AfterAttempt),
            "all_delivered" => Ok(Self::AllDelivered),
            other => Err(format!("unknown acknowledgment policy: {}", other)),
        }
    }
}
