use crate::shared::entity::{Entity, ID};
use std::{collections::HashMap, fmt::Display};

/// The collections the dispatcher scans for due reminders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Appointment,
    Task,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Task => "task",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind specific text fields. They are only used when composing the
/// notification and never take part in any scheduling decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDetails {
    Appointment {
        participant: Option<String>,
        description: Option<String>,
        provider: Option<String>,
    },
    Task {
        title: Option<String>,
    },
}

impl RecordDetails {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Appointment { .. } => RecordKind::Appointment,
            Self::Task { .. } => RecordKind::Task,
        }
    }
}

/// Delivery state of a `ReminderRecord` for one acknowledgment flag.
/// There is no transition out of `Acknowledged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    Pending,
    Acknowledged,
}

/// An appointment or task which should trigger push notifications to the
/// devices in `recipient_tokens` some time before it occurs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderRecord {
    pub id: ID,
    /// When the appointment or task takes place. Tasks may not have one.
    pub scheduled_ts: Option<i64>,
    /// Explicit reminder instant chosen by the owner of a task
    pub reminder_ts: Option<i64>,
    /// Tasks with reminders turned off are never selected
    pub reminder_enabled: bool,
    /// Acknowledgment flag name -> whether a notification was already sent.
    /// A missing entry means the notification has not been sent.
    pub acknowledgements: HashMap<String, bool>,
    /// Acknowledgment flag name -> timestamp assigned by the store when the flag was set
    pub acknowledged_at: HashMap<String, i64>,
    pub recipient_tokens: Vec<String>,
    pub details: RecordDetails,
}

impl ReminderRecord {
    pub fn appointment(scheduled_ts: i64) -> Self {
        Self {
            id: Default::default(),
            scheduled_ts: Some(scheduled_ts),
            reminder_ts: None,
            reminder_enabled: true,
            acknowledgements: Default::default(),
            acknowledged_at: Default::default(),
            recipient_tokens: Vec::new(),
            details: RecordDetails::Appointment {
                participant: None,
                description: None,
                provider: None,
            },
        }
    }

    pub fn task(reminder_ts: i64) -> Self {
        Self {
            id: Default::default(),
            scheduled_ts: None,
            reminder_ts: Some(reminder_ts),
            reminder_enabled: true,
            acknowledgements: Default::default(),
            acknowledged_at: Default::default(),
            recipient_tokens: Vec::new(),
            details: RecordDetails::Task { title: None },
        }
    }

    pub fn with_tokens(mut self, tokens: &[&str]) -> Self {
        self.recipient_tokens = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_details(mut self, details: RecordDetails) -> Self {
        self.details = details;
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.details.kind()
    }

    pub fn is_acknowledged(&self, ack_flag: &str) -> bool {
        self.acknowledgements
            .get(ack_flag)
            .copied()
            .unwrap_or(false)
    }

    pub fn ack_state(&self, ack_flag: &str) -> AckState {
        if self.is_acknowledged(ack_flag) {
            AckState::Acknowledged
        } else {
            AckState::Pending
        }
    }

    /// Marks the flag as sent. Returns false and leaves the record untouched
    /// if it was already acknowledged.
    pub fn acknowledge(&mut self, ack_flag: &str, acknowledged_ts: i64) -> bool {
        if self.is_acknowledged(ack_flag) {
            return false;
        }
        self.acknowledgements.insert(ack_flag.to_string(), true);
        self.acknowledged_at
            .insert(ack_flag.to_string(), acknowledged_ts);
        true
    }
}

impl Entity for ReminderRecord {
    fn id(&self) -> &ID {
        &self.id
    }
}
