use crate::{
    notification::{DeliveryHints, Notification, NotificationPriority},
    reminder_job::ReminderJob,
    reminder_record::{RecordDetails, ReminderRecord},
};
use chrono::prelude::*;
use chrono_tz::Tz;
use std::collections::BTreeMap;

const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";
const APPOINTMENT_SCREEN: &str = "/screens/agenda";
const TASK_SCREEN: &str = "tasks";
const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Builds the push notification for a due `ReminderRecord`.
///
/// Composition never fails: missing or blank display fields fall back to
/// neutral wording.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    timezone: Tz,
    ttl_secs: u64,
    priority: NotificationPriority,
}

impl NotificationComposer {
    pub fn new(timezone: Tz, ttl_secs: u64) -> Self {
        Self {
            timezone,
            ttl_secs,
            priority: NotificationPriority::High,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn compose(&self, job: &ReminderJob, record: &ReminderRecord) -> Notification {
        let (title, body, screen) = match &record.details {
            RecordDetails::Appointment {
                participant,
                description,
                provider,
            } => {
                let participant = non_blank(participant).unwrap_or("Reminder");
                let description = match non_blank(description) {
                    Some(description) => format!("your appointment {}", description),
                    None => "your appointment".to_string(),
                };
                let provider = match non_blank(provider) {
                    Some(provider) => format!(" with Dr {}", provider),
                    None => String::new(),
                };
                let when = match self.format_date(record.scheduled_ts) {
                    Some(date) => format!("on {}", date),
                    None => "soon".to_string(),
                };
                let body = format!(
                    "{}: don't forget {} {}{}.",
                    participant, description, when, provider
                );
                ("Appointment reminder".to_string(), body, APPOINTMENT_SCREEN)
            }
            RecordDetails::Task { title } => {
                let title = non_blank(title).unwrap_or("untitled task");
                let due = match self.format_date(record.scheduled_ts) {
                    Some(date) => format!("due on {}", date),
                    None => "due soon".to_string(),
                };
                let body = format!("Don't forget your task: {}, {}.", title, due);
                ("Task reminder".to_string(), body, TASK_SCREEN)
            }
        };

        let mut data = BTreeMap::new();
        data.insert("click_action".to_string(), CLICK_ACTION.to_string());
        data.insert("type".to_string(), record.kind().to_string());
        data.insert("screen".to_string(), screen.to_string());
        data.insert("docId".to_string(), record.id.as_string());
        data.insert("leadTime".to_string(), job.lead_time.label());

        Notification {
            title,
            body,
            data,
            hints: DeliveryHints {
                priority: self.priority,
                ttl_secs: self.ttl_secs,
                collapse_key: collapse_key(job, record),
            },
        }
    }

    fn format_date(&self, ts: Option<i64>) -> Option<String> {
        ts.and_then(|ts| self.timezone.timestamp_millis_opt(ts).single())
            .map(|date| date.format(DATE_FORMAT).to_string())
    }
}

/// Same for every scan that picks up the record for this job, so duplicate
/// sends from overlapping windows collapse on the device.
pub fn collapse_key(job: &ReminderJob, record: &ReminderRecord) -> String {
    format!("{}-{}-{}", job.kind, job.lead_time, record.id)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
