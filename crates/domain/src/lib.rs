mod ack_policy;
mod composer;
mod notification;
mod reminder_job;
mod reminder_record;
mod scan_window;
mod shared;

pub use ack_policy::AckPolicy;
pub use composer::{collapse_key, NotificationComposer};
pub use notification::{
    DeliveryHints, DeliveryOutcome, DeliveryStatus, Notification, NotificationPriority,
};
pub use reminder_job::{LeadTime, ReminderAnchor, ReminderJob};
pub use reminder_record::{AckState, RecordDetails, RecordKind, ReminderRecord};
pub use scan_window::{min_tolerance_millis, ScanWindow};
pub use shared::entity::{Entity, ID};
pub use chrono_tz::Tz;
