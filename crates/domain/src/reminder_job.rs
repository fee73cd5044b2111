use crate::{
    reminder_record::{RecordKind, ReminderRecord},
    scan_window::ScanWindow,
};
use std::fmt::Display;

const SECOND_MILLIS: i64 = 1000;
const MINUTE_MILLIS: i64 = 60 * SECOND_MILLIS;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;

/// Which timestamp of a `ReminderRecord` the lead time is counted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAnchor {
    /// The time the appointment or task takes place
    ScheduledAt,
    /// The reminder instant stored on the record itself
    ReminderAt,
}

impl ReminderAnchor {
    pub fn timestamp(&self, record: &ReminderRecord) -> Option<i64> {
        match self {
            Self::ScheduledAt => record.scheduled_ts,
            Self::ReminderAt => record.reminder_ts,
        }
    }
}

/// How long before the anchor instant a notification should fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeadTime {
    millis: i64,
}

impl LeadTime {
    pub fn from_millis(millis: i64) -> Self {
        Self {
            millis: millis.max(0),
        }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::from_millis(minutes * MINUTE_MILLIS)
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Compact label used in flag names, collapse keys and logs, e.g. `24h` or `90m`
    pub fn label(&self) -> String {
        if self.millis % HOUR_MILLIS == 0 && self.millis > 0 {
            format!("{}h", self.millis / HOUR_MILLIS)
        } else if self.millis % MINUTE_MILLIS == 0 {
            format!("{}m", self.millis / MINUTE_MILLIS)
        } else {
            format!("{}s", self.millis / SECOND_MILLIS)
        }
    }
}

impl Display for LeadTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One scan configuration: which records to look at, which window around
/// which instant makes them due, and which acknowledgment flag guards them.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderJob {
    pub kind: RecordKind,
    pub anchor: ReminderAnchor,
    pub lead_time: LeadTime,
    /// Half-width of the window around the target instant
    pub tolerance_millis: i64,
    pub ack_flag: String,
}

impl ReminderJob {
    /// Appointment reminder fired `lead_time` before the appointment, guarded by
    /// the `notificationSent{label}` flag (e.g. `notificationSent24h`)
    pub fn appointment(lead_time: LeadTime, tolerance_millis: i64) -> Self {
        Self {
            kind: RecordKind::Appointment,
            anchor: ReminderAnchor::ScheduledAt,
            ack_flag: format!("notificationSent{}", lead_time.label()),
            lead_time,
            tolerance_millis,
        }
    }

    /// Task reminder fired `lead_time` before the reminder instant stored on the task
    pub fn task(lead_time: LeadTime, tolerance_millis: i64) -> Self {
        let ack_flag = if lead_time.as_millis() == 0 {
            "reminderSent".to_string()
        } else {
            format!("reminderSent{}", lead_time.label())
        };
        Self {
            kind: RecordKind::Task,
            anchor: ReminderAnchor::ReminderAt,
            lead_time,
            tolerance_millis,
            ack_flag,
        }
    }

    pub fn name(&self) -> String {
        format!("{}-{}", self.kind, self.lead_time)
    }

    /// The window a scan triggered at `now_ts` is responsible for
    pub fn window(&self, now_ts: i64) -> ScanWindow {
        ScanWindow::around(now_ts + self.lead_time.as_millis(), self.tolerance_millis)
    }

    /// Whether `record` is due and still unacknowledged for a scan over `window`
    pub fn selects(&self, record: &ReminderRecord, window: &ScanWindow) -> bool {
        if record.kind() != self.kind || record.is_acknowledged(&self.ack_flag) {
            return false;
        }
        if self.kind == RecordKind::Task && !record.reminder_enabled {
            return false;
        }
        match self.anchor.timestamp(record) {
            Some(ts) => window.contains(ts),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1613862000000;

    #[test]
    fn labels() {
        assert_eq!(LeadTime::from_minutes(24 * 60).label(), "24h");
        assert_eq!(LeadTime::from_minutes(120).label(), "2h");
        assert_eq!(LeadTime::from_minutes(90).label(), "90m");
        assert_eq!(LeadTime::from_minutes(0).label(), "0m");
        assert_eq!(LeadTime::from_millis(1500).label(), "1s");
        assert_eq!(LeadTime::from_minutes(-5).as_millis(), 0);
    }

    #[test]
    fn flag_names() {
        let tol = 60 * 1000;
        assert_eq!(
            ReminderJob::appointment(LeadTime::from_minutes(24 * 60), tol).ack_flag,
            "notificationSent24h"
        );
        assert_eq!(
            ReminderJob::appointment(LeadTime::from_minutes(120), tol).ack_flag,
            "notificationSent2h"
        );
        assert_eq!(
            ReminderJob::task(LeadTime::from_minutes(0), tol).ack_flag,
            "reminderSent"
        );
        assert_eq!(
            ReminderJob::task(LeadTime::from_minutes(15), tol).ack_flag,
            "reminderSent15m"
        );
    }

    #[test]
    fn appointment_window_is_anchored_on_scheduled_time() {
        let job = ReminderJob::appointment(LeadTime::from_minutes(24 * 60), 60 * 1000);
        let window = job.window(NOW);
        let due = ReminderRecord::appointment(NOW + 24 * HOUR_MILLIS + 30 * 1000);
        let too_late = ReminderRecord::appointment(NOW + 24 * HOUR_MILLIS + 61 * 1000);
        let too_early = ReminderRecord::appointment(NOW + 2 * HOUR_MILLIS);
        assert!(job.selects(&due, &window));
        assert!(!job.selects(&too_late, &window));
        assert!(!job.selects(&too_early, &window));
    }

    #[test]
    fn acknowledged_records_are_not_selected() {
        let job = ReminderJob::appointment(LeadTime::from_minutes(120), 60 * 1000);
        let window = job.window(NOW);
        let mut record = ReminderRecord::appointment(NOW + 2 * HOUR_MILLIS);
        assert!(job.selects(&record, &window));
        record.acknowledge(&job.ack_flag, NOW);
        assert!(!job.selects(&record, &window));

        // Acknowledging another offset does not matter
        let other = ReminderJob::appointment(LeadTime::from_minutes(24 * 60), 60 * 1000);
        let mut record = ReminderRecord::appointment(NOW + 2 * HOUR_MILLIS);
        record.acknowledge(&other.ack_flag, NOW);
        assert!(job.selects(&record, &window));
    }

    #[test]
    fn disabled_tasks_are_never_selected() {
        let job = ReminderJob::task(LeadTime::from_minutes(0), 60 * 1000);
        let window = job.window(NOW);
        let mut task = ReminderRecord::task(NOW + 10 * 1000);
        assert!(job.selects(&task, &window));
        task.reminder_enabled = false;
        assert!(!job.selects(&task, &window));
    }

    #[test]
    fn kinds_do_not_mix() {
        let job = ReminderJob::task(LeadTime::from_minutes(0), 60 * 1000);
        let window = job.window(NOW);
        let mut appointment = ReminderRecord::appointment(NOW);
        appointment.reminder_ts = Some(NOW);
        assert!(!job.selects(&appointment, &window));
    }

    #[test]
    fn task_without_reminder_instant_is_not_selected() {
        let job = ReminderJob::task(LeadTime::from_minutes(0), 60 * 1000);
        let mut task = ReminderRecord::task(NOW);
        task.reminder_ts = None;
        task.scheduled_ts = Some(NOW);
        assert!(!job.selects(&task, &job.window(NOW)));
    }
}
