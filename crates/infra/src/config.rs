use remindr_domain::{
    min_tolerance_millis, AckPolicy, LeadTime, NotificationComposer, NotificationPriority,
    ReminderJob, Tz,
};
use std::{fmt::Display, str::FromStr};
use tracing::warn;

const DEFAULT_PORT: usize = 5000;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;
const DEFAULT_TIMEZONE: &str = "Europe/Paris";
const DEFAULT_APPOINTMENT_LEAD_TIMES_MINUTES: [i64; 2] = [24 * 60, 2 * 60];
const DEFAULT_TASK_LEAD_TIME_MINUTES: i64 = 0;
const DEFAULT_TOLERANCE_SECS: i64 = 60;
const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 60 * 60;
const DEFAULT_MAX_CONCURRENT_RUNS: usize = 1;
const DEFAULT_MAX_QUEUED_RUNS: usize = 2;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_PUSH_CONCURRENCY: usize = 8;
const DEFAULT_PUSH_REQUEST_TIMEOUT_SECS: u64 = 30;

const DAY_SECS: i64 = 24 * 60 * 60;
const MAX_SCAN_INTERVAL_SECS: u64 = DAY_SECS as u64;
const MAX_TOLERANCE_SECS: i64 = DAY_SECS;
const MAX_LEAD_TIME_MINUTES: i64 = 365 * 24 * 60;
// Longest time-to-live FCM accepts
const MAX_NOTIFICATION_TTL_SECS: u64 = 28 * DAY_SECS as u64;
const MAX_TIMEOUT_SECS: u64 = DAY_SECS as u64;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the health endpoint to listen on
    pub port: usize,
    /// How often every `ReminderJob` is triggered
    pub scan_interval_secs: u64,
    /// Timezone dates are rendered in inside notifications
    pub timezone: Tz,
    /// One appointment reminder is sent per lead time, e.g. 24h and 2h before
    pub appointment_lead_times: Vec<LeadTime>,
    /// Lead time before the reminder instant stored on a task
    pub task_lead_time: LeadTime,
    /// Half-width of the scan window. Never smaller than half of the scan
    /// interval, otherwise consecutive scans would leave gaps between their windows.
    pub tolerance_millis: i64,
    /// Time-to-live handed to the push transport
    pub notification_ttl_secs: u64,
    pub notification_priority: NotificationPriority,
    pub ack_policy: AckPolicy,
    /// Number of runs of the same job allowed to execute at the same time
    pub max_concurrent_runs: usize,
    /// Number of triggered runs of the same job allowed to wait for a permit.
    /// Ticks beyond that are skipped.
    pub max_queued_runs: usize,
    /// A run still going after this long is abandoned and releases its permit
    pub run_timeout_secs: u64,
    /// Number of device tokens of a single record delivered to in parallel
    pub push_concurrency: usize,
    /// Timeout of every request made to the push transport
    pub push_request_timeout_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key value source, falling back to the default
    /// of every setting that is missing or invalid.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let port = parse_or_default(&lookup, "PORT", DEFAULT_PORT);
        let scan_interval_secs = parse_in_range(
            &lookup,
            "REMINDER_SCAN_INTERVAL_SECS",
            DEFAULT_SCAN_INTERVAL_SECS,
            1,
            MAX_SCAN_INTERVAL_SECS,
        );

        let timezone = match lookup("REMINDER_TIMEZONE") {
            Some(tz) => match tz.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        "The given REMINDER_TIMEZONE: {} is not valid, falling back to the default: {}.",
                        tz, DEFAULT_TIMEZONE
                    );
                    chrono_tz::Europe::Paris
                }
            },
            None => chrono_tz::Europe::Paris,
        };

        let appointment_lead_times = match lookup("APPOINTMENT_LEAD_TIMES_MINUTES") {
            Some(value) => match parse_lead_times(&value) {
                Some(lead_times) => lead_times,
                None => {
                    warn!(
                        "The given APPOINTMENT_LEAD_TIMES_MINUTES: {} is not valid, falling back to the default: {:?}.",
                        value, DEFAULT_APPOINTMENT_LEAD_TIMES_MINUTES
                    );
                    default_appointment_lead_times()
                }
            },
            None => default_appointment_lead_times(),
        };

        let task_lead_time = LeadTime::from_minutes(parse_in_range(
            &lookup,
            "TASK_LEAD_TIME_MINUTES",
            DEFAULT_TASK_LEAD_TIME_MINUTES,
            0,
            MAX_LEAD_TIME_MINUTES,
        ));

        let tolerance_secs = parse_in_range(
            &lookup,
            "REMINDER_TOLERANCE_SECS",
            DEFAULT_TOLERANCE_SECS,
            -MAX_TOLERANCE_SECS,
            MAX_TOLERANCE_SECS,
        );
        let min_tolerance = min_tolerance_millis(scan_interval_secs as i64 * 1000);
        let mut tolerance_millis = tolerance_secs.abs() * 1000;
        if tolerance_millis < min_tolerance {
            warn!(
                "REMINDER_TOLERANCE_SECS: {} is smaller than half of the scan interval of {} secs and would leave reminders unsent. Raising it to {} millis.",
                tolerance_secs, scan_interval_secs, min_tolerance
            );
            tolerance_millis = min_tolerance;
        }

        let notification_ttl_secs = parse_in_range(
            &lookup,
            "NOTIFICATION_TTL_SECS",
            DEFAULT_NOTIFICATION_TTL_SECS,
            0,
            MAX_NOTIFICATION_TTL_SECS,
        );
        let notification_priority = parse_or_default(
            &lookup,
            "NOTIFICATION_PRIORITY",
            NotificationPriority::High,
        );
        let ack_policy = parse_or_default(&lookup, "REMINDER_ACK_POLICY", AckPolicy::default());
        let max_concurrent_runs = parse_or_default(
            &lookup,
            "REMINDER_MAX_CONCURRENT_RUNS",
            DEFAULT_MAX_CONCURRENT_RUNS,
        )
        .max(1);
        let max_queued_runs =
            parse_or_default(&lookup, "REMINDER_MAX_QUEUED_RUNS", DEFAULT_MAX_QUEUED_RUNS);
        let run_timeout_secs = parse_in_range(
            &lookup,
            "REMINDER_RUN_TIMEOUT_SECS",
            DEFAULT_RUN_TIMEOUT_SECS,
            1,
            MAX_TIMEOUT_SECS,
        );
        let push_concurrency =
            parse_or_default(&lookup, "PUSH_CONCURRENCY", DEFAULT_PUSH_CONCURRENCY).max(1);
        let push_request_timeout_secs = parse_in_range(
            &lookup,
            "PUSH_REQUEST_TIMEOUT_SECS",
            DEFAULT_PUSH_REQUEST_TIMEOUT_SECS,
            1,
            MAX_TIMEOUT_SECS,
        );

        Self {
            port,
            scan_interval_secs,
            timezone,
            appointment_lead_times,
            task_lead_time,
            tolerance_millis,
            notification_ttl_secs,
            notification_priority,
            ack_policy,
            max_concurrent_runs,
            max_queued_runs,
            run_timeout_secs,
            push_concurrency,
            push_request_timeout_secs,
        }
    }

    /// Every scan the dispatcher runs on each trigger
    pub fn reminder_jobs(&self) -> Vec<ReminderJob> {
        let mut jobs = self
            .appointment_lead_times
            .iter()
            .map(|lead_time| ReminderJob::appointment(*lead_time, self.tolerance_millis))
            .collect::<Vec<_>>();
        jobs.push(ReminderJob::task(self.task_lead_time, self.tolerance_millis));
        jobs
    }

    pub fn composer(&self) -> NotificationComposer {
        NotificationComposer::new(self.timezone, self.notification_ttl_secs)
            .with_priority(self.notification_priority)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn default_appointment_lead_times() -> Vec<LeadTime> {
    DEFAULT_APPOINTMENT_LEAD_TIMES_MINUTES
        .iter()
        .map(|minutes| LeadTime::from_minutes(*minutes))
        .collect()
}

/// Comma separated minutes, e.g. `1440,120`. Duplicates are removed.
fn parse_lead_times(value: &str) -> Option<Vec<LeadTime>> {
    let mut lead_times = Vec::new();
    for minutes in value.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        let minutes = minutes
            .parse::<i64>()
            .ok()
            .filter(|m| (0..=MAX_LEAD_TIME_MINUTES).contains(m))?;
        let lead_time = LeadTime::from_minutes(minutes);
        if !lead_times.contains(&lead_time) {
            lead_times.push(lead_time);
        }
    }
    if lead_times.is_empty() {
        None
    } else {
        Some(lead_times)
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
{
    match lookup(key) {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default: {}.",
                    key, value, default
                );
                default
            }
        },
        None => default,
    }
}

/// Like `parse_or_default`, but values outside of `min..=max` also fall back
fn parse_in_range<F, T>(lookup: &F, key: &str, default: T, min: T, max: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + PartialOrd + Copy,
{
    let value = parse_or_default(lookup, key, default);
    if value < min || value > max {
        warn!(
            "The given {}: {} is outside of {}..={}, falling back to the default: {}.",
            key, value, min, max, default
        );
        return default;
    }
    value
}
