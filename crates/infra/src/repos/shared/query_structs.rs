use remindr_domain::{ReminderJob, ReminderRecord, ScanWindow};

/// Records a `ReminderJob` should notify about within one scan window
#[derive(Debug, Clone)]
pub struct DueRecordsQuery {
    pub job: ReminderJob,
    pub window: ScanWindow,
}

impl DueRecordsQuery {
    pub fn new(job: &ReminderJob, now_ts: i64) -> Self {
        Self {
            window: job.window(now_ts),
            job: job.clone(),
        }
    }

    pub fn matches(&self, record: &ReminderRecord) -> bool {
        self.job.selects(record, &self.window)
    }
}
