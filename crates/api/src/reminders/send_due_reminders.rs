use crate::shared::usecase::UseCase;
use remindr_domain::{DeliveryStatus, ReminderJob};
use remindr_infra::{AcknowledgeResult, DueRecordsQuery, RemindrContext};
use tracing::{error, info, warn};

/// Sends the notifications of one `ReminderJob` for every record that is due
/// in the window around `now_ts`, and acknowledges them so that later scans
/// skip them.
#[derive(Debug)]
pub struct SendDueRemindersUseCase {
    pub job: ReminderJob,
    /// Instant the scan was triggered at
    pub now_ts: i64,
}

#[derive(Debug)]
pub enum UseCaseError {
    /// The due records could not be queried. Nothing was sent.
    StorageError(String),
}

/// What happened during one scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub matched: usize,
    pub skipped_without_tokens: usize,
    pub deliveries_succeeded: usize,
    pub deliveries_failed: usize,
    pub acknowledged: usize,
    /// Records another run acknowledged between the query and the write
    pub acknowledgment_conflicts: usize,
    pub acknowledgment_errors: usize,
    /// Records that were sent but not acknowledged because of the `AckPolicy`
    pub left_pending: usize,
}

#[async_trait::async_trait(?Send)]
impl UseCase for SendDueRemindersUseCase {
    type Response = ScanReport;

    type Errors = UseCaseError;

    const NAME: &'static str = "SendDueReminders";

    async fn execute(&mut self, ctx: &RemindrContext) -> Result<Self::Response, Self::Errors> {
        let job_name = self.job.name();
        let query = DueRecordsQuery::new(&self.job, self.now_ts);
        let records = ctx
            .repos
            .reminder_records
            .find_due(&query)
            .await
            .map_err(|e| UseCaseError::StorageError(e.to_string()))?;

        info!(
            job = %job_name,
            window_start = query.window.start_ts,
            window_end = query.window.end_ts,
            "Found {} due records",
            records.len()
        );

        let composer = ctx.config.composer();
        let mut report = ScanReport {
            matched: records.len(),
            ..Default::default()
        };

        for record in records {
            if record.recipient_tokens.is_empty() {
                warn!(
                    job = %job_name,
                    record_id = %record.id,
                    "Record has no device tokens, nothing to send"
                );
                report.skipped_without_tokens += 1;
                continue;
            }

            let notification = composer.compose(&self.job, &record);
            let outcomes = ctx
                .push
                .send(&notification, &record.recipient_tokens)
                .await;

            for outcome in &outcomes {
                match &outcome.status {
                    DeliveryStatus::Delivered => {
                        info!(job = %job_name, record_id = %record.id, token = %outcome.token, "Notification delivered");
                        report.deliveries_succeeded += 1;
                    }
                    DeliveryStatus::Failed { reason } => {
                        error!(job = %job_name, record_id = %record.id, token = %outcome.token, "Notification failed: {}", reason);
                        report.deliveries_failed += 1;
                    }
                }
            }

            if !ctx.config.ack_policy.should_acknowledge(&outcomes) {
                warn!(
                    job = %job_name,
                    record_id = %record.id,
                    "Not every token was delivered, leaving the record pending for the next scan"
                );
                report.left_pending += 1;
                continue;
            }

            match ctx
                .repos
                .reminder_records
                .acknowledge(record.kind(), &record.id, &self.job.ack_flag)
                .await
            {
                Ok(AcknowledgeResult::Acknowledged) => report.acknowledged += 1,
                Ok(AcknowledgeResult::AlreadyAcknowledged) => {
                    warn!(
                        job = %job_name,
                        record_id = %record.id,
                        "{} was already set by another run",
                        self.job.ack_flag
                    );
                    report.acknowledgment_conflicts += 1;
                }
                Ok(AcknowledgeResult::NotFound) => {
                    warn!(
                        job = %job_name,
                        record_id = %record.id,
                        "Record was removed before it could be acknowledged"
                    );
                    report.acknowledgment_errors += 1;
                }
                Err(e) => {
                    error!(
                        job = %job_name,
                        record_id = %record.id,
                        "Unable to set {}: {:?}",
                        self.job.ack_flag,
                        e
                    );
                    report.acknowledgment_errors += 1;
                }
            }
        }

        info!(job = %job_name, "Scan finished: {:?}", report);
        Ok(report)
    }
}
