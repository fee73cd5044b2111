mod inmemory;
mod mongo;

pub use inmemory::InMemoryReminderRecordRepo;
pub use mongo::MongoReminderRecordRepo;

use crate::repos::shared::query_structs::DueRecordsQuery;
use remindr_domain::{RecordKind, ReminderRecord, ID};

/// Result of a conditional acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeResult {
    /// The flag went from pending to acknowledged by this call
    Acknowledged,
    /// Someone else set the flag first, nothing was written
    AlreadyAcknowledged,
    NotFound,
}

#[async_trait::async_trait]
pub trait IReminderRecordRepo: Send + Sync {
    async fn insert(&self, record: &ReminderRecord) -> anyhow::Result<()>;
    async fn find(&self, kind: RecordKind, record_id: &ID) -> Option<ReminderRecord>;
    /// Every record of the query kind whose anchor lies inside the window and
    /// whose flag is still pending. Fails when the store cannot be queried.
    async fn find_due(&self, query: &DueRecordsQuery) -> anyhow::Result<Vec<ReminderRecord>>;
    /// Sets `ack_flag` on the record only if it is not already set. The check
    /// and the write happen as one atomic operation in the store.
    async fn acknowledge(
        &self,
        kind: RecordKind,
        record_id: &ID,
        ack_flag: &str,
    ) -> anyhow::Result<AcknowledgeResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemindrContext;
    use remindr_domain::{LeadTime, ReminderJob};

    const NOW: i64 = 1613862000000;
    const HOUR: i64 = 1000 * 60 * 60;

    fn create_contexts() -> Vec<RemindrContext> {
        vec![RemindrContext::create_inmemory()]
    }

    fn appointment_job() -> ReminderJob {
        ReminderJob::appointment(LeadTime::from_minutes(24 * 60), 60 * 1000)
    }

    #[tokio::test]
    async fn insert_and_find() {
        for ctx in create_contexts() {
            let record = ReminderRecord::appointment(NOW).with_tokens(&["a", "b"]);
            assert!(ctx.repos.reminder_records.insert(&record).await.is_ok());

            let found = ctx
                .repos
                .reminder_records
                .find(RecordKind::Appointment, &record.id)
                .await
                .expect("To find the appointment");
            assert_eq!(found, record);

            // Ids are scoped by kind
            assert!(ctx
                .repos
                .reminder_records
                .find(RecordKind::Task, &record.id)
                .await
                .is_none());
        }
    }

    #[tokio::test]
    async fn find_due_records_inside_the_window() {
        for ctx in create_contexts() {
            let due = ReminderRecord::appointment(NOW + 24 * HOUR + 30 * 1000);
            let too_late = ReminderRecord::appointment(NOW + 25 * HOUR);
            let task = ReminderRecord::task(NOW + 24 * HOUR);
            for record in [&due, &too_late, &task].iter() {
                ctx.repos.reminder_records.insert(record).await.unwrap();
            }

            let query = DueRecordsQuery::new(&appointment_job(), NOW);
            let records = ctx.repos.reminder_records.find_due(&query).await.unwrap();
            assert_eq!(records, vec![due]);
        }
    }

    #[tokio::test]
    async fn acknowledged_records_are_not_due() {
        for ctx in create_contexts() {
            let job = appointment_job();
            let record = ReminderRecord::appointment(NOW + 24 * HOUR);
            ctx.repos.reminder_records.insert(&record).await.unwrap();

            let res = ctx
                .repos
                .reminder_records
                .acknowledge(record.kind(), &record.id, &job.ack_flag)
                .await
                .unwrap();
            assert_eq!(res, AcknowledgeResult::Acknowledged);

            let query = DueRecordsQuery::new(&job, NOW);
            assert!(ctx
                .repos
                .reminder_records
                .find_due(&query)
                .await
                .unwrap()
                .is_empty());

            let acked = ctx
                .repos
                .reminder_records
                .find(record.kind(), &record.id)
                .await
                .unwrap();
            assert!(acked.is_acknowledged(&job.ack_flag));
            assert!(acked.acknowledged_at.contains_key(&job.ack_flag));
            // Flags of other lead times are untouched
            assert!(!acked.is_acknowledged("notificationSent2h"));
        }
    }

    #[tokio::test]
    async fn acknowledge_only_once() {
        for ctx in create_contexts() {
            let record = ReminderRecord::task(NOW);
            ctx.repos.reminder_records.insert(&record).await.unwrap();
            let repo = &ctx.repos.reminder_records;

            let first = repo
                .acknowledge(RecordKind::Task, &record.id, "reminderSent")
                .await
                .unwrap();
            let acked_at = repo
                .find(RecordKind::Task, &record.id)
                .await
                .unwrap()
                .acknowledged_at["reminderSent"];
            let second = repo
                .acknowledge(RecordKind::Task, &record.id, "reminderSent")
                .await
                .unwrap();

            assert_eq!(first, AcknowledgeResult::Acknowledged);
            assert_eq!(second, AcknowledgeResult::AlreadyAcknowledged);
            let record = repo.find(RecordKind::Task, &record.id).await.unwrap();
            assert_eq!(record.acknowledged_at["reminderSent"], acked_at);
        }
    }

    #[tokio::test]
    async fn acknowledge_missing_record() {
        for ctx in create_contexts() {
            let res = ctx
                .repos
                .reminder_records
                .acknowledge(RecordKind::Appointment, &ID::default(), "notificationSent2h")
                .await
                .unwrap();
            assert_eq!(res, AcknowledgeResult::NotFound);
        }
    }

    #[tokio::test]
    async fn acknowledge_is_scoped_by_kind() {
        for ctx in create_contexts() {
            let id = ID::from("shared-id");
            let mut appointment = ReminderRecord::appointment(NOW);
            appointment.id = id.clone();
            let mut task = ReminderRecord::task(NOW);
            task.id = id.clone();
            let repo = &ctx.repos.reminder_records;
            repo.insert(&appointment).await.unwrap();
            repo.insert(&task).await.unwrap();

            let res = repo
                .acknowledge(RecordKind::Task, &id, "reminderSent")
                .await
                .unwrap();
            assert_eq!(res, AcknowledgeResult::Acknowledged);

            let task = repo.find(RecordKind::Task, &id).await.unwrap();
            assert!(task.is_acknowledged("reminderSent"));
            let appointment = repo.find(RecordKind::Appointment, &id).await.unwrap();
            assert!(!appointment.is_acknowledged("reminderSent"));
        }
    }
}
