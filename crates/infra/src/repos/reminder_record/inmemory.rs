use super::{AcknowledgeResult, IReminderRecordRepo};
use crate::repos::shared::{inmemory_repo::*, query_structs::DueRecordsQuery};
use chrono::Utc;
use remindr_domain::{RecordKind, ReminderRecord, ID};
use std::sync::Mutex;

pub struct InMemoryReminderRecordRepo {
    records: Mutex<Vec<ReminderRecord>>,
}

impl InMemoryReminderRecordRepo {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IReminderRecordRepo for InMemoryReminderRecordRepo {
    async fn insert(&self, record: &ReminderRecord) -> anyhow::Result<()> {
        insert(record, &self.records);
        Ok(())
    }

    async fn find(&self, kind: RecordKind, record_id: &ID) -> Option<ReminderRecord> {
        find_one_by(&self.records, |r| r.kind() == kind && &r.id == record_id)
    }

    async fn find_due(&self, query: &DueRecordsQuery) -> anyhow::Result<Vec<ReminderRecord>> {
        Ok(find_by(&self.records, |r| query.matches(r)))
    }

    async fn acknowledge(
        &self,
        kind: RecordKind,
        record_id: &ID,
        ack_flag: &str,
    ) -> anyhow::Result<AcknowledgeResult> {
        let acknowledged_ts = Utc::now().timestamp_millis();
        let res = update_one(
            record_id,
            &self.records,
            |record| record.kind() == kind,
            |record| {
                if record.acknowledge(ack_flag, acknowledged_ts) {
                    AcknowledgeResult::Acknowledged
                } else {
                    AcknowledgeResult::AlreadyAcknowledged
                }
            },
        );
        Ok(res.unwrap_or(AcknowledgeResult::NotFound))
    }
}
