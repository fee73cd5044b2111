use super::{AcknowledgeResult, IReminderRecordRepo};
use crate::repos::shared::{
    mongo_repo::{self, bson_to_id, id_filter, id_to_bson, MongoDocument},
    query_structs::DueRecordsQuery,
};
use mongodb::{
    bson::{doc, Bson, DateTime, Document},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use remindr_domain::{RecordDetails, RecordKind, ReminderAnchor, ReminderRecord, ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct MongoReminderRecordRepo {
    appointments: Collection<Document>,
    tasks: Collection<Document>,
}

impl MongoReminderRecordRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            appointments: db.collection("appointments"),
            tasks: db.collection("tasks"),
        }
    }

    fn collection(&self, kind: RecordKind) -> &Collection<Document> {
        match kind {
            RecordKind::Appointment => &self.appointments,
            RecordKind::Task => &self.tasks,
        }
    }

    /// Indexes backing the range queries of `find_due`
    pub async fn create_indexes(&self) -> anyhow::Result<()> {
        for (collection, field) in [
            (&self.appointments, anchor_field(ReminderAnchor::ScheduledAt)),
            (&self.tasks, anchor_field(ReminderAnchor::ReminderAt)),
        ]
        .iter()
        {
            let mut keys = Document::new();
            keys.insert(*field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().background(true).build())
                .build();
            collection.create_index(index, None).await?;
        }
        Ok(())
    }

    async fn find_one(&self, kind: RecordKind, filter: Document) -> anyhow::Result<Option<ReminderRecord>> {
        let collection = self.collection(kind);
        match kind {
            RecordKind::Appointment => {
                mongo_repo::find_one_by::<_, AppointmentMongo>(collection, filter).await
            }
            RecordKind::Task => mongo_repo::find_one_by::<_, TaskMongo>(collection, filter).await,
        }
    }
}

fn anchor_field(anchor: ReminderAnchor) -> &'static str {
    match anchor {
        ReminderAnchor::ScheduledAt => "scheduledAt",
        ReminderAnchor::ReminderAt => "reminderAt",
    }
}

fn ack_field(ack_flag: &str) -> String {
    format!("acks.{}", ack_flag)
}

#[async_trait::async_trait]
impl IReminderRecordRepo for MongoReminderRecordRepo {
    async fn insert(&self, record: &ReminderRecord) -> anyhow::Result<()> {
        let collection = self.collection(record.kind());
        match record.kind() {
            RecordKind::Appointment => {
                mongo_repo::insert::<_, AppointmentMongo>(collection, record).await
            }
            RecordKind::Task => mongo_repo::insert::<_, TaskMongo>(collection, record).await,
        }
    }

    async fn find(&self, kind: RecordKind, record_id: &ID) -> Option<ReminderRecord> {
        self.find_one(kind, id_filter(record_id)).await.ok().flatten()
    }

    async fn find_due(&self, query: &DueRecordsQuery) -> anyhow::Result<Vec<ReminderRecord>> {
        let mut filter = Document::new();
        filter.insert(
            anchor_field(query.job.anchor),
            doc! {
                "$gte": DateTime::from_millis(query.window.start_ts),
                "$lte": DateTime::from_millis(query.window.end_ts),
            },
        );
        filter.insert(ack_field(&query.job.ack_flag), doc! { "$ne": true });

        let collection = self.collection(query.job.kind);
        let records = match query.job.kind {
            RecordKind::Appointment => {
                mongo_repo::find_many_by::<_, AppointmentMongo>(collection, filter).await?
            }
            RecordKind::Task => {
                filter.insert("reminderEnabled", true);
                mongo_repo::find_many_by::<_, TaskMongo>(collection, filter).await?
            }
        };
        // The anchor must be re-checked since the filter cannot express a job
        // with a missing anchor field
        Ok(records.into_iter().filter(|r| query.matches(r)).collect())
    }

    async fn acknowledge(
        &self,
        kind: RecordKind,
        record_id: &ID,
        ack_flag: &str,
    ) -> anyhow::Result<AcknowledgeResult> {
        let collection = self.collection(kind);

        let mut filter = id_filter(record_id);
        filter.insert(ack_field(ack_flag), doc! { "$ne": true });
        let mut set = Document::new();
        set.insert(ack_field(ack_flag), true);
        let mut current_date = Document::new();
        current_date.insert(format!("ackedAt.{}", ack_flag), true);
        let update = doc! {
            "$set": set,
            "$currentDate": current_date,
        };

        let res = collection.update_one(filter, update, None).await?;
        if res.modified_count == 1 {
            return Ok(AcknowledgeResult::Acknowledged);
        }

        let exists = collection.find_one(id_filter(record_id), None).await?;
        Ok(match exists {
            Some(_) => AcknowledgeResult::AlreadyAcknowledged,
            None => AcknowledgeResult::NotFound,
        })
    }
}

fn to_millis(acked_at: HashMap<String, DateTime>) -> HashMap<String, i64> {
    acked_at
        .into_iter()
        .map(|(flag, ts)| (flag, ts.timestamp_millis()))
        .collect()
}

fn from_millis(acked_at: &HashMap<String, i64>) -> HashMap<String, DateTime> {
    acked_at
        .iter()
        .map(|(flag, ts)| (flag.clone(), DateTime::from_millis(*ts)))
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentMongo {
    #[serde(rename = "_id")]
    id: Bson,
    scheduled_at: Option<DateTime>,
    #[serde(default)]
    acks: HashMap<String, bool>,
    #[serde(default)]
    acked_at: HashMap<String, DateTime>,
    #[serde(default)]
    tokens: Vec<String>,
    participant: Option<String>,
    description: Option<String>,
    provider: Option<String>,
}

impl MongoDocument<ReminderRecord> for AppointmentMongo {
    fn to_domain(self) -> ReminderRecord {
        ReminderRecord {
            id: bson_to_id(&self.id),
            scheduled_ts: self.scheduled_at.map(|ts| ts.timestamp_millis()),
            reminder_ts: None,
            reminder_enabled: true,
            acknowledgements: self.acks,
            acknowledged_at: to_millis(self.acked_at),
            recipient_tokens: self.tokens,
            details: RecordDetails::Appointment {
                participant: self.participant,
                description: self.description,
                provider: self.provider,
            },
        }
    }

    fn from_domain(record: &ReminderRecord) -> Self {
        let (participant, description, provider) = match &record.details {
            RecordDetails::Appointment {
                participant,
                description,
                provider,
            } => (participant.clone(), description.clone(), provider.clone()),
            RecordDetails::Task { .. } => (None, None, None),
        };
        Self {
            id: id_to_bson(&record.id),
            scheduled_at: record.scheduled_ts.map(DateTime::from_millis),
            acks: record.acknowledgements.clone(),
            acked_at: from_millis(&record.acknowledged_at),
            tokens: record.recipient_tokens.clone(),
            participant,
            description,
            provider,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskMongo {
    #[serde(rename = "_id")]
    id: Bson,
    scheduled_at: Option<DateTime>,
    reminder_at: Option<DateTime>,
    #[serde(default)]
    reminder_enabled: bool,
    #[serde(default)]
    acks: HashMap<String, bool>,
    #[serde(default)]
    acked_at: HashMap<String, DateTime>,
    #[serde(default)]
    tokens: Vec<String>,
    title: Option<String>,
}

impl MongoDocument<ReminderRecord> for TaskMongo {
    fn to_domain(self) -> ReminderRecord {
        ReminderRecord {
            id: bson_to_id(&self.id),
            scheduled_ts: self.scheduled_at.map(|ts| ts.timestamp_millis()),
            reminder_ts: self.reminder_at.map(|ts| ts.timestamp_millis()),
            reminder_enabled: self.reminder_enabled,
            acknowledgements: self.acks,
            acknowledged_at: to_millis(self.acked_at),
            recipient_tokens: self.tokens,
            details: RecordDetails::Task { title: self.title },
        }
    }

    fn from_domain(record: &ReminderRecord) -> Self {
        let title = match &record.details {
            RecordDetails::Task { title } => title.clone(),
            RecordDetails::Appointment { .. } => None,
        };
        Self {
            id: id_to_bson(&record.id),
            scheduled_at: record.scheduled_ts.map(DateTime::from_millis),
            reminder_at: record.reminder_ts.map(DateTime::from_millis),
            reminder_enabled: record.reminder_enabled,
            acks: record.acknowledgements.clone(),
            acked_at: from_millis(&record.acknowledged_at),
            tokens: record.recipient_tokens.clone(),
            title,
        }
    }
}
