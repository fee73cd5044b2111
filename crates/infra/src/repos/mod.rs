mod reminder_record;
mod shared;

use mongodb::{bson::doc, options::ClientOptions, Client};
use reminder_record::{InMemoryReminderRecordRepo, MongoReminderRecordRepo};
use std::sync::Arc;
use tracing::info;

pub use reminder_record::{AcknowledgeResult, IReminderRecordRepo};
pub use shared::query_structs::*;

#[derive(Clone)]
pub struct Repos {
    pub reminder_records: Arc<dyn IReminderRecordRepo>,
}

impl Repos {
    pub async fn create_mongodb(connection_string: &str, db_name: &str) -> anyhow::Result<Self> {
        let client_options = ClientOptions::parse(connection_string).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);

        // This is needed to make sure that db is ready when opening server
        info!("DB CHECKING CONNECTION ...");
        db.run_command(doc! { "ping": 1 }, None).await?;
        info!("DB CHECKING CONNECTION ... [done]");

        let reminder_records = MongoReminderRecordRepo::new(&db);
        reminder_records.create_indexes().await?;

        Ok(Self {
            reminder_records: Arc::new(reminder_records),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            reminder_records: Arc::new(InMemoryReminderRecordRepo::new()),
        }
    }
}
