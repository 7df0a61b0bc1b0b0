use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};

use crate::{error::PersistError, models::Alert, services::alert_sink::AlertSink};

/// Alerts stored one document per record in the `alerts` collection.
#[derive(Clone)]
pub struct MongoAlertSink {
    alerts: Collection<Alert>,
}

impl MongoAlertSink {
    pub fn new(db: &Database) -> Self {
        Self {
            alerts: db.collection::<Alert>("alerts"),
        }
    }
}

#[async_trait]
impl AlertSink for MongoAlertSink {
    async fn load(&self) -> Result<Vec<Alert>, PersistError> {
        let mut cursor = self.alerts.find(None, None).await?;

        let mut items: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }

    async fn save_all(&self, alerts: &[Alert]) -> Result<(), PersistError> {
        let upsert = ReplaceOptions::builder().upsert(true).build();

        for a in alerts {
            self.alerts
                .replace_one(doc! { "id": &a.id }, a, upsert.clone())
                .await?;
        }

        // drop records deleted since the last write
        let ids: Vec<Bson> = alerts.iter().map(|a| Bson::String(a.id.clone())).collect();
        self.alerts
            .delete_many(doc! { "id": { "$nin": ids } }, None)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }
}
