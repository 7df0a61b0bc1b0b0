use mongodb::{
    bson::doc,
    options::IndexOptions,
    Database, IndexModel,
};

use crate::error::PersistError;

pub async fn ensure_indexes(db: &Database) -> Result<(), PersistError> {
    // alerts: unique id, used by upserts and deletes
    {
        let col = db.collection::<mongodb::bson::Document>("alerts");
        let model = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None).await?;
    }

    // alerts: listing by symbol
    {
        let col = db.collection::<mongodb::bson::Document>("alerts");
        let model = IndexModel::builder()
            .keys(doc! { "symbol": 1, "createdAt": -1 })
            .build();

        let _ = col.create_index(model, None).await;
    }

    Ok(())
}
