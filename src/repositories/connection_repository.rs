use async_trait::async_trait;
use mongodb::{bson::doc, options::ReplaceOptions, Collection};

use crate::{db::Database, errors::AppResult, models::domain::RemoteConnectionProfile};

/// Holds the single exam server connection.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn get(&self) -> AppResult<Option<RemoteConnectionProfile>>;
    async fn put(&self, profile: RemoteConnectionProfile) -> AppResult<()>;
    async fn delete(&self) -> AppResult<bool>;
}

pub struct MongoConnectionRepository {
    collection: Collection<RemoteConnectionProfile>,
}

impl MongoConnectionRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("exam_server_connection");
        Self { collection }
    }
}

#[async_trait]
impl ConnectionRepository for MongoConnectionRepository {
    async fn get(&self) -> AppResult<Option<RemoteConnectionProfile>> {
        let profile = self.collection.find_one(doc! {}).await?;
        Ok(profile)
    }

    async fn put(&self, profile: RemoteConnectionProfile) -> AppResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! {}, &profile)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn delete(&self) -> AppResult<bool> {
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count > 0)
    }
}
