use async_trait::async_trait;
use futures::TryStreamExt;
use log::info;
use mongodb::{
    bson::doc,
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::Session};

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: Session) -> AppResult<Session>;
    async fn find(&self, session_id: &str) -> AppResult<Option<Session>>;
    async fn touch(&self, session_id: &str, now: i64) -> AppResult<()>;
    async fn delete(&self, session_id: &str) -> AppResult<bool>;
    /// Oldest first.
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Session>>;
    async fn delete_expired(&self, now: i64) -> AppResult<u64>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoSessionRepository {
    collection: Collection<Session>,
}

impl MongoSessionRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("sessions");
        Self { collection }
    }
}

#[async_trait]
impl SessionRepository for MongoSessionRepository {
    async fn create(&self, session: Session) -> AppResult<Session> {
        self.collection.insert_one(&session).await?;
        Ok(session)
    }

    async fn find(&self, session_id: &str) -> AppResult<Option<Session>> {
        let session = self
            .collection
            .find_one(doc! { "session_id": session_id })
            .await?;
        Ok(session)
    }

    async fn touch(&self, session_id: &str, now: i64) -> AppResult<()> {
        self.collection
            .update_one(
                doc! { "session_id": session_id },
                doc! { "$set": { "last_access": now } },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AppResult<bool> {
        let result = self
            .collection
            .delete_one(doc! { "session_id": session_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Session>> {
        let cursor = self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": 1 })
            .await?;
        let sessions: Vec<Session> = cursor.try_collect().await?;
        Ok(sessions)
    }

    async fn delete_expired(&self, now: i64) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "expires_at": { "$lt": now } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let id_options = IndexOptions::builder().unique(true).build();
        let id_model = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(id_options)
            .build();
        self.collection.create_index(id_model).await?;
        info!("Created unique index on sessions.session_id");

        let user_model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": 1 })
            .build();
        self.collection.create_index(user_model).await?;
        info!("Created index on sessions.(user_id, created_at)");

        Ok(())
    }
}
