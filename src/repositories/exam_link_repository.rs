use async_trait::async_trait;
use log::info;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::ExamLinkRecord};

#[async_trait]
pub trait ExamLinkRepository: Send + Sync {
    async fn find_by_quiz(&self, quiz_id: i64) -> AppResult<Option<ExamLinkRecord>>;
    async fn upsert(&self, record: ExamLinkRecord) -> AppResult<ExamLinkRecord>;
    /// Returns whether a record was removed.
    async fn delete(&self, quiz_id: i64) -> AppResult<bool>;
    /// Flips `called` from false to true. Returns false when another caller got there first.
    async fn mark_called(&self, quiz_id: i64) -> AppResult<bool>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoExamLinkRepository {
    collection: Collection<ExamLinkRecord>,
}

impl MongoExamLinkRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("exam_links");
        Self { collection }
    }
}

#[async_trait]
impl ExamLinkRepository for MongoExamLinkRepository {
    async fn find_by_quiz(&self, quiz_id: i64) -> AppResult<Option<ExamLinkRecord>> {
        let record = self
            .collection
            .find_one(doc! { "quiz_id": quiz_id })
            .await?;
        Ok(record)
    }

    async fn upsert(&self, record: ExamLinkRecord) -> AppResult<ExamLinkRecord> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! { "quiz_id": record.quiz_id }, &record)
            .with_options(options)
            .await?;
        Ok(record)
    }

    async fn delete(&self, quiz_id: i64) -> AppResult<bool> {
        let result = self
            .collection
            .delete_one(doc! { "quiz_id": quiz_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn mark_called(&self, quiz_id: i64) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "quiz_id": quiz_id, "called": false },
                doc! { "$set": { "called": true } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let options = IndexOptions::builder().unique(true).build();
        let model = IndexModel::builder()
            .keys(doc! { "quiz_id": 1 })
            .options(options)
            .build();
        self.collection.create_index(model).await?;
        info!("Created unique index on exam_links.quiz_id");

        Ok(())
    }
}
