use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::QuizModule};

#[async_trait]
pub trait QuizModuleRepository: Send + Sync {
    async fn find_by_cmid(&self, cmid: i64) -> AppResult<Option<QuizModule>>;
    async fn find_by_quiz_id(&self, quiz_id: i64) -> AppResult<Option<QuizModule>>;
    async fn upsert(&self, module: QuizModule) -> AppResult<QuizModule>;
    /// Ordered by course id, then cmid.
    async fn list(&self) -> AppResult<Vec<QuizModule>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoQuizModuleRepository {
    collection: Collection<QuizModule>,
}

impl MongoQuizModuleRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quiz_modules");
        Self { collection }
    }
}

#[async_trait]
impl QuizModuleRepository for MongoQuizModuleRepository {
    async fn find_by_cmid(&self, cmid: i64) -> AppResult<Option<QuizModule>> {
        let module = self.collection.find_one(doc! { "cmid": cmid }).await?;
        Ok(module)
    }

    async fn find_by_quiz_id(&self, quiz_id: i64) -> AppResult<Option<QuizModule>> {
        let module = self
            .collection
            .find_one(doc! { "quiz_id": quiz_id })
            .await?;
        Ok(module)
    }

    async fn upsert(&self, module: QuizModule) -> AppResult<QuizModule> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! { "cmid": module.cmid }, &module)
            .with_options(options)
            .await?;
        Ok(module)
    }

    async fn list(&self) -> AppResult<Vec<QuizModule>> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "course.id": 1, "cmid": 1 })
            .await?;
        let modules: Vec<QuizModule> = cursor.try_collect().await?;
        Ok(modules)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        for key in ["cmid", "quiz_id"] {
            let options = IndexOptions::builder().unique(true).build();
            let model = IndexModel::builder()
                .keys(doc! { key: 1 })
                .options(options)
                .build();
            self.collection.create_index(model).await?;
            log::info!("Created unique index on quiz_modules.{}", key);
        }
        Ok(())
    }
}
