use async_trait::async_trait;
use log::info;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::LoginToken};

#[async_trait]
pub trait LoginTokenRepository: Send + Sync {
    /// Stores `token`, replacing whatever the same user held in that namespace.
    async fn replace_for_user(&self, token: LoginToken) -> AppResult<()>;
    async fn delete_for_user(&self, namespace: &str, user_id: i64) -> AppResult<u64>;
    async fn delete_for_user_resource(
        &self,
        namespace: &str,
        user_id: i64,
        resource_id: i64,
    ) -> AppResult<u64>;
    /// Atomically fetches and removes the matching token.
    async fn take(
        &self,
        namespace: &str,
        value_hash: &str,
        resource_id: i64,
    ) -> AppResult<Option<LoginToken>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoLoginTokenRepository {
    collection: Collection<LoginToken>,
}

impl MongoLoginTokenRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("login_tokens");
        Self { collection }
    }
}

#[async_trait]
impl LoginTokenRepository for MongoLoginTokenRepository {
    async fn replace_for_user(&self, token: LoginToken) -> AppResult<()> {
        let filter = doc! { "namespace": &token.namespace, "user_id": token.user_id };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(filter, &token)
            .with_options(options)
            .await?;

        Ok(())
    }

    async fn delete_for_user(&self, namespace: &str, user_id: i64) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "namespace": namespace, "user_id": user_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_for_user_resource(
        &self,
        namespace: &str,
        user_id: i64,
        resource_id: i64,
    ) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! {
                "namespace": namespace,
                "user_id": user_id,
                "resource_id": resource_id,
            })
            .await?;
        Ok(result.deleted_count)
    }

    async fn take(
        &self,
        namespace: &str,
        value_hash: &str,
        resource_id: i64,
    ) -> AppResult<Option<LoginToken>> {
        let token = self
            .collection
            .find_one_and_delete(doc! {
                "namespace": namespace,
                "value_hash": value_hash,
                "resource_id": resource_id,
            })
            .await?;
        Ok(token)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let owner_options = IndexOptions::builder().unique(true).build();
        let owner_model = IndexModel::builder()
            .keys(doc! { "namespace": 1, "user_id": 1 })
            .options(owner_options)
            .build();
        self.collection.create_index(owner_model).await?;
        info!("Created unique index on login_tokens.(namespace, user_id)");

        let value_model = IndexModel::builder()
            .keys(doc! { "value_hash": 1 })
            .build();
        self.collection.create_index(value_model).await?;
        info!("Created index on login_tokens.value_hash");

        Ok(())
    }
}
