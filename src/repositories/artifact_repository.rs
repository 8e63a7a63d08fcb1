use async_trait::async_trait;
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary},
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{db::Database, errors::AppResult, models::domain::ConfigArtifact};

/// At most one configuration file per course module.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    async fn find(&self, resource_id: i64) -> AppResult<Option<ConfigArtifact>>;
    async fn put(&self, artifact: ConfigArtifact) -> AppResult<()>;
    async fn delete_for_resource(&self, resource_id: i64) -> AppResult<u64>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredArtifact {
    resource_id: i64,
    filename: String,
    content_type: String,
    #[serde(default)]
    content_disposition: Option<String>,
    content: Binary,
    created_at: i64,
}

impl From<ConfigArtifact> for StoredArtifact {
    fn from(artifact: ConfigArtifact) -> Self {
        Self {
            resource_id: artifact.resource_id,
            filename: artifact.filename,
            content_type: artifact.content_type,
            content_disposition: artifact.content_disposition,
            content: Binary {
                subtype: BinarySubtype::Generic,
                bytes: artifact.content,
            },
            created_at: artifact.created_at,
        }
    }
}

impl From<StoredArtifact> for ConfigArtifact {
    fn from(stored: StoredArtifact) -> Self {
        Self {
            resource_id: stored.resource_id,
            filename: stored.filename,
            content_type: stored.content_type,
            content_disposition: stored.content_disposition,
            content: stored.content.bytes,
            created_at: stored.created_at,
        }
    }
}

pub struct MongoArtifactRepository {
    collection: Collection<StoredArtifact>,
}

impl MongoArtifactRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("config_artifacts");
        Self { collection }
    }
}

#[async_trait]
impl ArtifactRepository for MongoArtifactRepository {
    async fn find(&self, resource_id: i64) -> AppResult<Option<ConfigArtifact>> {
        let stored = self
            .collection
            .find_one(doc! { "resource_id": resource_id })
            .await?;
        Ok(stored.map(ConfigArtifact::from))
    }

    async fn put(&self, artifact: ConfigArtifact) -> AppResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        let filter = doc! { "resource_id": artifact.resource_id };
        self.collection
            .replace_one(filter, &StoredArtifact::from(artifact))
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn delete_for_resource(&self, resource_id: i64) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "resource_id": resource_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let options = IndexOptions::builder().unique(true).build();
        let model = IndexModel::builder()
            .keys(doc! { "resource_id": 1 })
            .options(options)
            .build();
        self.collection.create_index(model).await?;
        log::info!("Created unique index on config_artifacts.resource_id");
        Ok(())
    }
}
