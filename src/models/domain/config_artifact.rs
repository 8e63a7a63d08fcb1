use serde::{Deserialize, Serialize};

pub const ARTIFACT_FILENAME: &str = "SEBServerSettings.seb";
pub const ARTIFACT_CONTENT_TYPE: &str = "application/seb";

/// The signed kiosk configuration file fetched from the exam server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigArtifact {
    pub resource_id: i64,
    pub filename: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    pub content: Vec<u8>,
    pub created_at: i64,
}

impl ConfigArtifact {
    pub fn new(resource_id: i64, content: Vec<u8>, content_disposition: Option<String>, now: i64) -> Self {
        Self {
            resource_id,
            filename: ARTIFACT_FILENAME.to_string(),
            content_type: ARTIFACT_CONTENT_TYPE.to_string(),
            content_disposition,
            content,
            created_at: now,
        }
    }
}
