use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExamTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The single, process-wide link to the exam server.
///
/// Serialized with the same field names the exam server uses when it pushes the
/// connection in (`url`, `access_token`, `id`, `exam_templates`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RemoteConnectionProfile {
    #[serde(rename = "url")]
    pub endpoint: String,
    #[serde(
        rename = "access_token",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub access_token: SecretString,
    #[serde(rename = "id", deserialize_with = "deserialize_connection_id")]
    pub connection_id: String,
    #[serde(rename = "exam_templates", default)]
    pub templates: Vec<ExamTemplate>,
}

impl RemoteConnectionProfile {
    pub fn new(endpoint: &str, access_token: &str, connection_id: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: SecretString::from(access_token.to_string()),
            connection_id: connection_id.to_string(),
            templates: Vec::new(),
        }
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    pub fn has_template(&self, template_id: i64) -> bool {
        template_id == 0 || self.templates.iter().any(|t| t.id == template_id)
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw.trim().to_string()))
}

/// The exam server sends the id either as a string or as a number.
fn deserialize_connection_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
