use std::sync::Arc;

use log::{info, warn};

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::RemoteConnectionProfile,
        dto::response::{Warning, WebserviceResult},
    },
    repositories::ConnectionRepository,
};

/// Keeps the single exam server connection the exam server pushes in.
pub struct ConnectionService {
    connections: Arc<dyn ConnectionRepository>,
}

impl ConnectionService {
    pub fn new(connections: Arc<dyn ConnectionRepository>) -> Self {
        Self { connections }
    }

    pub async fn profile(&self) -> AppResult<Option<RemoteConnectionProfile>> {
        self.connections.get().await
    }

    pub async fn set_connection(&self, raw: &str) -> AppResult<WebserviceResult> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::ValidationError("Connection data missing".to_string()));
        }

        let profile: RemoteConnectionProfile = serde_json::from_str(raw).map_err(|e| {
            AppError::ValidationError(format!("Connection is not a valid JSON format: {}", e))
        })?;
        if profile.endpoint.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Connection has no exam server url".to_string(),
            ));
        }

        if let Some(existing) = self.connections.get().await? {
            if existing.connection_id != profile.connection_id {
                warn!(
                    "Refused connection {}: connection {} is registered",
                    profile.connection_id, existing.connection_id
                );
                return Ok(WebserviceResult::failed(Warning::new(
                    "sebserver",
                    0,
                    "connectiondoesntmatch",
                    format!(
                        "The connection ID does not match. Update failed. Registered ID: {}. Update ID: {}",
                        existing.connection_id, profile.connection_id
                    ),
                )));
            }
        }

        info!(
            "Stored exam server connection {} ({}, {} template(s))",
            profile.connection_id,
            profile.endpoint,
            profile.templates.len()
        );
        self.connections.put(profile).await?;
        Ok(WebserviceResult::ok())
    }

    pub async fn delete_connection(&self, id: &str) -> AppResult<WebserviceResult> {
        if id.trim().is_empty() {
            return Err(AppError::ValidationError("Connection ID missing.".to_string()));
        }

        let Some(existing) = self.connections.get().await? else {
            return Ok(WebserviceResult::failed(Warning::new(
                "sebserver",
                0,
                "noconnectionfound",
                "There is no exam server connection found.",
            )));
        };

        if existing.connection_id != id.trim() {
            return Ok(WebserviceResult::failed(Warning::new(
                "sebserver",
                0,
                "connectiondoesntmatch",
                "The connection ID does not match.",
            )));
        }

        if !self.connections.delete().await? {
            return Ok(WebserviceResult::failed(Warning::new(
                "sebserver",
                0,
                "connectiondeletionfailed",
                "Connection deletion failed.",
            )));
        }

        info!("Deleted exam server connection {}", id);
        Ok(WebserviceResult::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::InMemoryConnectionRepository;

    const CONNECTION: &str = r#"{
        "id": 1,
        "url": "https://exams.example.org/",
        "access_token": " tok ",
        "exam_templates": [{"id": 12, "name": "Default"}]
    }"#;

    fn service() -> ConnectionService {
        ConnectionService::new(Arc::new(InMemoryConnectionRepository::new()))
    }

    #[actix_web::test]
    async fn test_set_connection_inserts_then_replaces() {
        let service = service();
        let result = service.set_connection(CONNECTION).await.unwrap();
        assert!(result.success);

        let updated = CONNECTION.replace("Default", "Strict");
        assert!(service.set_connection(&updated).await.unwrap().success);

        let profile = service.profile().await.unwrap().unwrap();
        assert_eq!(profile.connection_id, "1");
        assert_eq!(profile.templates[0].name, "Strict");
    }

    #[actix_web::test]
    async fn test_set_connection_rejects_other_id() {
        let service = service();
        service.set_connection(CONNECTION).await.unwrap();

        let other = CONNECTION.replace("\"id\": 1", "\"id\": \"2\"");
        let result = service.set_connection(&other).await.unwrap();
        assert!(!result.success);
        assert!(result.has_warning("connectiondoesntmatch"));
        assert_eq!(service.profile().await.unwrap().unwrap().connection_id, "1");
    }

    #[actix_web::test]
    async fn test_set_connection_invalid_json() {
        let result = service().set_connection("{not json").await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[actix_web::test]
    async fn test_delete_connection() {
        let service = service();
        let result = service.delete_connection("1").await.unwrap();
        assert!(result.has_warning("noconnectionfound"));

        service.set_connection(CONNECTION).await.unwrap();
        let result = service.delete_connection("9").await.unwrap();
        assert!(result.has_warning("connectiondoesntmatch"));

        assert!(service.delete_connection("1").await.unwrap().success);
        assert!(service.profile().await.unwrap().is_none());
    }
}
