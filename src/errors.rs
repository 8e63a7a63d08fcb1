use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::models::domain::RejectReason;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Login token rejected: {}", .0.message())]
    Token(RejectReason),

    #[error("Exam server error {status}: {message}")]
    RemoteGateway { status: u16, message: String },

    #[error("The exam server connection has not been set up yet")]
    ConfigurationMissing,

    #[error("Exam server configuration file not found: {0}")]
    ArtifactNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::Token(_) => "TOKEN_ERROR",
            AppError::RemoteGateway { .. } => "REMOTE_GATEWAY_ERROR",
            AppError::ConfigurationMissing => "CONFIGURATION_MISSING",
            AppError::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        AppError::RemoteGateway {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Token(_) => StatusCode::FORBIDDEN,
            AppError::RemoteGateway { .. } => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationMissing => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let reason = match self {
            AppError::Token(reason) => Some(reason.code()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            code: self.error_code(),
            reason,
        })
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::InternalError(format!("BSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
        AppError::RemoteGateway {
            status,
            message: err.to_string(),
        }
    }
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        if reason.is_authorization() {
            AppError::Authorization(format!("{} [{}]", reason.message(), reason.code()))
        } else {
            AppError::Token(reason)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("Invalid JSON: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AppError::Authorization("Session has expired".to_string()),
            ErrorKind::InvalidSignature => {
                AppError::Authorization("Session signature is invalid".to_string())
            }
            _ => AppError::Authorization(format!("Invalid session: {}", err)),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
