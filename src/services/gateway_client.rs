use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use reqwest::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    Client, Method,
};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::{
        domain::{ExamLinkRecord, QuizModule, RemoteConnectionProfile, User},
        dto::gateway::{
            ExamData, ExamReference, ExamRegistration, GatewayErrorPayload, LoginTokenRequest,
            LoginTokenResponse,
        },
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl GatewayMethod {
    fn as_method(self) -> Method {
        match self {
            GatewayMethod::Get => Method::GET,
            GatewayMethod::Post => Method::POST,
            GatewayMethod::Put => Method::PUT,
            GatewayMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for GatewayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayMethod::Get => "get",
            GatewayMethod::Post => "post",
            GatewayMethod::Put => "put",
            GatewayMethod::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub timeout: Duration,
    pub config_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.exam_server_timeout_secs),
            config_timeout: Duration::from_secs(config.exam_server_config_timeout_secs),
            accept_invalid_certs: config.exam_server_accept_invalid_certs,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            config_timeout: Duration::from_secs(60),
            accept_invalid_certs: false,
        }
    }
}

/// Operations the LMS side invokes on the exam server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamGateway: Send + Sync {
    async fn register_or_update_exam(
        &self,
        module: &QuizModule,
        record: &ExamLinkRecord,
    ) -> AppResult<()>;

    /// Downloads the signed kiosk configuration for the quiz. An empty body is an error.
    async fn fetch_client_configuration(&self, module: &QuizModule) -> AppResult<GatewayResponse>;

    async fn delete_exam(&self, course_id: i64, quiz_id: i64) -> AppResult<()>;

    async fn request_external_login_link(&self, module: &QuizModule, user: &User)
        -> AppResult<String>;
}

/// Builds a gateway bound to one connection profile.
pub trait GatewayFactory: Send + Sync {
    fn connect(&self, profile: RemoteConnectionProfile) -> AppResult<Arc<dyn ExamGateway>>;
}

impl<F> GatewayFactory for F
where
    F: Fn(RemoteConnectionProfile) -> AppResult<Arc<dyn ExamGateway>> + Send + Sync,
{
    fn connect(&self, profile: RemoteConnectionProfile) -> AppResult<Arc<dyn ExamGateway>> {
        self(profile)
    }
}

pub struct HttpGatewayFactory {
    settings: GatewaySettings,
}

impl HttpGatewayFactory {
    pub fn new(settings: GatewaySettings) -> Self {
        Self { settings }
    }
}

impl GatewayFactory for HttpGatewayFactory {
    fn connect(&self, profile: RemoteConnectionProfile) -> AppResult<Arc<dyn ExamGateway>> {
        Ok(Arc::new(ExamServerClient::new(profile, &self.settings)?))
    }
}

/// reqwest-backed client for the exam server REST API.
pub struct ExamServerClient {
    profile: RemoteConnectionProfile,
    http: Client,
    config_http: Client,
}

impl ExamServerClient {
    pub fn new(profile: RemoteConnectionProfile, settings: &GatewaySettings) -> AppResult<Self> {
        if settings.accept_invalid_certs {
            warn!(
                "TLS certificate verification is disabled for exam server {}",
                profile.endpoint
            );
        }

        let build = |timeout: Duration| {
            Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(settings.accept_invalid_certs)
                .build()
                .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))
        };

        Ok(Self {
            http: build(settings.timeout)?,
            config_http: build(settings.config_timeout)?,
            profile,
        })
    }

    pub fn profile(&self) -> &RemoteConnectionProfile {
        &self.profile
    }

    /// Sends `params` to `path` with the profile's bearer token.
    ///
    /// Regular calls send the parameters form-encoded in the body. Binary downloads put
    /// them in the query string and use the longer configuration timeout.
    pub async fn call<P: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        params: &P,
        method: GatewayMethod,
        expect_binary: bool,
    ) -> AppResult<GatewayResponse> {
        let url = self.profile.endpoint_url(path);
        let client = if expect_binary {
            &self.config_http
        } else {
            &self.http
        };

        let request = client
            .request(method.as_method(), &url)
            .bearer_auth(self.profile.access_token.expose_secret().trim());
        let request = if expect_binary {
            request.query(params)
        } else {
            request.form(params)
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);
        let body = response.bytes().await?.to_vec();

        Ok(GatewayResponse {
            status,
            content_type,
            content_disposition,
            body,
        })
    }

    fn reference(&self, course_id: i64, quiz_id: i64) -> ExamReference {
        ExamReference {
            id: self.profile.connection_id.clone(),
            course_id,
            quiz_id,
        }
    }
}

/// Formats a non-200 answer the way operators know it from the exam server logs.
pub fn describe_failure(response: &GatewayResponse, path: &str, method: GatewayMethod) -> String {
    let payload = serde_json::from_slice::<GatewayErrorPayload>(&response.body).ok();
    match payload.as_ref().and_then(GatewayErrorPayload::first) {
        Some(body) => format!(
            "ERROR {}: ({}) {} [{}/{}]",
            response.status, body.system_message, body.details, path, method
        ),
        None => format!(
            "ERROR {} {} [{}/{}]",
            response.status,
            String::from_utf8_lossy(&response.body).trim(),
            path,
            method
        ),
    }
}

fn failure(response: &GatewayResponse, path: &str, method: GatewayMethod) -> AppError {
    AppError::remote(response.status, describe_failure(response, path, method))
}

#[async_trait]
impl ExamGateway for ExamServerClient {
    async fn register_or_update_exam(
        &self,
        module: &QuizModule,
        record: &ExamLinkRecord,
    ) -> AppResult<()> {
        let exam_data = serde_json::to_string(&ExamData::from(module))
            .map_err(|e| AppError::InternalError(format!("Failed to encode exam data: {}", e)))?;
        let params = ExamRegistration {
            id: self.profile.connection_id.clone(),
            course_id: module.course.id,
            exam_template_id: record.template_id,
            quit_password: record.quit_secret.clone(),
            quiz_id: module.quiz_id,
            quit_link: u8::from(record.show_quit_button),
            exam_data,
        };

        let response = self
            .call("/exam", &params, GatewayMethod::Post, false)
            .await?;
        if !response.is_ok() {
            return Err(failure(&response, "/exam", GatewayMethod::Post));
        }

        info!("Registered quiz {} with the exam server", module.quiz_id);
        Ok(())
    }

    async fn fetch_client_configuration(&self, module: &QuizModule) -> AppResult<GatewayResponse> {
        let params = self.reference(module.course.id, module.quiz_id);
        let response = self
            .call("/seb_config", &params, GatewayMethod::Post, true)
            .await?;

        if !response.is_ok() {
            return Err(failure(&response, "/seb_config", GatewayMethod::Post));
        }
        if response.body.is_empty() {
            return Err(AppError::ArtifactNotFound(format!(
                "the exam server returned no configuration for quiz {}",
                module.quiz_id
            )));
        }
        Ok(response)
    }

    async fn delete_exam(&self, course_id: i64, quiz_id: i64) -> AppResult<()> {
        let params = self.reference(course_id, quiz_id);
        let response = self
            .call("/exam", &params, GatewayMethod::Delete, false)
            .await?;
        if !response.is_ok() {
            return Err(failure(&response, "/exam", GatewayMethod::Delete));
        }
        Ok(())
    }

    async fn request_external_login_link(
        &self,
        module: &QuizModule,
        user: &User,
    ) -> AppResult<String> {
        let now = Utc::now();
        let params = LoginTokenRequest {
            id: self.profile.connection_id.clone(),
            course_id: module.course.id,
            quiz_id: module.quiz_id,
            user_id: user.id,
            user_idnumber: user.idnumber.clone(),
            user_username: user.username.clone(),
            user_email: user.email.clone(),
            user_fullname: user.full_name(),
            user_firstname: user.first_name.clone(),
            user_lastname: user.last_name.clone(),
            account_time_zone: user.timezone.clone(),
            localised_time: now.format("%A, %d %B %Y, %I:%M %p").to_string(),
            timestamp: now.timestamp(),
        };

        let response = self
            .call("/login_token", &params, GatewayMethod::Post, false)
            .await?;
        if !response.is_ok() {
            return Err(failure(&response, "/login_token", GatewayMethod::Post));
        }

        let parsed: LoginTokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
            AppError::remote(response.status, format!("Unexpected login token response: {}", e))
        })?;

        match parsed.login_link.filter(|link| !link.trim().is_empty()) {
            Some(link) => Ok(link),
            None => Err(AppError::remote(
                response.status,
                "Exam server autologin ERROR: Empty link.",
            )),
        }
    }
}
