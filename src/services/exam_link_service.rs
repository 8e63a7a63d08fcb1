use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{ConfigArtifact, ExamLinkRecord, QuizModule, RemoteConnectionProfile, User},
        dto::{
            request::{ExamDataAction, ExamSettingsForm, SetExamDataRequest, SetRestrictionRequest},
            response::{RestrictionData, RestrictionResult, Warning, WebserviceResult},
        },
    },
    repositories::{
        ArtifactRepository, ConnectionRepository, ExamLinkRepository, QuizModuleRepository,
    },
    services::gateway_client::{ExamGateway, GatewayFactory},
};

pub struct ExamLinkService {
    links: Arc<dyn ExamLinkRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    connections: Arc<dyn ConnectionRepository>,
    modules: Arc<dyn QuizModuleRepository>,
    gateways: Arc<dyn GatewayFactory>,
}

impl ExamLinkService {
    pub fn new(
        links: Arc<dyn ExamLinkRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        connections: Arc<dyn ConnectionRepository>,
        modules: Arc<dyn QuizModuleRepository>,
        gateways: Arc<dyn GatewayFactory>,
    ) -> Self {
        Self {
            links,
            artifacts,
            connections,
            modules,
            gateways,
        }
    }

    pub async fn profile(&self) -> AppResult<RemoteConnectionProfile> {
        self.connections
            .get()
            .await?
            .ok_or(AppError::ConfigurationMissing)
    }

    /// Loads the connection and binds a gateway client to it for this operation.
    pub async fn gateway(&self) -> AppResult<Arc<dyn ExamGateway>> {
        let profile = self.profile().await?;
        self.gateways.connect(profile)
    }

    pub async fn find(&self, quiz_id: i64) -> AppResult<Option<ExamLinkRecord>> {
        self.links.find_by_quiz(quiz_id).await
    }

    pub async fn module(&self, cmid: i64) -> AppResult<QuizModule> {
        self.modules
            .find_by_cmid(cmid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course module {} does not exist", cmid)))
    }

    pub async fn module_for_quiz(&self, quiz_id: i64) -> AppResult<Option<QuizModule>> {
        self.modules.find_by_quiz_id(quiz_id).await
    }

    pub async fn artifact(&self, cmid: i64) -> AppResult<Option<ConfigArtifact>> {
        self.artifacts.find(cmid).await
    }

    async fn purge(&self, module: &QuizModule) -> AppResult<()> {
        let removed = self.artifacts.delete_for_resource(module.cmid).await?;
        self.links.delete(module.quiz_id).await?;
        info!(
            "Removed exam server link of quiz {} ({} configuration file(s) purged)",
            module.quiz_id, removed
        );
        Ok(())
    }

    /// Applies the quiz settings form.
    pub async fn save_settings(
        &self,
        module: &QuizModule,
        form: ExamSettingsForm,
        actor: &User,
    ) -> AppResult<Option<ExamLinkRecord>> {
        form.validate()?;

        if form.admin_reset {
            if !actor.is_admin() {
                return Err(AppError::Authorization(
                    "Only site administrators can reset the exam server link".to_string(),
                ));
            }
            self.purge(module).await?;
            return Ok(None);
        }

        let existing = self.links.find_by_quiz(module.quiz_id).await?;

        if !form.enabled {
            if existing.is_some() {
                // The exam server has to release the binding before the local record goes.
                self.gateway()
                    .await?
                    .delete_exam(module.course.id, module.quiz_id)
                    .await?;
                self.purge(module).await?;
            }
            return Ok(None);
        }

        let profile = self.profile().await?;
        if form.template_id == -1 {
            return Err(AppError::ValidationError(
                "An exam template must be selected".to_string(),
            ));
        }
        if !profile.has_template(form.template_id) {
            warn!(
                "Quiz {} uses template {} which the exam server did not announce",
                module.quiz_id, form.template_id
            );
        }

        let record = match existing {
            Some(mut record) => {
                record.template_id = form.template_id;
                record.show_quit_button = form.show_quit_button;
                record.quit_secret = form.quit_secret;
                record.touch();
                record
            }
            None => ExamLinkRecord::new_enabled(
                module.quiz_id,
                form.template_id,
                form.show_quit_button,
                &form.quit_secret,
            ),
        };

        Ok(Some(self.links.upsert(record).await?))
    }

    /// Quiz deletion: tell the exam server, but never fail because of it.
    pub async fn delete_settings(&self, module: &QuizModule) -> AppResult<()> {
        match self.gateway().await {
            Ok(gateway) => {
                if let Err(e) = gateway.delete_exam(module.course.id, module.quiz_id).await {
                    warn!(
                        "Exam server did not confirm deletion of quiz {}: {}",
                        module.quiz_id, e
                    );
                }
            }
            Err(e) => warn!("Skipping remote delete of quiz {}: {}", module.quiz_id, e),
        }
        self.purge(module).await
    }

    /// Registers the quiz with the exam server the first time it is opened.
    ///
    /// Any failure rolls the local record back so the next visit starts over.
    pub async fn ensure_registered(
        &self,
        module: &QuizModule,
        record: ExamLinkRecord,
    ) -> AppResult<ExamLinkRecord> {
        if record.called {
            return Ok(record);
        }
        if !self.links.mark_called(module.quiz_id).await? {
            return self
                .links
                .find_by_quiz(module.quiz_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Quiz has no exam server enabled".to_string()));
        }

        let registered = async {
            let gateway = self.gateway().await?;
            gateway.register_or_update_exam(module, &record).await?;
            self.store_configuration(gateway.as_ref(), module).await
        }
        .await;

        if let Err(e) = registered {
            error!(
                "Registration of quiz {} with the exam server failed: {}",
                module.quiz_id, e
            );
            self.purge(module).await?;
            return Err(e);
        }

        let mut record = record;
        record.called = true;
        Ok(record)
    }

    /// Re-downloads the configuration file of `module`, replacing the stored one.
    pub async fn fetch_client_configuration(&self, module: &QuizModule) -> AppResult<ConfigArtifact> {
        let gateway = self.gateway().await?;
        self.store_configuration(gateway.as_ref(), module).await
    }

    async fn store_configuration(
        &self,
        gateway: &dyn ExamGateway,
        module: &QuizModule,
    ) -> AppResult<ConfigArtifact> {
        // Only one file per module; the old one goes even if the download fails.
        self.artifacts.delete_for_resource(module.cmid).await?;

        let response = gateway.fetch_client_configuration(module).await?;
        let artifact = ConfigArtifact::new(
            module.cmid,
            response.body,
            response.content_disposition,
            Utc::now().timestamp(),
        );
        self.artifacts.put(artifact.clone()).await?;
        info!(
            "Stored exam server configuration for quiz {} ({} bytes)",
            module.quiz_id,
            artifact.content.len()
        );
        Ok(artifact)
    }

    /// Exam server pushes or withdraws an exam.
    pub async fn set_exam_data(&self, data: SetExamDataRequest) -> AppResult<WebserviceResult> {
        data.validate()?;
        let quiz_id = data.quiz_id;
        let module = self
            .modules
            .find_by_quiz_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Unknown quiz with id: {}", quiz_id)))?;

        if data.action == ExamDataAction::Delete {
            let removed = self.links.delete(quiz_id).await?;
            self.artifacts.delete_for_resource(module.cmid).await?;
            return Ok(if removed {
                WebserviceResult {
                    success: true,
                    context: None,
                    warnings: vec![Warning::new(
                        "quiz",
                        quiz_id,
                        "deletioninfo",
                        format!("Exam server data has been deleted for quiz: {}", quiz_id),
                    )],
                }
            } else {
                WebserviceResult::failed(Warning::new(
                    "quiz",
                    quiz_id,
                    "couldnotdeletequizdata",
                    format!("Exam server data could not be deleted for quiz: {}", quiz_id),
                ))
            });
        }

        let show_quit_button = match data.quit_link {
            Some(_) => data.show_quit_link.unwrap_or(true),
            None => false,
        };
        let existing = self.links.find_by_quiz(quiz_id).await?;
        let inserted = existing.is_none();
        let mut record = existing.unwrap_or_else(|| {
            ExamLinkRecord::new_enabled(quiz_id, 0, show_quit_button, "")
        });
        record.enabled = true;
        record.called = true;
        record.template_id = data.template_id.unwrap_or(0);
        record.show_quit_button = show_quit_button;
        record.quit_secret = data.quit_secret.unwrap_or_default();
        record.quit_link = data.quit_link.unwrap_or_default();
        record.next_quiz_id = data.next_quiz_id;
        record.next_course_id = data.next_course_id;
        record.touch();
        let record = self.links.upsert(record).await?;

        let mut warnings = vec![if inserted {
            Warning::new(
                "quiz",
                quiz_id,
                "insertrecordinfo",
                format!("Successfully inserted for quiz: {}", quiz_id),
            )
        } else {
            Warning::new(
                "quiz",
                quiz_id,
                "updaterecordinfo",
                format!("Record already exists. Successfully updated for quiz: {}", quiz_id),
            )
        }];

        let context = if record.has_next_quiz() {
            match record.next_quiz_id {
                Some(next) => self.modules.find_by_quiz_id(next).await?.map(|m| m.cmid),
                None => None,
            }
        } else {
            None
        };

        match self.fetch_client_configuration(&module).await {
            Ok(_) => {
                warnings.push(Warning::new(
                    "quiz",
                    quiz_id,
                    "requestsebconfig",
                    format!(
                        "Successfully stored exam server configuration for quiz {} (cmid {})",
                        quiz_id, module.cmid
                    ),
                ));
                Ok(WebserviceResult {
                    success: true,
                    context,
                    warnings,
                })
            }
            Err(e) => {
                warn!("Configuration download for quiz {} failed: {}", quiz_id, e);
                warnings.push(Warning::new(
                    "quiz",
                    quiz_id,
                    "requestsebconfig",
                    format!(
                        "Problem getting exam server configuration for quiz {}. Error: {}",
                        quiz_id, e
                    ),
                ));
                Ok(WebserviceResult {
                    success: false,
                    context: None,
                    warnings,
                })
            }
        }
    }

    /// Exam server switches browser-key enforcement on or off. Problems come back as warnings.
    pub async fn set_restriction(&self, request: SetRestrictionRequest) -> AppResult<RestrictionResult> {
        request.validate()?;
        let quiz_id = request.quiz_id;

        match self.apply_restriction(request).await {
            Ok((data, warnings)) => Ok(RestrictionResult {
                data: vec![data],
                warnings,
            }),
            Err(e) => {
                warn!("Restriction for quiz {} not saved: {}", quiz_id, e);
                Ok(RestrictionResult {
                    data: Vec::new(),
                    warnings: vec![Warning::new(
                        "quiz",
                        quiz_id,
                        "errorsavingrestriction",
                        e.to_string(),
                    )],
                })
            }
        }
    }

    async fn apply_restriction(
        &self,
        request: SetRestrictionRequest,
    ) -> AppResult<(RestrictionData, Vec<Warning>)> {
        let quiz_id = request.quiz_id;
        let module = self
            .modules
            .find_by_quiz_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

        let browser_keys = non_blank(&request.browser_keys);
        let config_keys = non_blank(&request.config_keys);

        if module.has_attempts {
            return Err(AppError::ValidationError(
                "Quiz already has at least one attempt. You can not change restriction."
                    .to_string(),
            ));
        }

        let record = self.links.find_by_quiz(quiz_id).await?;

        if browser_keys.is_empty() && config_keys.is_empty() {
            if let Some(mut record) = record {
                record.restricted = false;
                record.browser_keys.clear();
                record.touch();
                self.links.upsert(record).await?;
            }
            let data = RestrictionData {
                quiz_id,
                browser_keys: request.browser_keys,
                config_keys: Vec::new(),
            };
            let warning = Warning::new(
                "quiz",
                quiz_id,
                "restrictiondeleted",
                format!("You have deleted restriction for quiz: {}", quiz_id),
            );
            return Ok((data, vec![warning]));
        }

        if browser_keys.is_empty() {
            return Err(AppError::ValidationError(
                "Config keys require at least one browser exam key".to_string(),
            ));
        }

        let mut record = record.ok_or_else(|| {
            AppError::ValidationError(
                "You can not set restriction on a quiz with no exam server info".to_string(),
            )
        })?;
        if !record.enabled {
            return Err(AppError::ValidationError(
                "You can not set restriction on a quiz with the exam server disabled".to_string(),
            ));
        }

        record.restricted = true;
        record.browser_keys = browser_keys;
        record.touch();
        self.links.upsert(record).await?;
        info!("Restricted quiz {} to the announced browser exam keys", quiz_id);

        Ok((
            RestrictionData {
                quiz_id,
                browser_keys: request.browser_keys,
                config_keys: Vec::new(),
            },
            Vec::new(),
        ))
    }

    pub async fn get_restriction(&self, quiz_id: i64) -> AppResult<RestrictionResult> {
        if quiz_id <= 0 {
            return Err(AppError::ValidationError("Quiz id missing".to_string()));
        }

        let problem = match self.links.find_by_quiz(quiz_id).await? {
            None => format!("Exam server is not enabled for quiz ID {}", quiz_id),
            Some(record) if !record.enabled => {
                format!("Exam server is disabled for quiz ID {}", quiz_id)
            }
            Some(record) => {
                return Ok(RestrictionResult {
                    data: vec![RestrictionData {
                        quiz_id,
                        browser_keys: split_keys(&record.browser_keys),
                        config_keys: Vec::new(),
                    }],
                    warnings: Vec::new(),
                })
            }
        };

        Ok(RestrictionResult {
            data: Vec::new(),
            warnings: vec![Warning::new(
                "quiz",
                quiz_id,
                "errorgettingrestriction",
                problem,
            )],
        })
    }
}

fn non_blank(keys: &[String]) -> Vec<String> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stored keys may hold several whitespace, comma or semicolon separated values each.
fn split_keys(keys: &[String]) -> Vec<String> {
    keys.iter()
        .flat_map(|k| k.split(|c: char| c.is_whitespace() || c == ',' || c == ';'))
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase)
        .collect()
}
