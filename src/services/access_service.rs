use std::{net::IpAddr, sync::Arc};

use chrono::Utc;
use log::{info, warn};
use url::Url;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{config_artifact::ARTIFACT_FILENAME, ExamLinkRecord, QuizModule, User},
        dto::response::{AccessView, NextQuiz, Warning},
    },
    services::{
        exam_link_service::ExamLinkService, session_service::SessionContext,
        token_service::TokenIssuer,
    },
};

/// What the transport tells us about the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientInfo {
    pub addr: Option<IpAddr>,
    pub https: bool,
    /// The request already comes from the kiosk browser.
    pub kiosk: bool,
}

pub struct AccessService {
    exam_links: Arc<ExamLinkService>,
    issuer: Arc<TokenIssuer>,
    site_root: String,
    launch_ttl_secs: i64,
    monitor_ttl_secs: i64,
}

impl AccessService {
    pub fn new(
        exam_links: Arc<ExamLinkService>,
        issuer: Arc<TokenIssuer>,
        site_root: &str,
        launch_ttl_secs: i64,
        monitor_ttl_secs: i64,
    ) -> Self {
        Self {
            exam_links,
            issuer,
            site_root: site_root.trim_end_matches('/').to_string(),
            launch_ttl_secs,
            monitor_ttl_secs,
        }
    }

    pub fn artifact_url(&self, cmid: i64) -> String {
        format!("{}/artifacts/{}/{}", self.site_root, cmid, ARTIFACT_FILENAME)
    }

    fn redeem_url(&self, user: &User, cmid: i64, token: &str) -> AppResult<String> {
        let mut url = Url::parse(&format!("{}/login/redeem", self.site_root))
            .map_err(|e| AppError::InternalError(format!("Invalid site root: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("resource_id", &cmid.to_string())
            .append_pair("user_id", &user.id.to_string())
            .append_pair("token", token)
            .append_pair("destination_url", &self.artifact_url(cmid));
        Ok(url.to_string())
    }

    fn download_url(&self, cmid: i64, https: bool) -> AppResult<String> {
        let mut url = Url::parse(&self.artifact_url(cmid))
            .map_err(|e| AppError::InternalError(format!("Invalid site root: {}", e)))?;
        // http <-> https is always allowed by the url crate.
        let _ = url.set_scheme(if https { "https" } else { "http" });
        url.query_pairs_mut().append_pair("forcedownload", "1");
        Ok(url.to_string())
    }

    fn quiz_url(&self, cmid: i64) -> String {
        format!("{}/quiz/{}/access", self.site_root, cmid)
    }

    /// A chained quiz takes precedence over the plain quit link.
    fn quit_url(&self, record: &ExamLinkRecord, next: Option<&QuizModule>) -> Option<String> {
        if record.has_next_quiz() {
            match next {
                Some(next) => return Some(kiosk_scheme(&self.artifact_url(next.cmid), true)),
                None => warn!(
                    "Quiz {} chains to quiz {:?}, which does not exist",
                    record.quiz_id, record.next_quiz_id
                ),
            }
        }
        if record.show_quit_button && !record.quit_link.is_empty() {
            return Some(record.quit_link.clone());
        }
        None
    }

    fn remote_login_url(&self, cmid: i64, sesskey: &str) -> String {
        format!(
            "{}/quiz/{}/remote-login?sesskey={}",
            self.site_root, cmid, sesskey
        )
    }

    /// Builds the quiz page actions, registering the quiz with the exam server on first use.
    pub async fn view(
        &self,
        ctx: &SessionContext,
        cmid: i64,
        client: ClientInfo,
    ) -> AppResult<AccessView> {
        let user = &ctx.user;
        let module = self.exam_links.module(cmid).await?;
        self.exam_links.profile().await?;

        let record = self
            .exam_links
            .find(module.quiz_id)
            .await?
            .filter(|r| r.enabled)
            .ok_or_else(|| AppError::NotFound("Quiz has no exam server enabled".to_string()))?;
        let record = self.exam_links.ensure_registered(&module, record).await?;

        let mut view = AccessView {
            cmid,
            quiz_id: module.quiz_id,
            restricted: record.restricted,
            show_actions: !client.kiosk,
            launch_url: None,
            download_url: None,
            remote_login_url: None,
            quit_url: None,
            next_quiz: None,
            warnings: Vec::new(),
        };

        let next_module = match record.next_quiz_id.filter(|id| *id > 0) {
            Some(next_quiz_id) => self.exam_links.module_for_quiz(next_quiz_id).await?,
            None => None,
        };
        if user.can_use_remote_login() {
            view.next_quiz = next_module.as_ref().map(|next| NextQuiz {
                cmid: next.cmid,
                quiz_id: next.quiz_id,
                name: next.name.clone(),
                course_fullname: next.course.fullname.clone(),
                url: self.quiz_url(next.cmid),
            });
        }
        if client.kiosk && module.has_finished_attempt(user.id) {
            view.quit_url = self.quit_url(&record, next_module.as_ref());
        }

        if !record.restricted {
            if user.can_bypass_restriction() {
                view.warnings.push(Warning::new(
                    "quiz",
                    module.quiz_id,
                    "examnotrestrictedyet",
                    "The exam server has not restricted this exam yet.",
                ));
            } else {
                view.warnings.push(Warning::new(
                    "quiz",
                    module.quiz_id,
                    "notavailable",
                    "This quiz is not available yet.",
                ));
                view.show_actions = false;
            }
        }

        let now = Utc::now().timestamp();
        if module.is_closed_at(now) && !user.can_bypass_restriction() {
            view.show_actions = false;
        }
        if !view.show_actions {
            return Ok(view);
        }

        match self.exam_links.artifact(cmid).await? {
            Some(_) => {
                let target = if user.is_admin() {
                    self.artifact_url(cmid)
                } else {
                    let restriction = client.addr.map(|a| a.to_string());
                    let token = self
                        .issuer
                        .issue(user, cmid, restriction.as_deref(), self.launch_ttl_secs)
                        .await?;
                    self.redeem_url(user, cmid, &token)?
                };
                view.launch_url = Some(kiosk_scheme(&target, client.https));
                view.download_url = Some(self.download_url(cmid, client.https)?);
            }
            None => view.warnings.push(Warning::new(
                "quiz",
                module.quiz_id,
                "config_not_found",
                "The exam server configuration file was not found.",
            )),
        }

        if user.can_use_remote_login() && !module.is_closed_at(now) {
            view.remote_login_url = Some(self.remote_login_url(cmid, &ctx.session.sesskey));
        }

        Ok(view)
    }

    /// Short-lived hand-off that opens the configuration in the kiosk browser.
    pub async fn autologin_url(
        &self,
        ctx: &SessionContext,
        cmid: i64,
        client: ClientInfo,
    ) -> AppResult<String> {
        let user = &ctx.user;
        if user.is_admin() {
            return Err(AppError::Authorization(
                "Admins are not allowed to use autologin".to_string(),
            ));
        }
        self.exam_links.module(cmid).await?;
        if self.exam_links.artifact(cmid).await?.is_none() {
            return Err(AppError::ArtifactNotFound(format!(
                "no configuration file for module {}",
                cmid
            )));
        }

        let restriction = client.addr.map(|a| a.to_string());
        let token = self
            .issuer
            .issue(user, cmid, restriction.as_deref(), self.monitor_ttl_secs)
            .await?;
        Ok(kiosk_scheme(&self.redeem_url(user, cmid, &token)?, client.https))
    }

    /// Asks the exam server for a one-off login link into its console.
    pub async fn remote_login_link(&self, ctx: &SessionContext, cmid: i64) -> AppResult<String> {
        let user = &ctx.user;
        if !user.can_use_remote_login() {
            return Err(AppError::Authorization(
                "You do not have permission to access this page.".to_string(),
            ));
        }
        let module: QuizModule = self.exam_links.module(cmid).await?;
        let gateway = self.exam_links.gateway().await?;
        let link = gateway.request_external_login_link(&module, user).await?;
        info!(
            "User {} redirected to the exam server console for quiz {}",
            user.id, module.quiz_id
        );
        Ok(link)
    }
}

/// Swaps the transport scheme for the kiosk browser's `seb://` / `sebs://`.
pub fn kiosk_scheme(url: &str, https: bool) -> String {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    format!("{}://{}", if https { "sebs" } else { "seb" }, rest)
}
