use std::sync::Arc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use chrono::Utc;
use log::{debug, info};

use crate::{
    auth::{claims::SessionClaims, jwt::SessionTokenService, utils::secrets_match},
    errors::{AppError, AppResult},
    models::domain::{Session, User},
    repositories::{SessionRepository, UserRepository},
};

pub const SESSION_COOKIE: &str = "EXAMGATE_SESSION";

/// A verified session, resolved once per request by the session middleware.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub claims: SessionClaims,
    pub session: Session,
    pub user: User,
}

impl SessionContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn require_sesskey(&self, sesskey: &str) -> AppResult<()> {
        if !secrets_match(sesskey, &self.session.sesskey) {
            return Err(AppError::Authorization(
                "Invalid session key (sesskey)".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    tokens: SessionTokenService,
    ttl_secs: i64,
    max_concurrent: u32,
    secure_cookie: bool,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        tokens: SessionTokenService,
        ttl_minutes: i64,
        max_concurrent: u32,
        secure_cookie: bool,
    ) -> Self {
        Self {
            sessions,
            users,
            tokens,
            ttl_secs: ttl_minutes * 60,
            max_concurrent,
            secure_cookie,
        }
    }

    /// Opens a new session for `user` and trims the oldest ones beyond the concurrency limit.
    pub async fn login(&self, user: &User) -> AppResult<IssuedSession> {
        let now = Utc::now().timestamp();
        self.sessions.delete_expired(now).await?;

        let session = self
            .sessions
            .create(Session::new(user.id, self.ttl_secs, now))
            .await?;
        self.enforce_limit(user.id, &session.session_id).await?;

        let token = self.tokens.create_token(user, &session)?;
        info!("Opened session {} for user {}", session.session_id, user.id);

        Ok(IssuedSession { token, session })
    }

    async fn enforce_limit(&self, user_id: i64, keep: &str) -> AppResult<()> {
        if self.max_concurrent == 0 {
            return Ok(());
        }

        let sessions = self.sessions.list_for_user(user_id).await?;
        let excess = sessions.len().saturating_sub(self.max_concurrent as usize);
        let oldest = sessions.iter().filter(|s| s.session_id != keep);
        for session in oldest.take(excess) {
            self.sessions.delete(&session.session_id).await?;
            info!(
                "Closed session {} of user {}: concurrent session limit reached",
                session.session_id, user_id
            );
        }
        Ok(())
    }

    /// Resolves a cookie value into a live session. Anything stale or forged is treated as no session.
    pub async fn resolve(&self, token: &str) -> AppResult<Option<SessionContext>> {
        let claims = match self.tokens.validate_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Ignoring session cookie: {}", e);
                return Ok(None);
            }
        };

        let Some(session) = self.sessions.find(&claims.sid).await? else {
            return Ok(None);
        };

        let now = Utc::now().timestamp();
        if session.is_expired_at(now) {
            self.sessions.delete(&session.session_id).await?;
            return Ok(None);
        }

        if claims.user_id() != Some(session.user_id) {
            return Ok(None);
        }

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            return Ok(None);
        };
        if !user.is_active() {
            return Ok(None);
        }

        self.sessions.touch(&session.session_id, now).await?;

        Ok(Some(SessionContext {
            claims,
            session,
            user,
        }))
    }

    pub async fn logout(&self, session_id: &str) -> AppResult<()> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }

    pub fn cookie(&self, issued: &IssuedSession) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, issued.token.clone())
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(self.ttl_secs))
            .finish()
    }
}
