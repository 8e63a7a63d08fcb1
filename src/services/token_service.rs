use std::{net::IpAddr, sync::Arc};

use chrono::Utc;
use log::{debug, info};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{
        login_token::{generate_token_value, hash_token},
        LoginToken, RejectReason, User, LOGIN_TOKEN_NAMESPACE,
    },
    repositories::{LoginTokenRepository, UserRepository},
    services::session_service::{IssuedSession, SessionContext, SessionService},
};

/// Mints single-use hand-off tokens. At most one live token per user.
pub struct TokenIssuer {
    tokens: Arc<dyn LoginTokenRepository>,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn LoginTokenRepository>) -> Self {
        Self { tokens }
    }

    /// Returns the plain token value. Only its digest is persisted.
    pub async fn issue(
        &self,
        user: &User,
        resource_id: i64,
        ip_restriction: Option<&str>,
        ttl_secs: i64,
    ) -> AppResult<String> {
        if user.is_admin() {
            return Err(AppError::Authorization(
                "Automatic login tokens can not be issued to site administrators".to_string(),
            ));
        }
        if user.is_guest() {
            return Err(AppError::Authorization(
                "Automatic login tokens can not be issued to guests".to_string(),
            ));
        }

        self.tokens
            .delete_for_user(LOGIN_TOKEN_NAMESPACE, user.id)
            .await?;

        let value = generate_token_value();
        let token = LoginToken::new(
            LOGIN_TOKEN_NAMESPACE,
            &value,
            user.id,
            resource_id,
            ip_restriction.map(str::to_string),
            ttl_secs,
            Utc::now().timestamp(),
        );
        self.tokens.replace_for_user(token).await?;

        info!(
            "Issued login token for user {} on module {} (ttl {}s)",
            user.id, resource_id, ttl_secs
        );
        Ok(value)
    }
}

/// Everything the redeem endpoint knows about the incoming request.
#[derive(Debug, Clone, Copy)]
pub struct RedeemRequest<'a> {
    pub resource_id: i64,
    pub user_id: i64,
    pub token: &'a str,
    pub client_addr: Option<IpAddr>,
    pub https: bool,
    pub current: Option<&'a SessionContext>,
}

#[derive(Debug)]
pub enum RedeemOutcome {
    /// The claimed user was already signed in; nothing new was created.
    Resumed,
    LoggedIn(IssuedSession),
    Rejected(RejectReason),
}

pub struct TokenRedeemer {
    tokens: Arc<dyn LoginTokenRepository>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionService>,
    webservices_enabled: bool,
}

impl TokenRedeemer {
    pub fn new(
        tokens: Arc<dyn LoginTokenRepository>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionService>,
        webservices_enabled: bool,
    ) -> Self {
        Self {
            tokens,
            users,
            sessions,
            webservices_enabled,
        }
    }

    pub async fn redeem(&self, request: RedeemRequest<'_>) -> AppResult<RedeemOutcome> {
        let outcome = self.run(request).await?;
        match &outcome {
            RedeemOutcome::Resumed => info!(
                "User {} re-entered module {} with an existing session",
                request.user_id, request.resource_id
            ),
            RedeemOutcome::LoggedIn(issued) => info!(
                "User {} signed in on module {} via login token (session {})",
                request.user_id, request.resource_id, issued.session.session_id
            ),
            RedeemOutcome::Rejected(reason) => debug!(
                "Login token for user {} on module {} rejected: {}",
                request.user_id,
                request.resource_id,
                reason.code()
            ),
        }
        Ok(outcome)
    }

    async fn run(&self, request: RedeemRequest<'_>) -> AppResult<RedeemOutcome> {
        if let Some(current) = request.current.filter(|c| !c.user.is_guest()) {
            self.tokens
                .delete_for_user_resource(LOGIN_TOKEN_NAMESPACE, request.user_id, request.resource_id)
                .await?;
            if current.user_id() == request.user_id {
                return Ok(RedeemOutcome::Resumed);
            }
            return Ok(RedeemOutcome::Rejected(RejectReason::SessionUserMismatch));
        }

        // From here on the presented value is spent, whatever the verdict.
        let token = self
            .tokens
            .take(LOGIN_TOKEN_NAMESPACE, &hash_token(request.token), request.resource_id)
            .await?;

        if !self.webservices_enabled {
            return Ok(RedeemOutcome::Rejected(RejectReason::WebservicesDisabled));
        }
        if !request.https {
            return Ok(RedeemOutcome::Rejected(RejectReason::HttpsRequired));
        }

        let user = self.users.find_by_id(request.user_id).await?;
        if user.as_ref().map(User::is_admin).unwrap_or(false) {
            return Ok(RedeemOutcome::Rejected(RejectReason::AdminNotAllowed));
        }

        let Some(token) = token else {
            return Ok(RedeemOutcome::Rejected(RejectReason::TokenNotFound));
        };
        if token.is_expired_at(Utc::now().timestamp()) {
            return Ok(RedeemOutcome::Rejected(RejectReason::TokenExpired));
        }
        if !token.allows_address(request.client_addr) {
            return Ok(RedeemOutcome::Rejected(RejectReason::IpMismatch));
        }
        if token.user_id != request.user_id {
            return Ok(RedeemOutcome::Rejected(RejectReason::TokenUserMismatch));
        }

        let Some(user) = user else {
            return Ok(RedeemOutcome::Rejected(RejectReason::UserNotFound));
        };
        if !user.is_active() {
            return Ok(RedeemOutcome::Rejected(RejectReason::UserInactive));
        }

        let issued = self.sessions.login(&user).await?;
        Ok(RedeemOutcome::LoggedIn(issued))
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::{
        auth::jwt::SessionTokenService,
        models::domain::UserRole,
        repositories::memory::{
            InMemoryLoginTokenRepository, InMemorySessionRepository, InMemoryUserRepository,
        },
    };

    struct Fixture {
        issuer: TokenIssuer,
        redeemer: TokenRedeemer,
        tokens: Arc<InMemoryLoginTokenRepository>,
        sessions: Arc<SessionService>,
        users: Arc<InMemoryUserRepository>,
    }

    async fn fixture(webservices_enabled: bool) -> Fixture {
        let tokens = Arc::new(InMemoryLoginTokenRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        for user in [
            User::new(42, "student", "Stu", "Dent", UserRole::Student),
            User::new(43, "other", "Oth", "Er", UserRole::Student),
            User::new(2, "admin", "Site", "Admin", UserRole::Admin),
        ] {
            users.upsert(user).await.unwrap();
        }

        let sessions = Arc::new(SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            users.clone(),
            SessionTokenService::new(&SecretString::from("test_session_secret_key".to_string())),
            60,
            0,
            true,
        ));

        Fixture {
            issuer: TokenIssuer::new(tokens.clone()),
            redeemer: TokenRedeemer::new(
                tokens.clone(),
                users.clone(),
                sessions.clone(),
                webservices_enabled,
            ),
            tokens,
            sessions,
            users,
        }
    }

    fn request<'a>(user_id: i64, token: &'a str, addr: &str) -> RedeemRequest<'a> {
        RedeemRequest {
            resource_id: 7,
            user_id,
            token,
            client_addr: Some(addr.parse().unwrap()),
            https: true,
            current: None,
        }
    }

    async fn student(f: &Fixture) -> User {
        f.users.find_by_id(42).await.unwrap().unwrap()
    }

    fn rejected(outcome: RedeemOutcome) -> RejectReason {
        match outcome {
            RedeemOutcome::Rejected(reason) => reason,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_issue_then_redeem_once() {
        let f = fixture(true).await;
        let user = student(&f).await;
        let token = f
            .issuer
            .issue(&user, 7, Some("10.0.0.5/32"), 900)
            .await
            .unwrap();

        let first = f.redeemer.redeem(request(42, &token, "10.0.0.5")).await.unwrap();
        assert!(matches!(first, RedeemOutcome::LoggedIn(_)));

        let second = f.redeemer.redeem(request(42, &token, "10.0.0.5")).await.unwrap();
        assert_eq!(rejected(second), RejectReason::TokenNotFound);
    }

    #[actix_web::test]
    async fn test_second_issue_invalidates_first() {
        let f = fixture(true).await;
        let user = student(&f).await;
        let first = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        let second = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        assert_eq!(f.tokens.len().await, 1);

        let outcome = f.redeemer.redeem(request(42, &first, "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::TokenNotFound);
        let outcome = f.redeemer.redeem(request(42, &second, "1.2.3.4")).await.unwrap();
        assert!(matches!(outcome, RedeemOutcome::LoggedIn(_)));
    }

    #[actix_web::test]
    async fn test_failed_attempt_still_consumes_token() {
        let f = fixture(true).await;
        let user = student(&f).await;
        let token = f
            .issuer
            .issue(&user, 7, Some("10.0.0.0/24"), 900)
            .await
            .unwrap();

        let outcome = f.redeemer.redeem(request(42, &token, "192.168.1.1")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::IpMismatch);

        let outcome = f.redeemer.redeem(request(42, &token, "10.0.0.9")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::TokenNotFound);
    }

    #[actix_web::test]
    async fn test_expiry_boundaries() {
        let f = fixture(true).await;
        let now = Utc::now().timestamp();

        f.tokens
            .replace_for_user(LoginToken::new(LOGIN_TOKEN_NAMESPACE, "expired", 42, 7, None, -1, now))
            .await
            .unwrap();
        let outcome = f.redeemer.redeem(request(42, "expired", "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::TokenExpired);

        f.tokens
            .replace_for_user(LoginToken::new(LOGIN_TOKEN_NAMESPACE, "fresh", 42, 7, None, 1, now))
            .await
            .unwrap();
        let outcome = f.redeemer.redeem(request(42, "fresh", "1.2.3.4")).await.unwrap();
        assert!(matches!(outcome, RedeemOutcome::LoggedIn(_)));
    }

    #[actix_web::test]
    async fn test_admins_never_get_tokens() {
        let f = fixture(true).await;
        let admin = f.users.find_by_id(2).await.unwrap().unwrap();
        let result = f.issuer.issue(&admin, 7, None, 900).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
        assert_eq!(f.tokens.len().await, 0);

        let guest = User::new(1, "guest", "Guest", "User", UserRole::Guest);
        assert!(f.issuer.issue(&guest, 7, None, 900).await.is_err());
    }

    #[actix_web::test]
    async fn test_admin_claim_rejected() {
        let f = fixture(true).await;
        let now = Utc::now().timestamp();
        f.tokens
            .replace_for_user(LoginToken::new(LOGIN_TOKEN_NAMESPACE, "planted", 2, 7, None, 60, now))
            .await
            .unwrap();

        let outcome = f.redeemer.redeem(request(2, "planted", "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::AdminNotAllowed);
        assert_eq!(f.tokens.len().await, 0);
    }

    #[actix_web::test]
    async fn test_token_bound_to_resource_and_user() {
        let f = fixture(true).await;
        let user = student(&f).await;
        let token = f.issuer.issue(&user, 7, None, 900).await.unwrap();

        let mut wrong_resource = request(42, &token, "1.2.3.4");
        wrong_resource.resource_id = 8;
        let outcome = f.redeemer.redeem(wrong_resource).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::TokenNotFound);

        let outcome = f.redeemer.redeem(request(43, &token, "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::TokenUserMismatch);
    }

    #[actix_web::test]
    async fn test_transport_and_site_checks() {
        let f = fixture(false).await;
        let user = student(&f).await;
        let token = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        let outcome = f.redeemer.redeem(request(42, &token, "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::WebservicesDisabled);

        let f = fixture(true).await;
        let token = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        let mut plain = request(42, &token, "1.2.3.4");
        plain.https = false;
        let outcome = f.redeemer.redeem(plain).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::HttpsRequired);
    }

    #[actix_web::test]
    async fn test_suspended_user_rejected() {
        let f = fixture(true).await;
        let mut user = student(&f).await;
        let token = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        user.suspended = true;
        f.users.upsert(user).await.unwrap();

        let outcome = f.redeemer.redeem(request(42, &token, "1.2.3.4")).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::UserInactive);
    }

    #[actix_web::test]
    async fn test_existing_session_resumes_or_mismatches() {
        let f = fixture(true).await;
        let user = student(&f).await;
        let issued = f.sessions.login(&user).await.unwrap();
        let current = f.sessions.resolve(&issued.token).await.unwrap().unwrap();

        let token = f.issuer.issue(&user, 7, None, 900).await.unwrap();
        let mut same = request(42, &token, "1.2.3.4");
        same.current = Some(&current);
        assert!(matches!(
            f.redeemer.redeem(same).await.unwrap(),
            RedeemOutcome::Resumed
        ));
        assert_eq!(f.tokens.len().await, 0);

        let other = f.users.find_by_id(43).await.unwrap().unwrap();
        let token = f.issuer.issue(&other, 7, None, 900).await.unwrap();
        let mut mismatch = request(43, &token, "1.2.3.4");
        mismatch.current = Some(&current);
        let outcome = f.redeemer.redeem(mismatch).await.unwrap();
        assert_eq!(rejected(outcome), RejectReason::SessionUserMismatch);
        assert_eq!(f.tokens.len().await, 0);
    }
}
