use std::sync::Arc;

use log::info;

use crate::{
    auth::jwt::SessionTokenService,
    config::{Config, StorageBackend},
    db::Database,
    errors::AppResult,
    repositories::{
        memory::{
            InMemoryArtifactRepository, InMemoryConnectionRepository, InMemoryExamLinkRepository,
            InMemoryLoginTokenRepository, InMemoryQuizModuleRepository, InMemorySessionRepository,
            InMemoryUserRepository,
        },
        ArtifactRepository, ConnectionRepository, ExamLinkRepository, LoginTokenRepository,
        MongoArtifactRepository, MongoConnectionRepository, MongoExamLinkRepository,
        MongoLoginTokenRepository, MongoQuizModuleRepository, MongoSessionRepository,
        MongoUserRepository, QuizModuleRepository, SessionRepository, UserRepository,
    },
    services::{
        access_service::AccessService,
        connection_service::ConnectionService,
        exam_catalog::ExamCatalog,
        exam_link_service::ExamLinkService,
        gateway_client::{GatewayFactory, GatewaySettings, HttpGatewayFactory},
        redirect::RedirectMediator,
        session_service::SessionService,
        token_service::{TokenIssuer, TokenRedeemer},
    },
};

/// One handle per collection.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub login_tokens: Arc<dyn LoginTokenRepository>,
    pub exam_links: Arc<dyn ExamLinkRepository>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub modules: Arc<dyn QuizModuleRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
}

impl Repositories {
    pub async fn mongo(db: &Database) -> AppResult<Self> {
        let users = MongoUserRepository::new(db);
        users.ensure_indexes().await?;
        let sessions = MongoSessionRepository::new(db);
        sessions.ensure_indexes().await?;
        let login_tokens = MongoLoginTokenRepository::new(db);
        login_tokens.ensure_indexes().await?;
        let exam_links = MongoExamLinkRepository::new(db);
        exam_links.ensure_indexes().await?;
        let modules = MongoQuizModuleRepository::new(db);
        modules.ensure_indexes().await?;
        let artifacts = MongoArtifactRepository::new(db);
        artifacts.ensure_indexes().await?;

        Ok(Self {
            users: Arc::new(users),
            sessions: Arc::new(sessions),
            login_tokens: Arc::new(login_tokens),
            exam_links: Arc::new(exam_links),
            connections: Arc::new(MongoConnectionRepository::new(db)),
            modules: Arc::new(modules),
            artifacts: Arc::new(artifacts),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            login_tokens: Arc::new(InMemoryLoginTokenRepository::new()),
            exam_links: Arc::new(InMemoryExamLinkRepository::new()),
            connections: Arc::new(InMemoryConnectionRepository::new()),
            modules: Arc::new(InMemoryQuizModuleRepository::new()),
            artifacts: Arc::new(InMemoryArtifactRepository::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session_service: Arc<SessionService>,
    pub token_issuer: Arc<TokenIssuer>,
    pub token_redeemer: Arc<TokenRedeemer>,
    pub exam_links: Arc<ExamLinkService>,
    pub connections: Arc<ConnectionService>,
    pub catalog: Arc<ExamCatalog>,
    pub access: Arc<AccessService>,
    pub mediator: RedirectMediator,
    pub storage: &'static str,
    db: Option<Database>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let gateways = Arc::new(HttpGatewayFactory::new(GatewaySettings::from_config(&config)));

        match config.storage_backend {
            StorageBackend::Mongo => {
                let db = Database::connect(&config).await?;
                let repositories = Repositories::mongo(&db).await?;
                Self::from_parts(config, repositories, gateways, Some(db))
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage; nothing survives a restart");
                Self::from_parts(config, Repositories::in_memory(), gateways, None)
            }
        }
    }

    pub fn from_parts(
        config: Config,
        repositories: Repositories,
        gateways: Arc<dyn GatewayFactory>,
        db: Option<Database>,
    ) -> AppResult<Self> {
        let session_service = Arc::new(SessionService::new(
            repositories.sessions.clone(),
            repositories.users.clone(),
            SessionTokenService::new(&config.session_secret),
            config.session_ttl_minutes,
            config.max_concurrent_sessions,
            config.site_root.starts_with("https://"),
        ));

        let token_issuer = Arc::new(TokenIssuer::new(repositories.login_tokens.clone()));
        let token_redeemer = Arc::new(TokenRedeemer::new(
            repositories.login_tokens.clone(),
            repositories.users.clone(),
            session_service.clone(),
            config.webservices_enabled,
        ));

        let exam_links = Arc::new(ExamLinkService::new(
            repositories.exam_links.clone(),
            repositories.artifacts.clone(),
            repositories.connections.clone(),
            repositories.modules.clone(),
            gateways,
        ));
        let connections = Arc::new(ConnectionService::new(repositories.connections.clone()));
        let catalog = Arc::new(ExamCatalog::new(repositories.modules.clone()));

        let access = Arc::new(AccessService::new(
            exam_links.clone(),
            token_issuer.clone(),
            &config.site_root,
            config.launch_token_ttl_secs,
            config.monitor_token_ttl_secs,
        ));
        let mediator = RedirectMediator::new(&config.site_root, config.redirect_delay_secs)?;

        let storage = if db.is_some() { "mongo" } else { "memory" };

        Ok(Self {
            config: Arc::new(config),
            session_service,
            token_issuer,
            token_redeemer,
            exam_links,
            connections,
            catalog,
            access,
            mediator,
            storage,
            db,
        })
    }

    /// Pings the database when there is one.
    pub async fn storage_healthy(&self) -> bool {
        match &self.db {
            Some(db) => db.health_check().await.is_ok(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_in_memory_state() {
        let gateways = Arc::new(HttpGatewayFactory::new(GatewaySettings::default()));
        let state = AppState::from_parts(
            Config::test_config(),
            Repositories::in_memory(),
            gateways,
            None,
        )
        .unwrap();
        assert_eq!(state.storage, "memory");
        assert_eq!(state.mediator.site_root(), "https://lms.example.org");
    }
}
