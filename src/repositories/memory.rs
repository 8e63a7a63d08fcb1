//! In-process repositories for tests and `STORAGE_BACKEND=memory` runs.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    errors::AppResult,
    models::domain::{
        ConfigArtifact, ExamLinkRecord, LoginToken, QuizModule, RemoteConnectionProfile, Session,
        User,
    },
    repositories::{
        ArtifactRepository, ConnectionRepository, ExamLinkRepository, LoginTokenRepository,
        QuizModuleRepository, SessionRepository, UserRepository,
    },
};

#[derive(Default, Clone)]
pub struct InMemoryLoginTokenRepository {
    tokens: Arc<RwLock<Vec<LoginToken>>>,
}

impl InMemoryLoginTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn held_by(&self, namespace: &str, user_id: i64) -> Option<LoginToken> {
        self.tokens
            .read()
            .await
            .iter()
            .find(|t| t.namespace == namespace && t.user_id == user_id)
            .cloned()
    }
}

#[async_trait]
impl LoginTokenRepository for InMemoryLoginTokenRepository {
    async fn replace_for_user(&self, token: LoginToken) -> AppResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.retain(|t| !(t.namespace == token.namespace && t.user_id == token.user_id));
        tokens.push(token);
        Ok(())
    }

    async fn delete_for_user(&self, namespace: &str, user_id: i64) -> AppResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| !(t.namespace == namespace && t.user_id == user_id));
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_for_user_resource(
        &self,
        namespace: &str,
        user_id: i64,
        resource_id: i64,
    ) -> AppResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| {
            !(t.namespace == namespace && t.user_id == user_id && t.resource_id == resource_id)
        });
        Ok((before - tokens.len()) as u64)
    }

    async fn take(
        &self,
        namespace: &str,
        value_hash: &str,
        resource_id: i64,
    ) -> AppResult<Option<LoginToken>> {
        let mut tokens = self.tokens.write().await;
        let position = tokens.iter().position(|t| {
            t.namespace == namespace && t.value_hash == value_hash && t.resource_id == resource_id
        });
        Ok(position.map(|i| tokens.remove(i)))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryExamLinkRepository {
    records: Arc<RwLock<HashMap<i64, ExamLinkRecord>>>,
}

impl InMemoryExamLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamLinkRepository for InMemoryExamLinkRepository {
    async fn find_by_quiz(&self, quiz_id: i64) -> AppResult<Option<ExamLinkRecord>> {
        Ok(self.records.read().await.get(&quiz_id).cloned())
    }

    async fn upsert(&self, record: ExamLinkRecord) -> AppResult<ExamLinkRecord> {
        self.records
            .write()
            .await
            .insert(record.quiz_id, record.clone());
        Ok(record)
    }

    async fn delete(&self, quiz_id: i64) -> AppResult<bool> {
        Ok(self.records.write().await.remove(&quiz_id).is_some())
    }

    async fn mark_called(&self, quiz_id: i64) -> AppResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&quiz_id) {
            Some(record) if !record.called => {
                record.called = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryConnectionRepository {
    profile: Arc<RwLock<Option<RemoteConnectionProfile>>>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: RemoteConnectionProfile) -> Self {
        Self {
            profile: Arc::new(RwLock::new(Some(profile))),
        }
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn get(&self) -> AppResult<Option<RemoteConnectionProfile>> {
        Ok(self.profile.read().await.clone())
    }

    async fn put(&self, profile: RemoteConnectionProfile) -> AppResult<()> {
        *self.profile.write().await = Some(profile);
        Ok(())
    }

    async fn delete(&self) -> AppResult<bool> {
        Ok(self.profile.write().await.take().is_some())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<i64, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn upsert(&self, user: User) -> AppResult<User> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: Session) -> AppResult<Session> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn find(&self, session_id: &str) -> AppResult<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn touch(&self, session_id: &str, now: i64) -> AppResult<()> {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.last_access = now;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AppResult<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut items: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(items)
    }

    async fn delete_expired(&self, now: i64) -> AppResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryQuizModuleRepository {
    modules: Arc<RwLock<HashMap<i64, QuizModule>>>,
}

impl InMemoryQuizModuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizModuleRepository for InMemoryQuizModuleRepository {
    async fn find_by_cmid(&self, cmid: i64) -> AppResult<Option<QuizModule>> {
        Ok(self.modules.read().await.get(&cmid).cloned())
    }

    async fn find_by_quiz_id(&self, quiz_id: i64) -> AppResult<Option<QuizModule>> {
        Ok(self
            .modules
            .read()
            .await
            .values()
            .find(|m| m.quiz_id == quiz_id)
            .cloned())
    }

    async fn upsert(&self, module: QuizModule) -> AppResult<QuizModule> {
        self.modules.write().await.insert(module.cmid, module.clone());
        Ok(module)
    }

    async fn list(&self) -> AppResult<Vec<QuizModule>> {
        let mut modules: Vec<QuizModule> = self.modules.read().await.values().cloned().collect();
        modules.sort_by_key(|m| (m.course.id, m.cmid));
        Ok(modules)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryArtifactRepository {
    artifacts: Arc<RwLock<HashMap<i64, ConfigArtifact>>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryArtifactRepository {
    async fn find(&self, resource_id: i64) -> AppResult<Option<ConfigArtifact>> {
        Ok(self.artifacts.read().await.get(&resource_id).cloned())
    }

    async fn put(&self, artifact: ConfigArtifact) -> AppResult<()> {
        self.artifacts
            .write()
            .await
            .insert(artifact.resource_id, artifact);
        Ok(())
    }

    async fn delete_for_resource(&self, resource_id: i64) -> AppResult<u64> {
        Ok(u64::from(
            self.artifacts.write().await.remove(&resource_id).is_some(),
        ))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{login_token::hash_token, LOGIN_TOKEN_NAMESPACE};

    fn token(user_id: i64, resource_id: i64, value: &str) -> LoginToken {
        LoginToken::new(LOGIN_TOKEN_NAMESPACE, value, user_id, resource_id, None, 60, 1_000)
    }

    #[tokio::test]
    async fn test_replace_keeps_one_token_per_user() {
        let repo = InMemoryLoginTokenRepository::new();
        repo.replace_for_user(token(42, 7, "first")).await.unwrap();
        repo.replace_for_user(token(42, 7, "second")).await.unwrap();
        repo.replace_for_user(token(43, 7, "other")).await.unwrap();

        assert_eq!(repo.len().await, 2);
        let held = repo.held_by(LOGIN_TOKEN_NAMESPACE, 42).await.unwrap();
        assert_eq!(held.value_hash, hash_token("second"));
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let repo = InMemoryLoginTokenRepository::new();
        repo.replace_for_user(token(42, 7, "v")).await.unwrap();

        let hash = hash_token("v");
        assert!(repo
            .take(LOGIN_TOKEN_NAMESPACE, &hash, 8)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .take(LOGIN_TOKEN_NAMESPACE, &hash, 7)
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .take(LOGIN_TOKEN_NAMESPACE, &hash, 7)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mark_called_transitions_once() {
        let repo = InMemoryExamLinkRepository::new();
        repo.upsert(ExamLinkRecord::new_enabled(3, 1, true, ""))
            .await
            .unwrap();

        assert!(repo.mark_called(3).await.unwrap());
        assert!(!repo.mark_called(3).await.unwrap());
        assert!(!repo.mark_called(99).await.unwrap());
    }
}
