use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSKEY_LENGTH: usize = 10;

/// Server-side half of an LMS session. The cookie only carries a signed pointer to it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    /// Per-session CSRF key.
    pub sesskey: String,
    pub created_at: i64,
    pub last_access: i64,
    pub expires_at: i64,
}

impl Session {
    pub fn new(user_id: i64, ttl_secs: i64, now: i64) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            sesskey: OsRng
                .sample_iter(&Alphanumeric)
                .take(SESSKEY_LENGTH)
                .map(char::from)
                .collect(),
            created_at: now,
            last_access: now,
            expires_at: now + ttl_secs,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }
}
