use serde::{Deserialize, Serialize};

use crate::models::domain::{Session, User, UserRole};

/// Payload of the signed session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // user id
    pub sid: String, // server-side session id
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

impl SessionClaims {
    pub fn new(user: &User, session: &Session) -> Self {
        Self {
            sub: user.id.to_string(),
            sid: session.session_id.clone(),
            role: user.role,
            iat: session.created_at.max(0) as usize,
            exp: session.expires_at.max(0) as usize,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user = User::new(42, "jdoe", "John", "Doe", UserRole::Student);
        let session = Session::new(42, 3600, 1_000);
        let claims = SessionClaims::new(&user, &session);

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.sid, session.session_id);
        assert_eq!(claims.exp, 4_600);
        assert!(claims.exp > claims.iat);
    }
}
