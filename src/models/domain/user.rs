use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Guest,
    Student,
    Teacher,
    Manager,
    Admin,
}

/// Read-mostly mirror of an LMS account.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub idnumber: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub role: UserRole,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub deleted: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl User {
    pub fn new(id: i64, username: &str, first_name: &str, last_name: &str, role: UserRole) -> Self {
        User {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            idnumber: String::new(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            timezone: default_timezone(),
            role,
            suspended: false,
            deleted: false,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_guest(&self) -> bool {
        self.role == UserRole::Guest
    }

    pub fn is_active(&self) -> bool {
        !self.suspended && !self.deleted
    }

    /// Teachers and managers may jump straight into the exam server console.
    pub fn can_use_remote_login(&self) -> bool {
        matches!(self.role, UserRole::Teacher | UserRole::Manager | UserRole::Admin)
    }

    /// Staff may see the exam even while the exam server has not restricted it yet.
    pub fn can_bypass_restriction(&self) -> bool {
        matches!(self.role, UserRole::Teacher | UserRole::Manager | UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let user = User::new(42, "jdoe", "John", "Doe", UserRole::Student);
        assert_eq!(user.full_name(), "John Doe");
        assert_eq!(user.email, "jdoe@example.com");
        assert!(user.is_active());
        assert!(!user.is_admin());
        assert!(!user.can_use_remote_login());
    }

    #[test]
    fn test_inactive_user() {
        let mut user = User::new(1, "gone", "Gone", "User", UserRole::Student);
        user.deleted = true;
        assert!(!user.is_active());
    }

    #[test]
    fn test_role_deserialization() {
        let role: UserRole = serde_json::from_str("\"manager\"").unwrap();
        assert_eq!(role, UserRole::Manager);
    }
}
