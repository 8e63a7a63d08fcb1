use serde::{Deserialize, Serialize};

/// Non-fatal note attached to a web-service or access result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Warning {
    pub item: String,
    pub item_id: i64,
    pub warning_code: String,
    pub message: String,
}

impl Warning {
    pub fn new(item: &str, item_id: i64, warning_code: &str, message: impl Into<String>) -> Self {
        Self {
            item: item.to_string(),
            item_id,
            warning_code: warning_code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebserviceResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<i64>,
    pub warnings: Vec<Warning>,
}

impl WebserviceResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(warning: Warning) -> Self {
        Self {
            success: false,
            context: None,
            warnings: vec![warning],
        }
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.warning_code == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RestrictionData {
    pub quiz_id: i64,
    pub browser_keys: Vec<String>,
    pub config_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RestrictionResult {
    pub data: Vec<RestrictionData>,
    pub warnings: Vec<Warning>,
}

/// What the quiz page offers a signed-in user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessView {
    pub cmid: i64,
    pub quiz_id: i64,
    pub restricted: bool,
    /// False when the request already comes from the kiosk or the quiz is hidden.
    pub show_actions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_login_url: Option<String>,
    /// Where the kiosk goes once the user has finished: the next quiz's
    /// configuration or the configured quit link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quit_url: Option<String>,
    /// Consecutive quiz, shown to staff only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_quiz: Option<NextQuiz>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NextQuiz {
    pub cmid: i64,
    pub quiz_id: i64,
    pub name: String,
    pub course_fullname: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub exam_server_connected: bool,
}
