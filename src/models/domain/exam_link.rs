use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Local mirror of the exam server's view of a quiz.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExamLinkRecord {
    pub quiz_id: i64,
    pub enabled: bool,
    /// Browser-key enforcement is active upstream.
    pub restricted: bool,
    pub template_id: i64,
    pub show_quit_button: bool,
    #[serde(default)]
    pub quit_secret: String,
    #[serde(default)]
    pub quit_link: String,
    /// Set once the first registration call has been attempted.
    pub called: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_quiz_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_course_id: Option<i64>,
    #[serde(default)]
    pub browser_keys: Vec<String>,
    /// Unix seconds.
    pub time_modified: i64,
}

impl ExamLinkRecord {
    pub fn new_enabled(quiz_id: i64, template_id: i64, show_quit_button: bool, quit_secret: &str) -> Self {
        Self {
            quiz_id,
            enabled: true,
            restricted: false,
            template_id,
            show_quit_button,
            quit_secret: quit_secret.to_string(),
            quit_link: String::new(),
            called: false,
            next_quiz_id: None,
            next_course_id: None,
            browser_keys: Vec::new(),
            time_modified: Utc::now().timestamp(),
        }
    }

    pub fn has_next_quiz(&self) -> bool {
        matches!((self.next_quiz_id, self.next_course_id), (Some(q), Some(c)) if q > 0 && c > 0)
    }

    pub fn touch(&mut self) {
        self.time_modified = Utc::now().timestamp();
    }
}
