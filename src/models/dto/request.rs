use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static ALPHANUM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]+$").expect("ALPHANUM_REGEX is a valid regex pattern")
});

fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if ALPHANUM_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanumeric"))
    }
}

/// Query of the kiosk's first request after launch.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RedeemTokenParams {
    #[validate(range(min = 1))]
    pub resource_id: i64,

    #[validate(range(min = 1))]
    pub user_id: i64,

    #[validate(
        length(min = 1, max = 128),
        custom(function = "validate_alphanumeric", message = "Token must be alphanumeric")
    )]
    pub token: String,

    #[serde(default)]
    #[validate(length(max = 2048))]
    pub destination_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct MediateParams {
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub destination_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SesskeyParams {
    #[validate(length(min = 1, max = 64))]
    pub sesskey: String,
}

fn default_true() -> bool {
    true
}

fn default_per_page() -> u32 {
    99_999
}

/// Filters of the exam listing. Time bounds always apply to quizzes, and to
/// courses as well when `filter_courses` is set.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExamListQuery {
    /// Comma separated. Empty or `0` lists every course.
    #[serde(default)]
    #[validate(length(max = 4096))]
    pub course_ids: Option<String>,

    /// Start (quiz open) at or after this time.
    #[serde(default)]
    pub start_from: Option<i64>,

    /// End (quiz close) at or after this time, or no end at all.
    #[serde(default)]
    pub end_from: Option<i64>,

    #[serde(default)]
    pub created_from: Option<i64>,

    #[serde(default)]
    pub filter_courses: bool,

    #[serde(default = "default_true")]
    pub show_empty_courses: bool,

    #[serde(default)]
    pub start_needle: u32,

    #[serde(default = "default_per_page")]
    #[validate(range(min = 1))]
    pub per_page: u32,
}

impl Default for ExamListQuery {
    fn default() -> Self {
        Self {
            course_ids: None,
            start_from: None,
            end_from: None,
            created_from: None,
            filter_courses: false,
            show_empty_courses: true,
            start_needle: 0,
            per_page: default_per_page(),
        }
    }
}

impl ExamListQuery {
    /// `None` means every course.
    pub fn course_filter(&self) -> Result<Option<Vec<i64>>, ValidationError> {
        let raw = match self.course_ids.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };
        let ids = raw
            .split(',')
            .map(|id| id.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ValidationError::new("course_ids"))?;
        if ids == [0] {
            return Ok(None);
        }
        Ok(Some(ids))
    }

    /// Checks a start/end/created triple against the time bounds.
    pub fn matches(&self, start: i64, end: i64, created: i64) -> bool {
        self.start_from.map_or(true, |from| start >= from)
            && self.end_from.map_or(true, |from| end == 0 || end >= from)
            && self.created_from.map_or(true, |from| created >= from)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ArtifactParams {
    #[serde(default)]
    #[validate(custom(function = "validate_alphanumeric", message = "Token must be alphanumeric"))]
    pub token: Option<String>,

    #[serde(default)]
    pub forcedownload: Option<u8>,
}

impl ArtifactParams {
    pub fn force_download(&self) -> bool {
        self.forcedownload.unwrap_or(0) == 1
    }
}

/// Quiz settings block for the exam server integration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ExamSettingsForm {
    pub enabled: bool,

    /// `-1` means "no template selected yet".
    #[validate(range(min = -1))]
    pub template_id: i64,

    #[serde(default = "default_true")]
    pub show_quit_button: bool,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub quit_secret: String,

    /// Site-admin reset: drops the record so the next access registers afresh.
    #[serde(default)]
    pub admin_reset: bool,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamDataAction {
    Add,
    Delete,
}

/// Pushed by the exam server when it binds or unbinds an exam.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SetExamDataRequest {
    #[validate(range(min = 1))]
    pub quiz_id: i64,

    pub action: ExamDataAction,

    #[serde(default)]
    pub template_id: Option<i64>,

    #[serde(default)]
    pub show_quit_link: Option<bool>,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub quit_secret: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2048))]
    pub quit_link: Option<String>,

    #[serde(default)]
    pub next_quiz_id: Option<i64>,

    #[serde(default)]
    pub next_course_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SetRestrictionRequest {
    #[validate(range(min = 1))]
    pub quiz_id: i64,

    #[serde(default)]
    pub browser_keys: Vec<String>,

    #[serde(default)]
    pub config_keys: Vec<String>,
}

/// The connection arrives as a raw JSON document so that it can be stored verbatim.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ConnectionRequest {
    #[validate(length(min = 1, message = "Connection data missing"))]
    pub connection: String,
}
