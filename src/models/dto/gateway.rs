//! Wire shapes exchanged with the exam server.

use serde::{Deserialize, Serialize};

use crate::models::domain::{Course, QuizModule};

/// Error body returned by the exam server on non-200 responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayErrorBody {
    #[serde(rename = "systemMessage", default)]
    pub system_message: String,
    #[serde(default)]
    pub details: String,
}

/// The exam server reports errors either as a single object or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GatewayErrorPayload {
    Many(Vec<GatewayErrorBody>),
    One(GatewayErrorBody),
}

impl GatewayErrorPayload {
    pub fn first(&self) -> Option<&GatewayErrorBody> {
        match self {
            GatewayErrorPayload::Many(items) => items.first(),
            GatewayErrorPayload::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginTokenResponse {
    #[serde(default)]
    pub login_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamDataStats {
    pub coursecount: u32,
    pub needle: u32,
    pub perpage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamDataQuiz {
    pub id: String,
    pub course: String,
    pub coursemodule: String,
    pub name: String,
    pub intro: String,
    pub timeopen: i64,
    pub timeclose: i64,
    pub timecreated: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamDataCourse {
    pub id: String,
    pub shortname: String,
    pub fullname: String,
    pub idnumber: String,
    pub summary: String,
    pub startdate: String,
    pub enddate: String,
    pub timecreated: String,
    pub visible: String,
    pub quizzes: Vec<ExamDataQuiz>,
}

/// Course/quiz snapshot sent as the `exam_data` field of `POST /exam`.
#[derive(Debug, Clone, Serialize)]
pub struct ExamData {
    pub stats: ExamDataStats,
    pub results: Vec<ExamDataCourse>,
    pub warnings: Vec<String>,
}

impl From<&QuizModule> for ExamDataQuiz {
    fn from(module: &QuizModule) -> Self {
        ExamDataQuiz {
            id: module.quiz_id.to_string(),
            course: module.course.id.to_string(),
            coursemodule: module.cmid.to_string(),
            name: module.name.clone(),
            intro: module.intro.clone(),
            timeopen: module.time_open,
            timeclose: module.time_close,
            timecreated: module.time_created,
        }
    }
}

impl ExamDataCourse {
    pub fn new(course: &Course, quizzes: Vec<ExamDataQuiz>) -> Self {
        ExamDataCourse {
            id: course.id.to_string(),
            shortname: course.shortname.clone(),
            fullname: course.fullname.clone(),
            idnumber: course.idnumber.clone(),
            summary: course.summary.clone(),
            startdate: course.start_date.to_string(),
            enddate: course.end_date.to_string(),
            timecreated: course.time_created.to_string(),
            visible: u8::from(course.visible).to_string(),
            quizzes,
        }
    }
}

impl From<&QuizModule> for ExamData {
    fn from(module: &QuizModule) -> Self {
        ExamData {
            stats: ExamDataStats {
                coursecount: 1,
                needle: 0,
                perpage: 10,
            },
            results: vec![ExamDataCourse::new(
                &module.course,
                vec![ExamDataQuiz::from(module)],
            )],
            warnings: Vec::new(),
        }
    }
}

/// Form fields of `POST /exam`.
#[derive(Debug, Clone, Serialize)]
pub struct ExamRegistration {
    pub id: String,
    pub course_id: i64,
    pub exam_template_id: i64,
    pub quit_password: String,
    pub quiz_id: i64,
    pub quit_link: u8,
    pub exam_data: String,
}

/// Form fields identifying an exam on `DELETE /exam` and `POST /seb_config`.
#[derive(Debug, Clone, Serialize)]
pub struct ExamReference {
    pub id: String,
    pub course_id: i64,
    pub quiz_id: i64,
}

/// Form fields of `POST /login_token`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginTokenRequest {
    pub id: String,
    pub course_id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub user_idnumber: String,
    pub user_username: String,
    pub user_email: String,
    pub user_fullname: String,
    pub user_firstname: String,
    pub user_lastname: String,
    pub account_time_zone: String,
    pub localised_time: String,
    pub timestamp: i64,
}
