pub mod config_artifact;
pub mod connection;
pub mod exam_link;
pub mod login_token;
pub mod quiz_module;
pub mod session;
pub mod user;

pub use config_artifact::ConfigArtifact;
pub use connection::{ExamTemplate, RemoteConnectionProfile};
pub use exam_link::ExamLinkRecord;
pub use login_token::{LoginToken, RejectReason, LOGIN_TOKEN_NAMESPACE};
pub use quiz_module::{Course, QuizModule};
pub use session::Session;
pub use user::{User, UserRole};
