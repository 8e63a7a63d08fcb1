pub mod artifact_repository;
pub mod connection_repository;
pub mod exam_link_repository;
pub mod login_token_repository;
pub mod memory;
pub mod quiz_module_repository;
pub mod session_repository;
pub mod user_repository;

pub use artifact_repository::{ArtifactRepository, MongoArtifactRepository};
pub use connection_repository::{ConnectionRepository, MongoConnectionRepository};
pub use exam_link_repository::{ExamLinkRepository, MongoExamLinkRepository};
pub use login_token_repository::{LoginTokenRepository, MongoLoginTokenRepository};
pub use quiz_module_repository::{MongoQuizModuleRepository, QuizModuleRepository};
pub use session_repository::{MongoSessionRepository, SessionRepository};
pub use user_repository::{MongoUserRepository, UserRepository};
