use std::sync::Arc;

use sebgate_server::{
    errors::AppError,
    models::domain::{Course, ExamLinkRecord, QuizModule, RemoteConnectionProfile, User, UserRole},
    repositories::{
        memory::{
            InMemoryArtifactRepository, InMemoryConnectionRepository, InMemoryExamLinkRepository,
            InMemoryQuizModuleRepository,
        },
        ExamLinkRepository, QuizModuleRepository,
    },
    services::{
        exam_link_service::ExamLinkService,
        gateway_client::{ExamGateway, ExamServerClient, GatewaySettings, HttpGatewayFactory},
    },
};
use wiremock::{
    matchers::{body_string_contains, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn quiz_module() -> QuizModule {
    QuizModule {
        cmid: 7,
        quiz_id: 3,
        name: "Final exam".to_string(),
        intro: String::new(),
        time_open: 0,
        time_close: 0,
        time_created: 1_700_000_000,
        has_attempts: false,
        finished_attempt_users: Vec::new(),
        course: Course {
            id: 2,
            shortname: "PHY1".to_string(),
            fullname: "Physics 1".to_string(),
            idnumber: String::new(),
            summary: String::new(),
            start_date: 0,
            end_date: 0,
            time_created: 0,
            visible: true,
        },
    }
}

fn client(server: &MockServer) -> ExamServerClient {
    let profile = RemoteConnectionProfile::new(&server.uri(), " tok ", "1");
    ExamServerClient::new(profile, &GatewaySettings::default()).unwrap()
}

#[tokio::test]
async fn test_register_sends_bearer_and_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exam"))
        .and(header("authorization", "Bearer tok"))
        .and(body_string_contains("quiz_id=3"))
        .and(body_string_contains("exam_template_id=12"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let record = ExamLinkRecord::new_enabled(3, 12, true, "bye");
    client(&server)
        .register_or_update_exam(&quiz_module(), &record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_failure_carries_remote_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exam"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(r#"{"systemMessage":"x","details":"y"}"#),
        )
        .mount(&server)
        .await;

    let record = ExamLinkRecord::new_enabled(3, 12, true, "");
    let err = client(&server)
        .register_or_update_exam(&quiz_module(), &record)
        .await
        .unwrap_err();

    match err {
        AppError::RemoteGateway { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "ERROR 500: (x) y [/exam/post]");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_configuration_download() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/seb_config"))
        .and(query_param("quiz_id", "3"))
        .and(query_param("course_id", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"exam.seb\"")
                .set_body_bytes(b"<plist/>".to_vec()),
        )
        .mount(&server)
        .await;

    let response = client(&server)
        .fetch_client_configuration(&quiz_module())
        .await
        .unwrap();
    assert_eq!(response.body, b"<plist/>");
    assert_eq!(
        response.content_disposition.as_deref(),
        Some("attachment; filename=\"exam.seb\"")
    );
}

#[tokio::test]
async fn test_empty_configuration_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/seb_config"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = client(&server)
        .fetch_client_configuration(&quiz_module())
        .await;
    assert!(matches!(result, Err(AppError::ArtifactNotFound(_))));
}

#[tokio::test]
async fn test_login_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login_token"))
        .and(body_string_contains("user_username=teacher"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"login_link":"https://exams.example.org/login?t=abc"}"#),
        )
        .mount(&server)
        .await;

    let user = User::new(5, "teacher", "Tea", "Cher", UserRole::Teacher);
    let link = client(&server)
        .request_external_login_link(&quiz_module(), &user)
        .await
        .unwrap();
    assert_eq!(link, "https://exams.example.org/login?t=abc");
}

#[tokio::test]
async fn test_empty_login_link_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"login_link":""}"#))
        .mount(&server)
        .await;

    let user = User::new(5, "teacher", "Tea", "Cher", UserRole::Teacher);
    let err = client(&server)
        .request_external_login_link(&quiz_module(), &user)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Empty link"));
}

#[tokio::test]
async fn test_failed_first_access_rolls_back_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exam"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(r#"{"systemMessage":"x","details":"y"}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/seb_config"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cfg".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let links = Arc::new(InMemoryExamLinkRepository::new());
    let artifacts = Arc::new(InMemoryArtifactRepository::new());
    let modules = Arc::new(InMemoryQuizModuleRepository::new());
    let module = modules.upsert(quiz_module()).await.unwrap();
    let record = links
        .upsert(ExamLinkRecord::new_enabled(3, 12, true, ""))
        .await
        .unwrap();

    let service = ExamLinkService::new(
        links.clone(),
        artifacts.clone(),
        Arc::new(InMemoryConnectionRepository::with_profile(
            RemoteConnectionProfile::new(&server.uri(), "tok", "1"),
        )),
        modules,
        Arc::new(HttpGatewayFactory::new(GatewaySettings::default())),
    );

    let err = service.ensure_registered(&module, record).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("500"));
    assert!(text.contains("(x)"));
    assert!(text.contains(" y "));
    assert!(links.find_by_quiz(3).await.unwrap().is_none());
    assert_eq!(artifacts.count().await, 0);
}
