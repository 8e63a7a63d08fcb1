use std::{net::SocketAddr, sync::Arc};

use actix_web::{
    cookie::Cookie,
    http::{header, StatusCode},
    test, web, App,
};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use sebgate_server::{
    app_state::{AppState, Repositories},
    auth::SessionMiddleware,
    config::{Config, StorageBackend},
    errors::{AppError, AppResult},
    handlers,
    middleware::{RequestIdMiddleware, REQUEST_ID_HEADER},
    models::domain::{
        ConfigArtifact, Course, ExamLinkRecord, QuizModule, RemoteConnectionProfile, User,
        UserRole,
    },
    repositories::{
        memory::{
            InMemoryArtifactRepository, InMemoryConnectionRepository, InMemoryExamLinkRepository,
            InMemoryLoginTokenRepository, InMemoryQuizModuleRepository, InMemorySessionRepository,
            InMemoryUserRepository,
        },
        ArtifactRepository, ExamLinkRepository, QuizModuleRepository, UserRepository,
    },
    services::{gateway_client::ExamGateway, session_service::SESSION_COOKIE},
};

const WS_TOKEN: &str = "wstoken123";

/// Deployed behind a TLS-terminating proxy that sets `X-Forwarded-Proto`.
fn config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        mongo_conn_string: "mongodb://localhost:27017".to_string(),
        mongo_db_name: "sebgate-test".to_string(),
        web_server_host: "127.0.0.1".to_string(),
        web_server_port: 8080,
        site_root: "https://lms.example.org".to_string(),
        session_secret: SecretString::from("integration_session_secret_0123456789".to_string()),
        session_ttl_minutes: 60,
        max_concurrent_sessions: 0,
        webservices_enabled: true,
        webservice_token: SecretString::from(WS_TOKEN.to_string()),
        launch_token_ttl_secs: 900,
        monitor_token_ttl_secs: 60,
        redirect_delay_secs: 5,
        trust_forwarded_for: true,
        exam_server_timeout_secs: 30,
        exam_server_config_timeout_secs: 60,
        exam_server_accept_invalid_certs: false,
    }
}

fn quiz_module() -> QuizModule {
    QuizModule {
        cmid: 7,
        quiz_id: 3,
        name: "Final exam".to_string(),
        intro: String::new(),
        time_open: 0,
        time_close: 0,
        time_created: 0,
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

/// A registered, restricted quiz with its configuration file already downloaded.
async fn seeded_state() -> AppState {
    seeded_state_with(config()).await
}

async fn seeded_state_with(config: Config) -> AppState {
    let users = Arc::new(InMemoryUserRepository::new());
    let links = Arc::new(InMemoryExamLinkRepository::new());
    let modules = Arc::new(InMemoryQuizModuleRepository::new());
    let artifacts = Arc::new(InMemoryArtifactRepository::new());

    users
        .upsert(User::new(42, "student", "Stu", "Dent", UserRole::Student))
        .await
        .unwrap();
    users
        .upsert(User::new(43, "other", "Oth", "Er", UserRole::Student))
        .await
        .unwrap();
    modules.upsert(quiz_module()).await.unwrap();

    let mut record = ExamLinkRecord::new_enabled(3, 12, true, "");
    record.called = true;
    record.restricted = true;
    links.upsert(record).await.unwrap();
    artifacts
        .put(ConfigArtifact::new(7, b"<plist/>".to_vec(), None, 0))
        .await
        .unwrap();

    let repositories = Repositories {
        users,
        sessions: Arc::new(InMemorySessionRepository::new()),
        login_tokens: Arc::new(InMemoryLoginTokenRepository::new()),
        exam_links: links,
        connections: Arc::new(InMemoryConnectionRepository::with_profile(
            RemoteConnectionProfile::new("https://exams.example.org", "tok", "1"),
        )),
        modules,
        artifacts,
    };

    let offline = |_: RemoteConnectionProfile| -> AppResult<Arc<dyn ExamGateway>> {
        Err(AppError::remote(503, "exam server not reachable in tests"))
    };
    AppState::from_parts(config, repositories, Arc::new(offline), None).unwrap()
}

fn peer() -> SocketAddr {
    "10.0.0.5:40000".parse().unwrap()
}

async fn sign_in(state: &AppState, user_id: i64) -> (Cookie<'static>, String) {
    let user = User::new(user_id, "student", "Stu", "Dent", UserRole::Student);
    let issued = state.session_service.login(&user).await.unwrap();
    (
        state.session_service.cookie(&issued),
        issued.session.sesskey.clone(),
    )
}

/// Turns a `seb(s)://` launch link into the path the kiosk would request.
fn redeem_path(launch: &str) -> String {
    let url = Url::parse(launch).unwrap();
    format!("{}?{}", url.path(), url.query().unwrap())
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .wrap(SessionMiddleware)
                .wrap(RequestIdMiddleware)
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_launch_redeem_mediate_download() {
    let state = seeded_state().await;
    let app = app!(state);
    let (cookie, _) = sign_in(&state, 42).await;

    let req = test::TestRequest::get()
        .uri("/quiz/7/access")
        .cookie(cookie)
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    let launch = view["launch_url"].as_str().unwrap().to_string();
    assert!(launch.starts_with("sebs://lms.example.org/login/redeem?"));
    assert_eq!(
        view["download_url"],
        "https://lms.example.org/artifacts/7/SEBServerSettings.seb?forcedownload=1"
    );

    // The kiosk browser arrives without any session.
    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        res.headers().get(header::LOCATION).unwrap(),
        "https://lms.example.org/login/mediate?destination_url=https%3A%2F%2Flms.example.org%2Fartifacts%2F7%2FSEBServerSettings.seb"
    );
    let kiosk_cookie = res
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .expect("session cookie")
        .into_owned();

    // Same token again, still without a session.
    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "TOKEN_ERROR");
    assert_eq!(body["reason"], "token_not_found");

    let req = test::TestRequest::get()
        .uri("/login/mediate?destination_url=https%3A%2F%2Fevil.example.com%2F")
        .cookie(kiosk_cookie.clone())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let page = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(page.contains("url=https://lms.example.org\""));
    assert!(!page.contains("evil"));

    let req = test::TestRequest::get()
        .uri("/artifacts/7/SEBServerSettings.seb?forcedownload=1")
        .cookie(kiosk_cookie)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"SEBServerSettings.seb\""
    );
    assert_eq!(test::read_body(res).await, "<plist/>");
}

#[actix_rt::test]
async fn test_redeem_from_other_address_fails_and_burns_token() {
    let state = seeded_state().await;
    let app = app!(state);
    let (cookie, sesskey) = sign_in(&state, 42).await;

    let req = test::TestRequest::get()
        .uri(&format!("/quiz/7/autologin?sesskey={}", sesskey))
        .cookie(cookie)
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let launch = res
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(launch.starts_with("sebs://"));

    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .peer_addr("192.168.1.9:40000".parse().unwrap())
        .insert_header(("X-Forwarded-Proto", "https"))
        .insert_header((REQUEST_ID_HEADER, "kiosk-17"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.headers().get(REQUEST_ID_HEADER).unwrap(), "kiosk-17");
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["reason"], "ip_mismatch");

    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["reason"], "token_not_found");
}

#[actix_rt::test]
async fn test_forged_forwarded_proto_from_untrusted_peer_requires_https() {
    let state = seeded_state_with(Config {
        trust_forwarded_for: false,
        ..config()
    })
    .await;
    let app = app!(state);
    let (cookie, sesskey) = sign_in(&state, 42).await;

    let req = test::TestRequest::get()
        .uri(&format!("/quiz/7/autologin?sesskey={}", sesskey))
        .cookie(cookie)
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let launch = res
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    // The header was ignored, so the link uses the plain kiosk scheme.
    assert!(launch.starts_with("seb://"));

    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .insert_header(("Forwarded", "proto=https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res
        .response()
        .cookies()
        .all(|c| c.name() != SESSION_COOKIE));
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "AUTHORIZATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("[https_required]"));
}

#[actix_rt::test]
async fn test_autologin_requires_sesskey() {
    let state = seeded_state().await;
    let app = app!(state);
    let (cookie, _) = sign_in(&state, 42).await;

    let req = test::TestRequest::get()
        .uri("/quiz/7/autologin?sesskey=wrong")
        .cookie(cookie)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_redeem_with_foreign_session_is_rejected() {
    let state = seeded_state().await;
    let app = app!(state);
    let (student, sesskey) = sign_in(&state, 42).await;
    let (other, _) = sign_in(&state, 43).await;

    let req = test::TestRequest::get()
        .uri(&format!("/quiz/7/autologin?sesskey={}", sesskey))
        .cookie(student)
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    let launch = res
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let req = test::TestRequest::get()
        .uri(&redeem_path(&launch))
        .cookie(other)
        .peer_addr(peer())
        .insert_header(("X-Forwarded-Proto", "https"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "AUTHORIZATION_ERROR");
}

#[actix_rt::test]
async fn test_artifact_requires_session_or_token() {
    let state = seeded_state().await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/artifacts/7/SEBServerSettings.seb")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri(&format!("/artifacts/7/SEBServerSettings.seb?token={}", WS_TOKEN))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/seb"
    );

    let req = test::TestRequest::get()
        .uri("/artifacts/8/SEBServerSettings.seb")
        .cookie(sign_in(&state, 42).await.0)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_rt::test]
async fn test_webservice_connection_and_restriction() {
    let state = seeded_state().await;
    let app = app!(state);
    let bearer = ("Authorization", format!("Bearer {}", WS_TOKEN));

    let req = test::TestRequest::post()
        .uri("/webservice/connection")
        .insert_header(("Authorization", "Bearer nope"))
        .set_json(serde_json::json!({ "connection": "{}" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let connection = r#"{"id":"2","url":"https://other.example.org","access_token":"t"}"#;
    let req = test::TestRequest::post()
        .uri("/webservice/connection")
        .insert_header(bearer.clone())
        .set_json(serde_json::json!({ "connection": connection }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["warnings"][0]["warning_code"], "connectiondoesntmatch");

    let req = test::TestRequest::post()
        .uri("/webservice/restriction")
        .insert_header(bearer.clone())
        .set_json(serde_json::json!({ "quiz_id": 3, "browser_keys": ["KEY1;key2"] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["quiz_id"], 3);

    let req = test::TestRequest::get()
        .uri("/webservice/restriction/3")
        .insert_header(bearer)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["browser_keys"], serde_json::json!(["key1", "key2"]));
}

#[actix_rt::test]
async fn test_webservice_exam_listing() {
    let state = seeded_state().await;
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/webservice/exams")
        .insert_header(("Authorization", "Bearer nope"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri("/webservice/exams?course_ids=2&show_empty_courses=false")
        .insert_header(("Authorization", format!("Bearer {}", WS_TOKEN)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["stats"]["coursecount"], 1);
    assert_eq!(body["results"][0]["shortname"], "PHY1");
    assert_eq!(body["results"][0]["quizzes"][0]["coursemodule"], "7");
    assert_eq!(body["results"][0]["quizzes"][0]["id"], "3");

    let req = test::TestRequest::get()
        .uri("/webservice/exams?course_ids=5")
        .insert_header(("Authorization", format!("Bearer {}", WS_TOKEN)))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_rt::test]
async fn test_health() {
    let state = seeded_state().await;
    let app = app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["exam_server_connected"], true);
}
