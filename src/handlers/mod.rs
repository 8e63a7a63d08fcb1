pub mod artifact_handler;
pub mod health_handler;
pub mod login_handler;
pub mod quiz_handler;
pub mod webservice_handler;

use actix_web::web;

pub use health_handler::health_check;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(login_handler::redeem_token)
        .service(login_handler::mediate_get)
        .service(login_handler::mediate_post)
        .service(quiz_handler::quiz_access)
        .service(quiz_handler::quiz_autologin)
        .service(quiz_handler::quiz_remote_login)
        .service(quiz_handler::save_quiz_settings)
        .service(quiz_handler::delete_quiz_settings)
        .service(
            web::scope("/artifacts")
                .wrap(artifact_handler::artifact_cors())
                .service(artifact_handler::serve_artifact),
        )
        .service(
            web::scope("/webservice")
                .service(webservice_handler::set_connection)
                .service(webservice_handler::delete_connection)
                .service(webservice_handler::set_exam_data)
                .service(webservice_handler::set_restriction)
                .service(webservice_handler::get_restriction)
                .service(webservice_handler::get_exams),
        );
}
