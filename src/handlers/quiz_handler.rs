use actix_web::{delete, get, http::header::LOCATION, post, web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{client_ip, is_https, is_kiosk_client, require_not_guest, require_staff, AuthenticatedUser},
    errors::AppError,
    models::dto::request::{ExamSettingsForm, SesskeyParams},
    services::access_service::ClientInfo,
};

fn client_info(state: &AppState, req: &HttpRequest) -> ClientInfo {
    ClientInfo {
        addr: client_ip(req, state.config.trust_forwarded_for),
        https: is_https(req, state.config.trust_forwarded_for),
        kiosk: is_kiosk_client(req),
    }
}

#[get("/quiz/{cmid}/access")]
pub async fn quiz_access(
    state: web::Data<AppState>,
    req: HttpRequest,
    cmid: web::Path<i64>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_not_guest(&auth.0.user)?;

    let view = state
        .access
        .view(&auth.0, cmid.into_inner(), client_info(&state, &req))
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Starts the short monitoring hand-off into the kiosk browser.
#[get("/quiz/{cmid}/autologin")]
pub async fn quiz_autologin(
    state: web::Data<AppState>,
    req: HttpRequest,
    cmid: web::Path<i64>,
    query: web::Query<SesskeyParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    auth.0.require_sesskey(&query.sesskey)?;
    require_not_guest(&auth.0.user)?;

    let location = state
        .access
        .autologin_url(&auth.0, cmid.into_inner(), client_info(&state, &req))
        .await?;
    Ok(HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish())
}

#[get("/quiz/{cmid}/remote-login")]
pub async fn quiz_remote_login(
    state: web::Data<AppState>,
    cmid: web::Path<i64>,
    query: web::Query<SesskeyParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    auth.0.require_sesskey(&query.sesskey)?;

    let link = state
        .access
        .remote_login_link(&auth.0, cmid.into_inner())
        .await?;
    Ok(HttpResponse::SeeOther()
        .insert_header((LOCATION, link))
        .finish())
}

#[post("/quiz/{cmid}/settings")]
pub async fn save_quiz_settings(
    state: web::Data<AppState>,
    cmid: web::Path<i64>,
    query: web::Query<SesskeyParams>,
    form: web::Form<ExamSettingsForm>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    auth.0.require_sesskey(&query.sesskey)?;
    require_staff(&auth.0.user)?;

    let module = state.exam_links.module(cmid.into_inner()).await?;
    let record = state
        .exam_links
        .save_settings(&module, form.into_inner(), &auth.0.user)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[delete("/quiz/{cmid}/settings")]
pub async fn delete_quiz_settings(
    state: web::Data<AppState>,
    cmid: web::Path<i64>,
    query: web::Query<SesskeyParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    auth.0.require_sesskey(&query.sesskey)?;
    require_staff(&auth.0.user)?;

    let module = state.exam_links.module(cmid.into_inner()).await?;
    state.exam_links.delete_settings(&module).await?;
    Ok(HttpResponse::NoContent().finish())
}
