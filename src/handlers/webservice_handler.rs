use actix_web::{delete, get, post, web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use secrecy::ExposeSecret;
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::secrets_match,
    errors::{AppError, AppResult},
    models::dto::request::{
        ConnectionRequest, ExamListQuery, SetExamDataRequest, SetRestrictionRequest,
    },
};

/// Calls from the exam server carry the site's web-service token.
fn authorize(state: &AppState, auth: &BearerAuth) -> AppResult<()> {
    if !state.config.webservices_enabled {
        return Err(AppError::Authorization("Web services are disabled".to_string()));
    }
    if !secrets_match(auth.token(), state.config.webservice_token.expose_secret()) {
        return Err(AppError::Authorization("Invalid web service token".to_string()));
    }
    Ok(())
}

#[post("/connection")]
pub async fn set_connection(
    state: web::Data<AppState>,
    auth: BearerAuth,
    request: web::Json<ConnectionRequest>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;
    request.validate()?;

    let result = state.connections.set_connection(&request.connection).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[delete("/connection/{id}")]
pub async fn delete_connection(
    state: web::Data<AppState>,
    auth: BearerAuth,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;

    let result = state.connections.delete_connection(&id).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[post("/exam-data")]
pub async fn set_exam_data(
    state: web::Data<AppState>,
    auth: BearerAuth,
    request: web::Json<SetExamDataRequest>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;

    let result = state.exam_links.set_exam_data(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[post("/restriction")]
pub async fn set_restriction(
    state: web::Data<AppState>,
    auth: BearerAuth,
    request: web::Json<SetRestrictionRequest>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;

    let result = state.exam_links.set_restriction(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/restriction/{quiz_id}")]
pub async fn get_restriction(
    state: web::Data<AppState>,
    auth: BearerAuth,
    quiz_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;

    let result = state.exam_links.get_restriction(quiz_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Courses and their quizzes, for picking exams on the exam server.
#[get("/exams")]
pub async fn get_exams(
    state: web::Data<AppState>,
    auth: BearerAuth,
    query: web::Query<ExamListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &auth)?;
    query.validate()?;

    let result = state.catalog.list(&query).await?;
    Ok(HttpResponse::Ok().json(result))
}
