use actix_cors::Cors;
use actix_web::{get, http::header::CONTENT_DISPOSITION, web, HttpResponse};
use secrecy::ExposeSecret;
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{require_not_guest, secrets_match, MaybeSession},
    errors::{AppError, AppResult},
    models::{domain::config_artifact::ARTIFACT_FILENAME, dto::request::ArtifactParams},
};

/// The configuration file is fetched cross-origin by the kiosk browser.
pub fn artifact_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET"])
        .max_age(3600)
}

fn authorize(state: &AppState, params: &ArtifactParams, session: &MaybeSession) -> AppResult<()> {
    if let Some(token) = params.token.as_deref() {
        if !state.config.webservices_enabled {
            return Err(AppError::Authorization(
                "Web service file downloading is disabled".to_string(),
            ));
        }
        if !secrets_match(token, state.config.webservice_token.expose_secret()) {
            return Err(AppError::Authorization("Invalid access token".to_string()));
        }
        return Ok(());
    }

    match &session.0 {
        Some(ctx) => require_not_guest(&ctx.user),
        None => Err(AppError::Authorization("You must be signed in".to_string())),
    }
}

#[get("/{cmid}/SEBServerSettings.seb")]
pub async fn serve_artifact(
    state: web::Data<AppState>,
    cmid: web::Path<i64>,
    query: web::Query<ArtifactParams>,
    session: MaybeSession,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    params.validate()?;
    authorize(&state, &params, &session)?;

    let cmid = cmid.into_inner();
    let artifact = state.exam_links.artifact(cmid).await?.ok_or_else(|| {
        AppError::ArtifactNotFound(format!("no configuration file for module {}", cmid))
    })?;

    let disposition = if params.force_download() {
        format!("attachment; filename=\"{}\"", ARTIFACT_FILENAME)
    } else {
        artifact
            .content_disposition
            .clone()
            .unwrap_or_else(|| format!("inline; filename=\"{}\"", ARTIFACT_FILENAME))
    };

    Ok(HttpResponse::Ok()
        .content_type(artifact.content_type.as_str())
        .insert_header((CONTENT_DISPOSITION, disposition))
        .body(artifact.content))
}
