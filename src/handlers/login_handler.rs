use actix_web::{get, http::header::LOCATION, post, web, HttpRequest, HttpResponse};
use url::Url;
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{client_ip, is_https, require_not_guest, AuthenticatedUser, MaybeSession},
    errors::{AppError, AppResult},
    middleware::get_request_id,
    models::dto::request::{MediateParams, RedeemTokenParams},
    services::token_service::{RedeemOutcome, RedeemRequest},
};

fn mediator_location(state: &AppState, destination: &str) -> AppResult<String> {
    let mut url = Url::parse(&format!("{}/login/mediate", state.mediator.site_root()))
        .map_err(|e| AppError::InternalError(format!("Invalid site root: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("destination_url", destination);
    Ok(url.to_string())
}

/// Entry point of the kiosk browser: trades a login token for a session.
#[get("/login/redeem")]
pub async fn redeem_token(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<RedeemTokenParams>,
    session: MaybeSession,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    params.validate()?;

    let request = RedeemRequest {
        resource_id: params.resource_id,
        user_id: params.user_id,
        token: &params.token,
        client_addr: client_ip(&req, state.config.trust_forwarded_for),
        https: is_https(&req, state.config.trust_forwarded_for),
        current: session.0.as_ref(),
    };
    let outcome = state.token_redeemer.redeem(request).await?;

    let destination = state
        .mediator
        .resolve_destination(params.destination_url.as_deref());
    let location = mediator_location(&state, &destination)?;

    match outcome {
        RedeemOutcome::Resumed => Ok(HttpResponse::SeeOther()
            .insert_header((LOCATION, location))
            .finish()),
        RedeemOutcome::LoggedIn(issued) => Ok(HttpResponse::SeeOther()
            .cookie(state.session_service.cookie(&issued))
            .insert_header((LOCATION, location))
            .finish()),
        RedeemOutcome::Rejected(reason) => {
            log::warn!(
                "Refused login token for user {} on resource {} from {:?} [request {}]: {}",
                params.user_id,
                params.resource_id,
                request.client_addr,
                get_request_id(&req).unwrap_or_default(),
                reason.code()
            );
            Err(reason.into())
        }
    }
}

fn mediate(state: &AppState, auth: &AuthenticatedUser, params: MediateParams) -> AppResult<HttpResponse> {
    require_not_guest(&auth.0.user)?;
    params.validate()?;

    let destination = state
        .mediator
        .resolve_destination(params.destination_url.as_deref());
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(state.mediator.page(&destination)))
}

#[get("/login/mediate")]
pub async fn mediate_get(
    state: web::Data<AppState>,
    query: web::Query<MediateParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    mediate(&state, &auth, query.into_inner())
}

#[post("/login/mediate")]
pub async fn mediate_post(
    state: web::Data<AppState>,
    form: web::Form<MediateParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    mediate(&state, &auth, form.into_inner())
}
