use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;

use crate::{
    app_state::AppState,
    errors::AppError,
    services::session_service::{SessionContext, SESSION_COOKIE},
};

/// Resolves the session cookie, when present, into a [`SessionContext`] request extension.
///
/// Requests without a usable session pass through untouched; handlers decide whether
/// they need one through the [`AuthenticatedUser`] or [`MaybeSession`] extractors.
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
            let state = req.app_data::<web::Data<AppState>>().cloned();

            if let (Some(token), Some(state)) = (token, state) {
                if let Some(ctx) = state.session_service.resolve(&token).await? {
                    req.extensions_mut().insert(ctx);
                }
            }

            service.call(req).await
        })
    }
}

/// Extractor for handlers that need a signed-in user.
pub struct AuthenticatedUser(pub SessionContext);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let ctx = req
            .extensions()
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| AppError::Authorization("You must be signed in".to_string()));

        ready(ctx.map(AuthenticatedUser))
    }
}

/// Extractor for handlers that behave differently with and without a session.
pub struct MaybeSession(pub Option<SessionContext>);

impl FromRequest for MaybeSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(MaybeSession(
            req.extensions().get::<SessionContext>().cloned(),
        )))
    }
}
