use actix_web::{get, web, HttpResponse};

use crate::{app_state::AppState, models::dto::response::HealthResponse};

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let storage_ok = state.storage_healthy().await;
    let exam_server_connected = matches!(state.connections.profile().await, Ok(Some(_)));

    let body = HealthResponse {
        status: if storage_ok { "healthy" } else { "degraded" },
        storage: state.storage,
        exam_server_connected,
    };

    if storage_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
