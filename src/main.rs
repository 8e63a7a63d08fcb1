use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

use sebgate_server::{
    app_state::AppState,
    auth::SessionMiddleware,
    config::{Config, StorageBackend},
    handlers,
    middleware::RequestIdMiddleware,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    if config.storage_backend == StorageBackend::Mongo {
        config.validate_for_production();
    }

    let host = config.web_server_host.clone();
    let port = config.web_server_port;

    let state = AppState::new(config)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    info!("starting HTTP server on {}:{} ({} storage)", host, port, state.storage);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(SessionMiddleware)
            .wrap(Logger::new(r#"%a "%r" %s %b %T req=%{x-request-id}o"#))
            .wrap(RequestIdMiddleware)
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
