use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use ricegrain_backend::config::AppConfig;
use ricegrain_backend::inference::{
    Classifier, InferenceService, LabelSet, Preprocessor, load_model,
};
use ricegrain_backend::inference::model::backend_hint;
use ricegrain_backend::routes::{RouteConfig, configure_routes};
use ricegrain_backend::storage::UploadStore;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    if let Some(hint) = backend_hint() {
        log::warn!("{}", hint);
    }

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;
    let input_size = config
        .input_size()
        .map_err(|e| startup_error("Invalid configuration", e))?;
    let labels =
        LabelSet::new(config.labels.clone()).map_err(|e| startup_error("Invalid labels", e))?;

    // The server refuses to start without a usable model.
    let model = load_model(&config.model).map_err(|e| startup_error("Model loading failed", e))?;
    let classifier = Classifier::new(model, labels, input_size)
        .map_err(|e| startup_error("Model does not match label set", e))?;

    let preprocessor = Preprocessor::new(input_size, config.image.resize_filter);
    let service = InferenceService::new(preprocessor, Arc::new(classifier));

    let store = UploadStore::new(
        config.server.upload_dir.clone(),
        config.server.max_upload_bytes,
    );
    store
        .ensure_dir()
        .map_err(|e| startup_error("Cannot create upload directory", e))?;
    std::fs::create_dir_all(&config.server.analysed_dir)?;

    let route_config = RouteConfig {
        analysed_dir: config.server.analysed_dir.clone(),
        static_dir: config.server.static_dir.clone(),
        max_upload_bytes: config.server.max_upload_bytes,
        persist_uploads: config.server.persist_uploads,
    };

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let service = web::Data::new(service);
    let store = web::Data::new(store);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(service.clone())
            .app_data(store.clone())
            .configure(|cfg| configure_routes(cfg, route_config.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
