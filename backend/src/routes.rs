use std::path::PathBuf;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{ErrorResponse, HealthResponse, PredictionResponse};
use uuid::Uuid;

use crate::inference::{InferenceService, PipelineError};
use crate::storage::UploadStore;

const IMAGE_FIELD: &str = "image";

/// Settings for the non-API routes.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub analysed_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub persist_uploads: bool,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, routes: RouteConfig) {
    cfg.app_data(web::Data::new(routes.clone()))
        .service(web::resource("/predict").route(web::post().to(handle_predict)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(Files::new("/analysed", routes.analysed_dir.clone()));

    if let Some(static_dir) = routes.static_dir {
        cfg.service(Files::new("/", static_dir).index_file("index.html"));
    }
}

fn error_json(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: message.into(),
    })
}

pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Decode(_) | PipelineError::ShapeMismatch { .. } => StatusCode::BAD_REQUEST,
        PipelineError::UnsupportedMode(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

struct Upload {
    file_name: Option<String>,
    data: Vec<u8>,
}

enum UploadOutcome {
    Received(Upload),
    Missing,
    TooLarge,
}

async fn read_image_field(
    payload: &mut Multipart,
    limit: usize,
) -> Result<UploadOutcome, Error> {
    // Bytes read from fields other than the image count against the same limit.
    let mut skipped = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(IMAGE_FIELD) {
            while let Some(chunk) = field.next().await {
                skipped += chunk?.len();
                if skipped > limit {
                    return Ok(UploadOutcome::TooLarge);
                }
            }
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if skipped + data.len() + chunk.len() > limit {
                return Ok(UploadOutcome::TooLarge);
            }
            data.extend_from_slice(&chunk);
        }
        return Ok(UploadOutcome::Received(Upload { file_name, data }));
    }
    Ok(UploadOutcome::Missing)
}

async fn handle_predict(
    service: web::Data<InferenceService>,
    store: web::Data<UploadStore>,
    routes: web::Data<RouteConfig>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let request_id = Uuid::new_v4();

    let upload = match read_image_field(&mut payload, routes.max_upload_bytes).await? {
        UploadOutcome::Received(upload) if !upload.data.is_empty() => upload,
        UploadOutcome::Received(_) | UploadOutcome::Missing => {
            warn!("[{}] Request without image file", request_id);
            return Ok(error_json(
                StatusCode::BAD_REQUEST,
                "No image file in request",
            ));
        }
        UploadOutcome::TooLarge => {
            warn!(
                "[{}] Upload exceeds {} bytes",
                request_id, routes.max_upload_bytes
            );
            return Ok(error_json(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Image exceeds {} bytes", routes.max_upload_bytes),
            ));
        }
    };

    info!(
        "[{}] Received {} ({} bytes)",
        request_id,
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.data.len()
    );

    let data = web::Bytes::from(upload.data);

    if routes.persist_uploads {
        let store = store.clone();
        let bytes = data.clone();
        let file_name = upload.file_name.clone();
        match web::block(move || store.save(&bytes, file_name.as_deref())).await {
            Ok(Ok(path)) => info!("[{}] Stored upload at {}", request_id, path.display()),
            Ok(Err(e)) => error!("[{}] Failed to store upload: {}", request_id, e),
            Err(e) => error!("[{}] Upload storage task failed: {}", request_id, e),
        }
    }

    let service = service.clone();
    let result = web::block(move || service.predict(&data)).await?;

    match result {
        Ok(prediction) => {
            info!(
                "[{}] Predicted {} ({:.4})",
                request_id, prediction.label, prediction.confidence
            );
            Ok(HttpResponse::Ok().json(PredictionResponse::from(prediction)))
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("[{}] {}", request_id, e);
            } else {
                warn!("[{}] {}", request_id, e);
            }
            Ok(error_json(status, e.to_string()))
        }
    }
}

async fn health(service: web::Data<InferenceService>) -> HttpResponse {
    let ready = service.is_ready();
    let body = HealthResponse {
        status: if ready { "ok" } else { "unavailable" }.to_string(),
        model_loaded: ready,
        labels: service.labels(),
    };
    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
