use actix_web::{get, web, HttpResponse};
use fleet_core::now_epoch_millis;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct StatusResponse {
    service: String,
    environment: String,
    region: Option<String>,
    storage_backend: fleet_config::StorageBackend,
    alerts_enabled: bool,
    timestamp_ms: u64,
}

#[get("/v1/status")]
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    let response = StatusResponse {
        service: state.config.service_name.clone(),
        environment: state.config.environment.to_string(),
        region: state.config.region.clone(),
        storage_backend: state.config.storage_backend,
        alerts_enabled: state.config.alerts_enabled,
        timestamp_ms: now_epoch_millis(),
    };

    HttpResponse::Ok().json(response)
}
