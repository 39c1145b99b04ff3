use actix_web::{post, web, HttpResponse};
use fleet_core::{now_epoch_millis, CompanyId, DriverId, EpochMillis, PositionSample, VehicleId};
use serde::Deserialize;

use crate::routes::common::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PositionPayload {
    pub company_id: CompanyId,
    pub vehicle_id: VehicleId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to the time the request is received.
    #[serde(default)]
    pub timestamp_ms: Option<EpochMillis>,
}

#[post("/v1/positions")]
pub async fn ingest_position(
    state: web::Data<AppState>,
    payload: web::Json<PositionPayload>,
) -> HttpResponse {
    let payload = payload.into_inner();
    let sample = PositionSample {
        vehicle_id: payload.vehicle_id,
        driver_id: payload.driver_id,
        latitude: payload.latitude,
        longitude: payload.longitude,
        timestamp_ms: payload.timestamp_ms.unwrap_or_else(now_epoch_millis),
    };

    match state
        .geofencing
        .process_sample(payload.company_id, sample)
        .await
    {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(err) => error_response(err),
    }
}
