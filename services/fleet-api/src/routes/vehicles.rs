use actix_web::{post, web, HttpResponse};
use fleet_core::Vehicle;

use crate::routes::common::{bad_request, error_response};
use crate::state::AppState;

#[post("/v1/vehicles")]
pub async fn register_vehicle(
    state: web::Data<AppState>,
    payload: web::Json<Vehicle>,
) -> HttpResponse {
    let vehicle = payload.into_inner();
    if vehicle.name.trim().is_empty() {
        return bad_request("vehicle name is required");
    }

    match state.vehicles.register_vehicle(vehicle.clone()).await {
        Ok(()) => HttpResponse::Ok().json(vehicle),
        Err(err) => error_response(err),
    }
}
