use actix_web::{delete, get, post, web, HttpResponse};
use fleet_core::{now_epoch_millis, CompanyId, Geofence, GeofenceId};

use crate::routes::common::{error_response, not_found, parse_id, ListQuery};
use crate::state::AppState;

#[get("/v1/companies/{company_id}/geofences")]
pub async fn list_geofences(
    state: web::Data<AppState>,
    company_id: web::Path<String>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let company_id: CompanyId = match parse_id(&company_id) {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state
        .zones
        .list_by_company(company_id, query.limit(), query.offset())
        .await
    {
        Ok(zones) => HttpResponse::Ok().json(zones),
        Err(err) => error_response(err),
    }
}

#[get("/v1/geofences/{id}")]
pub async fn get_geofence(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let geofence_id: GeofenceId = match parse_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.zones.get(geofence_id).await {
        Ok(Some(zone)) => HttpResponse::Ok().json(zone),
        Ok(None) => not_found("geofence not found"),
        Err(err) => error_response(err),
    }
}

#[post("/v1/geofences")]
pub async fn upsert_geofence(
    state: web::Data<AppState>,
    payload: web::Json<Geofence>,
) -> HttpResponse {
    let mut zone = payload.into_inner();
    if let Err(err) = zone.validate() {
        return error_response(err);
    }
    let now = now_epoch_millis();
    if zone.created_at_ms == 0 {
        zone.created_at_ms = now;
    }
    zone.updated_at_ms = now;

    match state.zones.upsert(zone.clone()).await {
        Ok(()) => HttpResponse::Ok().json(zone),
        Err(err) => error_response(err),
    }
}

#[delete("/v1/geofences/{id}")]
pub async fn delete_geofence(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let geofence_id: GeofenceId = match parse_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.zones.delete(geofence_id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_response(err),
    }
}
