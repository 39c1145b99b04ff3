use actix_web::{get, web, HttpResponse};
use fleet_core::{now_epoch_millis, CompanyId, VehicleId, VisitRecord};
use serde::Serialize;

use crate::routes::common::{error_response, parse_id, ListQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct OpenVisit {
    #[serde(flatten)]
    visit: VisitRecord,
    minutes_inside: u64,
}

#[get("/v1/companies/{company_id}/visits/open")]
pub async fn list_open_visits(
    state: web::Data<AppState>,
    company_id: web::Path<String>,
) -> HttpResponse {
    let company_id: CompanyId = match parse_id(&company_id) {
        Ok(value) => value,
        Err(response) => return response,
    };

    let now = now_epoch_millis();
    match state.visits.list_open_visits(company_id).await {
        Ok(visits) => {
            let visits: Vec<OpenVisit> = visits
                .into_iter()
                .map(|visit| OpenVisit {
                    minutes_inside: visit.elapsed_minutes(now),
                    visit,
                })
                .collect();
            HttpResponse::Ok().json(visits)
        }
        Err(err) => error_response(err),
    }
}

#[get("/v1/vehicles/{vehicle_id}/visits")]
pub async fn list_vehicle_visits(
    state: web::Data<AppState>,
    vehicle_id: web::Path<String>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let vehicle_id: VehicleId = match parse_id(&vehicle_id) {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state
        .visits
        .list_by_vehicle(vehicle_id, query.limit(), query.offset())
        .await
    {
        Ok(visits) => HttpResponse::Ok().json(visits),
        Err(err) => error_response(err),
    }
}
