pub mod common;
pub mod geofences;
pub mod health;
pub mod positions;
pub mod status;
pub mod vehicles;
pub mod visits;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(status::status)
        .service(positions::ingest_position)
        .service(geofences::list_geofences)
        .service(geofences::get_geofence)
        .service(geofences::upsert_geofence)
        .service(geofences::delete_geofence)
        .service(vehicles::register_vehicle)
        .service(visits::list_open_visits)
        .service(visits::list_vehicle_visits);
}

#[cfg(test)]
mod tests {
    use super::configure;
    use crate::state::AppState;
    use actix_web::{http::StatusCode, test, web, App};
    use fleet_config::{Environment, ServiceConfig, StorageBackend};
    use fleet_core::{CompanyId, GeofenceId, Vehicle, VehicleId};
    use fleet_geo::{BoundingBox, ZoneGeometry};
    use fleet_storage::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn config() -> ServiceConfig {
        ServiceConfig {
            service_name: "fleet-api".to_string(),
            environment: Environment::Local,
            region: None,
            bind_addr: "127.0.0.1:0".to_string(),
            metrics_addr: None,
            log_level: "info".to_string(),
            storage_backend: StorageBackend::Memory,
            alerts_enabled: true,
        }
    }

    fn yard(company_id: CompanyId) -> Value {
        let geometry = ZoneGeometry::rectangle(BoundingBox {
            north: 2.0,
            south: 1.0,
            east: 2.0,
            west: 1.0,
        });
        let mut body = serde_json::to_value(geometry).expect("geometry json");
        body["id"] = json!(GeofenceId::new());
        body["company_id"] = json!(company_id);
        body["name"] = json!("Yard");
        body["is_active"] = json!(true);
        body["alert_on_entry"] = json!(true);
        body
    }

    #[actix_web::test]
    async fn position_updates_drive_visits() {
        let state = web::Data::new(AppState::with_store(config(), Arc::new(MemoryStore::new())));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let company_id = CompanyId::new();
        let vehicle = Vehicle {
            id: VehicleId::new(),
            company_id,
            name: "Van 4".to_string(),
            driver_id: None,
        };
        let req = test::TestRequest::post()
            .uri("/v1/vehicles")
            .set_json(&vehicle)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/v1/geofences")
            .set_json(yard(company_id))
            .to_request();
        let zone: Value = test::call_and_read_body_json(&app, req).await;
        assert!(zone["created_at_ms"].as_u64().unwrap_or_default() > 0);

        let req = test::TestRequest::post()
            .uri("/v1/positions")
            .set_json(json!({
                "company_id": company_id,
                "vehicle_id": vehicle.id,
                "latitude": 1.5,
                "longitude": 1.5,
                "timestamp_ms": 1_700_000_000_000u64,
            }))
            .to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["zones_evaluated"], json!(1));
        assert_eq!(report["events"][0]["event_type"], json!("entry"));
        assert_eq!(report["events"][0]["alert"]["outcome"], json!("sent"));

        let req = test::TestRequest::get()
            .uri(&format!("/v1/companies/{company_id}/visits/open"))
            .to_request();
        let open: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(open.as_array().map(Vec::len), Some(1));
        assert_eq!(open[0]["geofence_id"], zone["id"]);
    }

    #[actix_web::test]
    async fn unknown_vehicle_is_not_found() {
        let state = web::Data::new(AppState::with_store(config(), Arc::new(MemoryStore::new())));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/positions")
            .set_json(json!({
                "company_id": CompanyId::new(),
                "vehicle_id": VehicleId::new(),
                "latitude": 1.5,
                "longitude": 1.5,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn malformed_geofence_is_rejected() {
        let state = web::Data::new(AppState::with_store(config(), Arc::new(MemoryStore::new())));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let mut body = yard(CompanyId::new());
        body["north_bound"] = Value::Null;
        let req = test::TestRequest::post()
            .uri("/v1/geofences")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn geofence_cannot_be_rebound_to_another_company() {
        let state = web::Data::new(AppState::with_store(config(), Arc::new(MemoryStore::new())));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let owner = CompanyId::new();
        let body = yard(owner);
        let req = test::TestRequest::post()
            .uri("/v1/geofences")
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let mut moved = body.clone();
        moved["company_id"] = json!(CompanyId::new());
        let req = test::TestRequest::post()
            .uri("/v1/geofences")
            .set_json(&moved)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CONFLICT
        );

        let req = test::TestRequest::get()
            .uri(&format!("/v1/geofences/{}", body["id"].as_str().unwrap_or_default()))
            .to_request();
        let stored: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stored["company_id"], json!(owner));
    }

    #[actix_web::test]
    async fn bad_path_id_is_rejected() {
        let state = web::Data::new(AppState::with_store(config(), Arc::new(MemoryStore::new())));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/v1/vehicles/not-a-uuid/visits")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
