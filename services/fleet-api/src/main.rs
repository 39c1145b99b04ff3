mod routes;
mod state;

use actix_web::{web, App, HttpServer};
use fleet_config::ServiceConfig;
use fleet_observability::{init, log_startup, ObservabilityConfig};
use state::AppState;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServiceConfig::from_env("fleet-api");
    let obs_config = ObservabilityConfig {
        service_name: config.service_name.clone(),
        environment: config.environment.to_string(),
        log_level: config.log_level.clone(),
        metrics_addr: config.metrics_addr.clone(),
    };
    let handle = init(&obs_config);
    if handle.metrics_enabled() {
        fleet_geofence::describe_metrics();
    }
    log_startup(&handle, &obs_config.environment);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config)
        .await
        .map_err(|err| io::Error::other(err.message))?;
    let shared_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(shared_state.clone())
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
