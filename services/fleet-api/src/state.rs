use fleet_config::{PostgresConfig, ServiceConfig, StorageBackend};
use fleet_geofence::{AlertRequester, GeofenceService};
use fleet_storage::{
    AlertSink, MemoryStore, StorageError, VehicleResolver, VisitRepository, ZoneRepository,
};
use fleet_storage_postgres::PostgresStore;
use std::sync::Arc;

pub struct AppState {
    pub config: ServiceConfig,
    pub zones: Arc<dyn ZoneRepository>,
    pub visits: Arc<dyn VisitRepository>,
    pub vehicles: Arc<dyn VehicleResolver>,
    pub geofencing: GeofenceService,
}

impl AppState {
    pub async fn from_config(config: ServiceConfig) -> Result<Self, StorageError> {
        match config.storage_backend {
            StorageBackend::Memory => Ok(Self::with_store(config, Arc::new(MemoryStore::new()))),
            StorageBackend::Postgres => {
                let store = PostgresStore::connect(&PostgresConfig::from_env()).await?;
                Ok(Self::with_store(config, Arc::new(store)))
            }
        }
    }

    pub fn with_store<S>(config: ServiceConfig, store: Arc<S>) -> Self
    where
        S: ZoneRepository + VisitRepository + VehicleResolver + AlertSink + 'static,
    {
        let alerts = if config.alerts_enabled {
            AlertRequester::new(store.clone())
        } else {
            AlertRequester::disabled()
        };
        let geofencing =
            GeofenceService::new(store.clone(), store.clone(), store.clone(), alerts);
        Self {
            config,
            zones: store.clone(),
            visits: store.clone(),
            vehicles: store,
            geofencing,
        }
    }
}
