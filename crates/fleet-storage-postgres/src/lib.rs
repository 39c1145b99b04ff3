use async_trait::async_trait;
use fleet_config::PostgresConfig;
use fleet_core::{
    AlertId, AlertRequest, CompanyId, DriverId, Geofence, GeofenceId, Vehicle, VehicleId,
    VisitEventType, VisitId, VisitPatch, VisitRecord,
};
use fleet_storage::{AlertSink, StorageError, VehicleResolver, VisitRepository, ZoneRepository};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const TABLE_GEOFENCES: &str = "geofences";
const TABLE_VEHICLES: &str = "vehicles";
const TABLE_VISITS: &str = "geofence_visits";
const TABLE_ALERTS: &str = "alerts";

/// The update arm only fires for the owning company, so a zone id can never
/// be rebound to another company through its payload.
const UPSERT_GEOFENCE_SQL: &str = "INSERT INTO geofences \
     (id, company_id, name, zone_type, is_active, created_at_ms, updated_at_ms, created_at, updated_at, payload) \
     VALUES \
     ($1, $2, $3, $4, $5, $6, $7, to_timestamp($6 / 1000.0), to_timestamp($7 / 1000.0), $8) \
     ON CONFLICT (id) DO UPDATE SET \
     name = EXCLUDED.name, \
     zone_type = EXCLUDED.zone_type, \
     is_active = EXCLUDED.is_active, \
     updated_at_ms = EXCLUDED.updated_at_ms, \
     updated_at = EXCLUDED.updated_at, \
     payload = EXCLUDED.payload \
     WHERE geofences.company_id = EXCLUDED.company_id";

const VISIT_COLUMNS: &str = "id, company_id, geofence_id, vehicle_id, driver_id, event_type, \
     latitude, longitude, timestamp_ms, entry_timestamp_ms, exit_timestamp_ms, duration_minutes";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_url)
            .await
            .map_err(map_err)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(map_err)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct VisitRow {
    id: Uuid,
    company_id: Uuid,
    geofence_id: Uuid,
    vehicle_id: Uuid,
    driver_id: Option<Uuid>,
    event_type: String,
    latitude: f64,
    longitude: f64,
    timestamp_ms: i64,
    entry_timestamp_ms: i64,
    exit_timestamp_ms: Option<i64>,
    duration_minutes: Option<i64>,
}

impl TryFrom<VisitRow> for VisitRecord {
    type Error = StorageError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let event_type = match row.event_type.as_str() {
            "entry" => VisitEventType::Entry,
            "exit" => VisitEventType::Exit,
            other => {
                return Err(StorageError::new(format!(
                    "unknown visit event type {other}"
                )));
            }
        };
        Ok(VisitRecord {
            id: VisitId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            geofence_id: GeofenceId::from_uuid(row.geofence_id),
            vehicle_id: VehicleId::from_uuid(row.vehicle_id),
            driver_id: row.driver_id.map(DriverId::from_uuid),
            event_type,
            latitude: row.latitude,
            longitude: row.longitude,
            timestamp_ms: to_u64(row.timestamp_ms)?,
            entry_timestamp_ms: to_u64(row.entry_timestamp_ms)?,
            exit_timestamp_ms: row.exit_timestamp_ms.map(to_u64).transpose()?,
            duration_minutes: row.duration_minutes.map(to_u64).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct VehicleRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    driver_id: Option<Uuid>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: VehicleId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            name: row.name,
            driver_id: row.driver_id.map(DriverId::from_uuid),
        }
    }
}

#[async_trait]
impl ZoneRepository for PostgresStore {
    async fn get(&self, id: GeofenceId) -> Result<Option<Geofence>, StorageError> {
        let payload: Option<Value> = sqlx::query_scalar(&format!(
            "SELECT payload FROM {} WHERE id = $1",
            TABLE_GEOFENCES
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        match payload {
            Some(value) => Ok(Some(from_json(value)?)),
            None => Ok(None),
        }
    }

    async fn list_active_zones(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<Geofence>, StorageError> {
        let payloads: Vec<Value> = sqlx::query_scalar(&format!(
            "SELECT payload FROM {} WHERE company_id = $1 AND is_active ORDER BY created_at_ms, id",
            TABLE_GEOFENCES
        ))
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        payloads.into_iter().map(from_json::<Geofence>).collect()
    }

    async fn list_by_company(
        &self,
        company_id: CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Geofence>, StorageError> {
        let payloads: Vec<Value> = sqlx::query_scalar(&format!(
            "SELECT payload FROM {} WHERE company_id = $1 ORDER BY created_at_ms, id LIMIT $2 OFFSET $3",
            TABLE_GEOFENCES
        ))
        .bind(company_id.as_uuid())
        .bind(to_sql_count(limit)?)
        .bind(to_sql_count(offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        payloads.into_iter().map(from_json::<Geofence>).collect()
    }

    async fn upsert(&self, zone: Geofence) -> Result<(), StorageError> {
        let payload = to_json(&zone)?;
        let zone_type = enum_to_string(&zone.geometry.zone_type)?;
        let result = sqlx::query(UPSERT_GEOFENCE_SQL)
            .bind(zone.id.as_uuid())
            .bind(zone.company_id.as_uuid())
            .bind(zone.name)
            .bind(zone_type)
            .bind(zone.is_active)
            .bind(to_i64(zone.created_at_ms)?)
            .bind(to_i64(zone.updated_at_ms)?)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::conflict(format!(
                "geofence {} belongs to another company",
                zone.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: GeofenceId) -> Result<(), StorageError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", TABLE_GEOFENCES))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl VisitRepository for PostgresStore {
    async fn get_open_visit(
        &self,
        geofence_id: GeofenceId,
        vehicle_id: VehicleId,
    ) -> Result<Option<VisitRecord>, StorageError> {
        let row: Option<VisitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM {} \
             WHERE geofence_id = $1 AND vehicle_id = $2 \
             AND event_type = 'entry' AND exit_timestamp_ms IS NULL",
            VISIT_COLUMNS, TABLE_VISITS
        ))
        .bind(geofence_id.as_uuid())
        .bind(vehicle_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(VisitRecord::try_from).transpose()
    }

    async fn insert_visit(&self, record: VisitRecord) -> Result<VisitRecord, StorageError> {
        insert_visit_query(&record)?
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(record)
    }

    async fn update_visit(&self, id: VisitId, patch: VisitPatch) -> Result<(), StorageError> {
        let result = update_visit_query(id, &patch)?
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("visit {} not found", id)));
        }
        Ok(())
    }

    async fn close_visit(
        &self,
        open_visit_id: VisitId,
        patch: VisitPatch,
        exit_record: VisitRecord,
    ) -> Result<VisitRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let updated = update_visit_query(open_visit_id, &patch)?
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::conflict(format!(
                "visit {} is no longer open",
                open_visit_id
            )));
        }
        insert_visit_query(&exit_record)?
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;
        tx.commit().await.map_err(map_err)?;
        debug!(visit_id = %open_visit_id, exit_id = %exit_record.id, "visit closed");
        Ok(exit_record)
    }

    async fn list_open_visits(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let rows: Vec<VisitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM {} \
             WHERE company_id = $1 AND event_type = 'entry' AND exit_timestamp_ms IS NULL \
             ORDER BY entry_timestamp_ms",
            VISIT_COLUMNS, TABLE_VISITS
        ))
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter().map(VisitRecord::try_from).collect()
    }

    async fn list_by_vehicle(
        &self,
        vehicle_id: VehicleId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let rows: Vec<VisitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM {} WHERE vehicle_id = $1 \
             ORDER BY timestamp_ms DESC, recorded_at DESC LIMIT $2 OFFSET $3",
            VISIT_COLUMNS, TABLE_VISITS
        ))
        .bind(vehicle_id.as_uuid())
        .bind(to_sql_count(limit)?)
        .bind(to_sql_count(offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter().map(VisitRecord::try_from).collect()
    }
}

#[async_trait]
impl VehicleResolver for PostgresStore {
    async fn get_vehicle(
        &self,
        vehicle_id: VehicleId,
        company_id: CompanyId,
    ) -> Result<Option<Vehicle>, StorageError> {
        let row: Option<VehicleRow> = sqlx::query_as(&format!(
            "SELECT id, company_id, name, driver_id FROM {} WHERE id = $1 AND company_id = $2",
            TABLE_VEHICLES
        ))
        .bind(vehicle_id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(row.map(Vehicle::from))
    }

    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, company_id, name, driver_id) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
             company_id = EXCLUDED.company_id, \
             name = EXCLUDED.name, \
             driver_id = EXCLUDED.driver_id",
            TABLE_VEHICLES
        ))
        .bind(vehicle.id.as_uuid())
        .bind(vehicle.company_id.as_uuid())
        .bind(vehicle.name)
        .bind(vehicle.driver_id.map(|id| id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for PostgresStore {
    async fn create_alert(&self, request: AlertRequest) -> Result<AlertId, StorageError> {
        let id = AlertId::new();
        let payload = to_json(&request)?;
        let event_type = enum_to_string(&request.event_type)?;
        sqlx::query(&format!(
            "INSERT INTO {} \
             (id, company_id, vehicle_id, event_type, title, message, created_at_ms, created_at, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, to_timestamp($7 / 1000.0), $8)",
            TABLE_ALERTS
        ))
        .bind(id.as_uuid())
        .bind(request.company_id.as_uuid())
        .bind(request.vehicle_id.as_uuid())
        .bind(event_type)
        .bind(request.title)
        .bind(request.message)
        .bind(to_i64(request.created_at_ms)?)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(id)
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn insert_visit_query(record: &VisitRecord) -> Result<PgQuery<'static>, StorageError> {
    Ok(sqlx::query(
        "INSERT INTO geofence_visits \
         (id, company_id, geofence_id, vehicle_id, driver_id, event_type, latitude, longitude, \
          timestamp_ms, entry_timestamp_ms, exit_timestamp_ms, duration_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(record.id.as_uuid())
    .bind(record.company_id.as_uuid())
    .bind(record.geofence_id.as_uuid())
    .bind(record.vehicle_id.as_uuid())
    .bind(record.driver_id.map(|id| id.as_uuid()))
    .bind(record.event_type.as_str())
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(to_i64(record.timestamp_ms)?)
    .bind(to_i64(record.entry_timestamp_ms)?)
    .bind(record.exit_timestamp_ms.map(to_i64).transpose()?)
    .bind(record.duration_minutes.map(to_i64).transpose()?))
}

fn update_visit_query(id: VisitId, patch: &VisitPatch) -> Result<PgQuery<'static>, StorageError> {
    Ok(sqlx::query(
        "UPDATE geofence_visits \
         SET exit_timestamp_ms = $2, duration_minutes = $3 \
         WHERE id = $1 AND event_type = 'entry' AND exit_timestamp_ms IS NULL",
    )
    .bind(id.as_uuid())
    .bind(to_i64(patch.exit_timestamp_ms)?)
    .bind(to_i64(patch.duration_minutes)?))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(map_err)
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, StorageError> {
    serde_json::from_value(value).map_err(map_err)
}

fn enum_to_string<T: Serialize>(value: &T) -> Result<String, StorageError> {
    match serde_json::to_value(value).map_err(map_err)? {
        Value::String(value) => Ok(value),
        _ => Err(StorageError::new("expected enum string value")),
    }
}

fn to_i64(value: u64) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::new("timestamp overflow"))
}

fn to_sql_count(value: usize) -> Result<i64, StorageError> {
    i64::try_from(value)
        .map_err(|_| StorageError::invalid_input(format!("page bound {value} out of range")))
}

fn to_u64(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| StorageError::new("negative value in unsigned column"))
}

/// Unique violations on visit inserts mean another writer already opened
/// the visit.
fn map_write_err(err: sqlx::Error) -> StorageError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => StorageError::conflict(db_err.to_string()),
        _ => map_err(&err),
    }
}

fn map_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::new(err.to_string())
}
