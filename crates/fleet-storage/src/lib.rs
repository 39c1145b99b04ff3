use async_trait::async_trait;
use fleet_core::{
    AlertId, AlertRequest, CompanyId, ErrorCode, FleetError, Geofence, GeofenceId, Vehicle,
    VehicleId, VisitId, VisitPatch, VisitRecord,
};
use std::fmt;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    /// A write would break a uniqueness rule, e.g. a second open visit for
    /// the same geofence and vehicle.
    Conflict,
    /// Arguments the backend cannot represent, such as out-of-range page bounds.
    InvalidInput,
    Backend,
}

#[derive(Debug, Clone)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Backend,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::InvalidInput,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == StorageErrorKind::Conflict
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for FleetError {
    fn from(err: StorageError) -> Self {
        let code = match err.kind {
            StorageErrorKind::NotFound => ErrorCode::NotFound,
            StorageErrorKind::Conflict => ErrorCode::Conflict,
            StorageErrorKind::InvalidInput => ErrorCode::InvalidInput,
            StorageErrorKind::Backend => ErrorCode::Unavailable,
        };
        FleetError::new(code, err.message)
    }
}

#[async_trait]
pub trait ZoneRepository: Send + Sync {
    async fn get(&self, id: GeofenceId) -> Result<Option<Geofence>, StorageError>;
    /// Zones of the company with `is_active` set.
    async fn list_active_zones(&self, company_id: CompanyId)
    -> Result<Vec<Geofence>, StorageError>;
    async fn list_by_company(
        &self,
        company_id: CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Geofence>, StorageError>;
    /// Re-upserting an existing id under a different company fails with
    /// [`StorageErrorKind::Conflict`]; a zone never changes owner.
    async fn upsert(&self, zone: Geofence) -> Result<(), StorageError>;
    async fn delete(&self, id: GeofenceId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn get_open_visit(
        &self,
        geofence_id: GeofenceId,
        vehicle_id: VehicleId,
    ) -> Result<Option<VisitRecord>, StorageError>;

    /// Inserting an open entry while one already exists for the same
    /// geofence and vehicle fails with [`StorageErrorKind::Conflict`].
    async fn insert_visit(&self, record: VisitRecord) -> Result<VisitRecord, StorageError>;

    async fn update_visit(&self, id: VisitId, patch: VisitPatch) -> Result<(), StorageError>;

    /// Exit dual write: backfill the open entry row and insert the exit row.
    /// Implementations backed by a transactional store override this so both
    /// writes land together.
    async fn close_visit(
        &self,
        open_visit_id: VisitId,
        patch: VisitPatch,
        exit_record: VisitRecord,
    ) -> Result<VisitRecord, StorageError> {
        self.update_visit(open_visit_id, patch).await?;
        self.insert_visit(exit_record).await
    }

    async fn list_open_visits(&self, company_id: CompanyId)
    -> Result<Vec<VisitRecord>, StorageError>;

    async fn list_by_vehicle(
        &self,
        vehicle_id: VehicleId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<VisitRecord>, StorageError>;
}

#[async_trait]
pub trait VehicleResolver: Send + Sync {
    /// `None` when the vehicle does not exist or belongs to another company.
    async fn get_vehicle(
        &self,
        vehicle_id: VehicleId,
        company_id: CompanyId,
    ) -> Result<Option<Vehicle>, StorageError>;
    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn create_alert(&self, request: AlertRequest) -> Result<AlertId, StorageError>;
}
