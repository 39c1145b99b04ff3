use fleet_core::{CompanyId, ErrorCode, FleetError, VehicleId};
use fleet_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("vehicle {vehicle_id} not found for company {company_id}")]
    VehicleNotFound {
        vehicle_id: VehicleId,
        company_id: CompanyId,
    },
    #[error("invalid position sample: {0}")]
    InvalidSample(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<GeofenceError> for FleetError {
    fn from(err: GeofenceError) -> Self {
        match err {
            GeofenceError::VehicleNotFound { .. } => {
                FleetError::new(ErrorCode::NotFound, err.to_string())
            }
            GeofenceError::InvalidSample(_) => {
                FleetError::new(ErrorCode::InvalidInput, err.to_string())
            }
            GeofenceError::Storage(storage) => storage.into(),
        }
    }
}
