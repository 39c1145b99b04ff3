pub mod domain;
pub mod error;
pub mod ids;
pub mod time;

pub use domain::{
    Alert, AlertEventType, AlertMetadata, AlertRequest, ClosedEntry, Geofence, GeofenceEvent,
    PositionSample, Vehicle, VisitEventType, VisitPatch, VisitRecord,
};
pub use error::{ErrorCode, FleetError, FleetResult};
pub use ids::{AlertId, CompanyId, DriverId, GeofenceId, VehicleId, VisitId};
pub use time::{minutes_between, now_epoch_millis, EpochMillis, MILLIS_PER_MINUTE};
