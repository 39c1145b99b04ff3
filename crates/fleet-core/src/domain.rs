use crate::error::{FleetError, FleetResult};
use crate::ids::{AlertId, CompanyId, DriverId, GeofenceId, VehicleId, VisitId};
use crate::time::{minutes_between, EpochMillis};
use fleet_geo::{Coordinate, ZoneGeometry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: GeofenceId,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(flatten)]
    pub geometry: ZoneGeometry,
    pub is_active: bool,
    /// Empty means the zone applies to every vehicle of the company.
    #[serde(default)]
    pub assigned_vehicle_ids: Vec<VehicleId>,
    #[serde(default)]
    pub alert_on_entry: bool,
    #[serde(default)]
    pub alert_on_exit: bool,
    #[serde(default)]
    pub created_at_ms: EpochMillis,
    #[serde(default)]
    pub updated_at_ms: EpochMillis,
}

impl Geofence {
    pub fn applies_to(&self, vehicle_id: VehicleId) -> bool {
        self.assigned_vehicle_ids.is_empty() || self.assigned_vehicle_ids.contains(&vehicle_id)
    }

    pub fn is_evaluated_for(&self, vehicle_id: VehicleId) -> bool {
        self.is_active && self.applies_to(vehicle_id)
    }

    pub fn alerts_on(&self, event_type: VisitEventType) -> bool {
        match event_type {
            VisitEventType::Entry => self.alert_on_entry,
            VisitEventType::Exit => self.alert_on_exit,
        }
    }

    /// Checks a zone definition before it is stored. Evaluation never calls
    /// this; malformed stored zones simply contain nothing.
    pub fn validate(&self) -> FleetResult<()> {
        if self.name.trim().is_empty() {
            return Err(FleetError::invalid_input("geofence name is required"));
        }
        let shape = self
            .geometry
            .shape()
            .map_err(|err| FleetError::invalid_input(err.to_string()))?;
        shape
            .validate()
            .map_err(|err| FleetError::invalid_input(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub vehicle_id: VehicleId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: EpochMillis,
}

impl PositionSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn validate(&self) -> FleetResult<()> {
        self.coordinate()
            .validate()
            .map_err(|err| FleetError::invalid_input(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitEventType {
    Entry,
    Exit,
}

impl VisitEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

/// One row per transition. The entry row is backfilled with the exit fields
/// when the visit closes, so both rows report the same duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: VisitId,
    pub company_id: CompanyId,
    pub geofence_id: GeofenceId,
    pub vehicle_id: VehicleId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub event_type: VisitEventType,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: EpochMillis,
    pub entry_timestamp_ms: EpochMillis,
    #[serde(default)]
    pub exit_timestamp_ms: Option<EpochMillis>,
    #[serde(default)]
    pub duration_minutes: Option<u64>,
}

impl VisitRecord {
    /// An entry row that has not been closed by an exit.
    pub fn is_open(&self) -> bool {
        self.event_type == VisitEventType::Entry && self.exit_timestamp_ms.is_none()
    }

    pub fn apply(&mut self, patch: &VisitPatch) {
        self.exit_timestamp_ms = Some(patch.exit_timestamp_ms);
        self.duration_minutes = Some(patch.duration_minutes);
    }

    /// Final duration for closed visits, duration so far for open ones.
    pub fn elapsed_minutes(&self, now: EpochMillis) -> u64 {
        match self.duration_minutes {
            Some(minutes) => minutes,
            None => minutes_between(self.entry_timestamp_ms, now).max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitPatch {
    pub exit_timestamp_ms: EpochMillis,
    pub duration_minutes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedEntry {
    pub visit_id: VisitId,
    pub patch: VisitPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub event_type: VisitEventType,
    pub geofence_id: GeofenceId,
    pub visit_record: VisitRecord,
    /// Set on exits: the open entry row and the fields to backfill on it.
    #[serde(default)]
    pub closed_entry: Option<ClosedEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventType {
    GeofenceEntry,
    GeofenceExit,
}

impl From<VisitEventType> for AlertEventType {
    fn from(value: VisitEventType) -> Self {
        match value {
            VisitEventType::Entry => Self::GeofenceEntry,
            VisitEventType::Exit => Self::GeofenceExit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub geofence_id: GeofenceId,
    pub geofence_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub duration_minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub company_id: CompanyId,
    pub title: String,
    pub message: String,
    pub event_type: AlertEventType,
    pub vehicle_id: VehicleId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub metadata: AlertMetadata,
    #[serde(default)]
    pub created_at_ms: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(flatten)]
    pub request: AlertRequest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MILLIS_PER_MINUTE;
    use fleet_geo::BoundingBox;

    fn zone(geometry: ZoneGeometry) -> Geofence {
        Geofence {
            id: GeofenceId::new(),
            company_id: CompanyId::new(),
            name: "Yard".to_string(),
            geometry,
            is_active: true,
            assigned_vehicle_ids: Vec::new(),
            alert_on_entry: true,
            alert_on_exit: false,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn unassigned_zone_applies_to_every_vehicle() {
        let mut geofence = zone(ZoneGeometry::circle(Coordinate::new(0.0, 0.0), 10.0));
        let truck = VehicleId::new();
        assert!(geofence.is_evaluated_for(truck));

        geofence.assigned_vehicle_ids = vec![VehicleId::new()];
        assert!(!geofence.applies_to(truck));

        geofence.assigned_vehicle_ids.push(truck);
        assert!(geofence.is_evaluated_for(truck));

        geofence.is_active = false;
        assert!(!geofence.is_evaluated_for(truck));
    }

    #[test]
    fn validate_rejects_antimeridian_rectangle() {
        let geofence = zone(ZoneGeometry::rectangle(BoundingBox {
            north: 1.0,
            south: -1.0,
            east: -179.0,
            west: 179.0,
        }));
        let err = geofence.validate().expect_err("antimeridian");
        assert_eq!(err.code, crate::ErrorCode::InvalidInput);
    }

    #[test]
    fn validate_rejects_blank_name() {
        let mut geofence = zone(ZoneGeometry::circle(Coordinate::new(0.0, 0.0), 10.0));
        assert!(geofence.validate().is_ok());
        geofence.name = "  ".to_string();
        assert!(geofence.validate().is_err());
    }

    #[test]
    fn open_visit_reports_elapsed_minutes() {
        let mut visit = VisitRecord {
            id: VisitId::new(),
            company_id: CompanyId::new(),
            geofence_id: GeofenceId::new(),
            vehicle_id: VehicleId::new(),
            driver_id: None,
            event_type: VisitEventType::Entry,
            latitude: 0.0,
            longitude: 0.0,
            timestamp_ms: 1_000,
            entry_timestamp_ms: 1_000,
            exit_timestamp_ms: None,
            duration_minutes: None,
        };
        assert!(visit.is_open());
        assert_eq!(visit.elapsed_minutes(1_000 + 12 * MILLIS_PER_MINUTE), 12);

        visit.apply(&VisitPatch {
            exit_timestamp_ms: 1_000 + 20 * MILLIS_PER_MINUTE,
            duration_minutes: 20,
        });
        assert!(!visit.is_open());
        assert_eq!(visit.elapsed_minutes(1_000 + 90 * MILLIS_PER_MINUTE), 20);
    }

    #[test]
    fn geofence_round_trips_flat_json() {
        let geofence = zone(ZoneGeometry::circle(Coordinate::new(1.0, 2.0), 50.0));
        let value = serde_json::to_value(&geofence).expect("serialize");
        assert_eq!(value["zone_type"], "circle");
        assert_eq!(value["radius_meters"], 50.0);
        let back: Geofence = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, geofence);
    }
}
