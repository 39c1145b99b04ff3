use crate::telemetry;
use crate::tracker::{self, Transition};
use fleet_core::{Geofence, GeofenceEvent, GeofenceId, PositionSample, VehicleId, VisitRecord};
use std::collections::HashMap;
use tracing::debug;

/// Active zones that apply to `vehicle_id`, in input order.
pub fn applicable_zones(zones: &[Geofence], vehicle_id: VehicleId) -> Vec<&Geofence> {
    zones
        .iter()
        .filter(|zone| zone.is_evaluated_for(vehicle_id))
        .collect()
}

/// Containment with malformed zones reported and treated as never
/// containing.
pub fn zone_contains(zone: &Geofence, sample: &PositionSample) -> bool {
    match zone.geometry.shape() {
        Ok(shape) => shape.contains(sample.coordinate()),
        Err(err) => {
            debug!(
                geofence_id = %zone.id,
                zone_type = %zone.geometry.zone_type,
                error = %err,
                "skipping malformed geofence"
            );
            metrics::counter!(telemetry::INVALID_ZONES_TOTAL).increment(1);
            false
        }
    }
}

pub fn evaluate_zone(
    zone: &Geofence,
    sample: &PositionSample,
    last_visit: Option<&VisitRecord>,
) -> Transition {
    let contained = zone_contains(zone, sample);
    tracker::transition(contained, last_visit, sample, zone)
}

/// Evaluates one sample against a zone set and the last known visit per zone.
/// Pure: the caller persists the returned records.
pub fn evaluate(
    sample: &PositionSample,
    zones: &[Geofence],
    last_visit_by_zone: &HashMap<GeofenceId, VisitRecord>,
) -> Vec<GeofenceEvent> {
    applicable_zones(zones, sample.vehicle_id)
        .into_iter()
        .filter_map(|zone| {
            evaluate_zone(zone, sample, last_visit_by_zone.get(&zone.id)).into_event()
        })
        .collect()
}
