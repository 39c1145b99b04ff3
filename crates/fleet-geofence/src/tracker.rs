//! Visit state per (geofence, vehicle) pair.
//!
//! The pair is either Outside or Inside. Inside is recognised by an open
//! entry row (entry without exit timestamp), so repeated inside samples
//! never produce a second entry.

use crate::telemetry;
use fleet_core::{
    minutes_between, ClosedEntry, EpochMillis, Geofence, GeofenceEvent, PositionSample,
    VisitEventType, VisitId, VisitPatch, VisitRecord,
};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    None,
    Entry(VisitRecord),
    Exit {
        record: VisitRecord,
        closed_entry: ClosedEntry,
    },
}

impl Transition {
    pub fn event_type(&self) -> Option<VisitEventType> {
        match self {
            Self::None => None,
            Self::Entry(_) => Some(VisitEventType::Entry),
            Self::Exit { .. } => Some(VisitEventType::Exit),
        }
    }

    pub fn into_event(self) -> Option<GeofenceEvent> {
        match self {
            Self::None => None,
            Self::Entry(record) => Some(GeofenceEvent {
                event_type: VisitEventType::Entry,
                geofence_id: record.geofence_id,
                visit_record: record,
                closed_entry: None,
            }),
            Self::Exit {
                record,
                closed_entry,
            } => Some(GeofenceEvent {
                event_type: VisitEventType::Exit,
                geofence_id: record.geofence_id,
                visit_record: record,
                closed_entry: Some(closed_entry),
            }),
        }
    }
}

pub fn was_inside(last_visit: Option<&VisitRecord>) -> bool {
    last_visit.is_some_and(VisitRecord::is_open)
}

pub fn transition(
    is_contained: bool,
    last_visit: Option<&VisitRecord>,
    sample: &PositionSample,
    zone: &Geofence,
) -> Transition {
    match (is_contained, last_visit.filter(|visit| visit.is_open())) {
        (true, None) => Transition::Entry(new_record(
            VisitEventType::Entry,
            sample,
            zone,
            sample.timestamp_ms,
        )),
        (false, Some(open)) => {
            let duration_minutes = exit_duration_minutes(open, sample.timestamp_ms);
            let patch = VisitPatch {
                exit_timestamp_ms: sample.timestamp_ms,
                duration_minutes,
            };
            let mut record =
                new_record(VisitEventType::Exit, sample, zone, open.entry_timestamp_ms);
            record.apply(&patch);
            Transition::Exit {
                record,
                closed_entry: ClosedEntry {
                    visit_id: open.id,
                    patch,
                },
            }
        }
        _ => Transition::None,
    }
}

fn new_record(
    event_type: VisitEventType,
    sample: &PositionSample,
    zone: &Geofence,
    entry_timestamp_ms: EpochMillis,
) -> VisitRecord {
    VisitRecord {
        id: VisitId::new(),
        company_id: zone.company_id,
        geofence_id: zone.id,
        vehicle_id: sample.vehicle_id,
        driver_id: sample.driver_id,
        event_type,
        latitude: sample.latitude,
        longitude: sample.longitude,
        timestamp_ms: sample.timestamp_ms,
        entry_timestamp_ms,
        exit_timestamp_ms: None,
        duration_minutes: None,
    }
}

/// Exit samples older than their entry (clock skew, late delivery) clamp
/// to zero minutes; the exit itself still happens.
fn exit_duration_minutes(open: &VisitRecord, exit_timestamp_ms: EpochMillis) -> u64 {
    let minutes = minutes_between(open.entry_timestamp_ms, exit_timestamp_ms);
    if minutes < 0 || exit_timestamp_ms < open.entry_timestamp_ms {
        warn!(
            visit_id = %open.id,
            geofence_id = %open.geofence_id,
            vehicle_id = %open.vehicle_id,
            entry_timestamp_ms = open.entry_timestamp_ms,
            exit_timestamp_ms,
            "exit sample precedes entry, clamping visit duration to zero"
        );
        metrics::counter!(telemetry::CLOCK_SKEW_TOTAL).increment(1);
        return 0;
    }
    minutes as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{CompanyId, GeofenceId, VehicleId, MILLIS_PER_MINUTE};
    use fleet_geo::{Coordinate, ZoneGeometry};

    const T0: EpochMillis = 1_700_000_000_000;

    fn zone() -> Geofence {
        Geofence {
            id: GeofenceId::new(),
            company_id: CompanyId::new(),
            name: "Depot".to_string(),
            geometry: ZoneGeometry::circle(Coordinate::new(0.0, 0.0), 100.0),
            is_active: true,
            assigned_vehicle_ids: Vec::new(),
            alert_on_entry: false,
            alert_on_exit: false,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    fn sample(vehicle_id: VehicleId, timestamp_ms: EpochMillis) -> PositionSample {
        PositionSample {
            vehicle_id,
            driver_id: None,
            latitude: 0.0,
            longitude: 0.0,
            timestamp_ms,
        }
    }

    #[test]
    fn entry_when_contained_without_open_visit() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        let Transition::Entry(record) = transition(true, None, &sample(vehicle_id, T0), &zone)
        else {
            panic!("expected entry");
        };
        assert_eq!(record.event_type, VisitEventType::Entry);
        assert_eq!(record.entry_timestamp_ms, T0);
        assert_eq!(record.geofence_id, zone.id);
        assert_eq!(record.company_id, zone.company_id);
        assert!(record.is_open());
    }

    #[test]
    fn staying_inside_is_a_no_op() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        let Transition::Entry(open) = transition(true, None, &sample(vehicle_id, T0), &zone)
        else {
            panic!("expected entry");
        };
        let next = transition(
            true,
            Some(&open),
            &sample(vehicle_id, T0 + MILLIS_PER_MINUTE),
            &zone,
        );
        assert_eq!(next, Transition::None);
    }

    #[test]
    fn staying_outside_is_a_no_op() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        assert_eq!(
            transition(false, None, &sample(vehicle_id, T0), &zone),
            Transition::None
        );
    }

    #[test]
    fn exit_carries_entry_timestamp_and_duration() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        let Transition::Entry(open) = transition(true, None, &sample(vehicle_id, T0), &zone)
        else {
            panic!("expected entry");
        };
        let exit_at = T0 + 37 * MILLIS_PER_MINUTE;
        let Transition::Exit {
            record,
            closed_entry,
        } = transition(false, Some(&open), &sample(vehicle_id, exit_at), &zone)
        else {
            panic!("expected exit");
        };
        assert_eq!(record.event_type, VisitEventType::Exit);
        assert_eq!(record.entry_timestamp_ms, T0);
        assert_eq!(record.exit_timestamp_ms, Some(exit_at));
        assert_eq!(record.duration_minutes, Some(37));
        assert_eq!(closed_entry.visit_id, open.id);
        assert_eq!(closed_entry.patch.duration_minutes, 37);
        assert_eq!(closed_entry.patch.exit_timestamp_ms, exit_at);
    }

    #[test]
    fn closed_last_visit_counts_as_outside() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        let Transition::Entry(mut last) = transition(true, None, &sample(vehicle_id, T0), &zone)
        else {
            panic!("expected entry");
        };
        last.apply(&VisitPatch {
            exit_timestamp_ms: T0 + MILLIS_PER_MINUTE,
            duration_minutes: 1,
        });

        assert!(!was_inside(Some(&last)));
        assert_eq!(
            transition(false, Some(&last), &sample(vehicle_id, T0 + 2), &zone),
            Transition::None
        );
        assert!(matches!(
            transition(true, Some(&last), &sample(vehicle_id, T0 + 3), &zone),
            Transition::Entry(_)
        ));
    }

    #[test]
    fn negative_duration_is_clamped() {
        let zone = zone();
        let vehicle_id = VehicleId::new();
        let Transition::Entry(open) = transition(true, None, &sample(vehicle_id, T0), &zone)
        else {
            panic!("expected entry");
        };
        let Transition::Exit { record, .. } = transition(
            false,
            Some(&open),
            &sample(vehicle_id, T0 - 10 * MILLIS_PER_MINUTE),
            &zone,
        ) else {
            panic!("expected exit");
        };
        assert_eq!(record.duration_minutes, Some(0));
    }
}
