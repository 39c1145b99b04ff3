use crate::alerts::{AlertOutcome, AlertRequester};
use crate::error::GeofenceError;
use crate::evaluator;
use crate::locks::VisitLocks;
use crate::telemetry;
use crate::tracker::Transition;
use fleet_core::{CompanyId, Geofence, GeofenceEvent, PositionSample, Vehicle, VehicleId};
use fleet_storage::{VehicleResolver, VisitRepository, ZoneRepository};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Serialize)]
pub struct ReportedEvent {
    #[serde(flatten)]
    pub event: GeofenceEvent,
    pub alert: AlertOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub vehicle_id: VehicleId,
    pub zones_evaluated: usize,
    pub events: Vec<ReportedEvent>,
}

/// Drives the evaluator against injected repositories.
///
/// Work for one (geofence, vehicle) pair runs under that pair's lock, so
/// concurrent samples for the same vehicle cannot both open a visit or lose
/// an exit. Different pairs are processed concurrently.
pub struct GeofenceService {
    zones: Arc<dyn ZoneRepository>,
    visits: Arc<dyn VisitRepository>,
    vehicles: Arc<dyn VehicleResolver>,
    alerts: AlertRequester,
    locks: VisitLocks,
}

impl GeofenceService {
    pub fn new(
        zones: Arc<dyn ZoneRepository>,
        visits: Arc<dyn VisitRepository>,
        vehicles: Arc<dyn VehicleResolver>,
        alerts: AlertRequester,
    ) -> Self {
        Self {
            zones,
            visits,
            vehicles,
            alerts,
            locks: VisitLocks::new(),
        }
    }

    pub async fn process_sample(
        &self,
        company_id: CompanyId,
        sample: PositionSample,
    ) -> Result<EvaluationReport, GeofenceError> {
        sample
            .validate()
            .map_err(|err| GeofenceError::InvalidSample(err.message))?;
        metrics::counter!(telemetry::SAMPLES_TOTAL).increment(1);

        let vehicle = self
            .vehicles
            .get_vehicle(sample.vehicle_id, company_id)
            .await?
            .ok_or(GeofenceError::VehicleNotFound {
                vehicle_id: sample.vehicle_id,
                company_id,
            })?;
        let sample = PositionSample {
            driver_id: sample.driver_id.or(vehicle.driver_id),
            ..sample
        };

        let zones = self.zones.list_active_zones(company_id).await?;
        let applicable = evaluator::applicable_zones(&zones, vehicle.id);
        let zones_evaluated = applicable.len();

        let results = join_all(
            applicable
                .into_iter()
                .map(|zone| self.process_zone(zone, &sample, &vehicle)),
        )
        .await;
        self.locks.prune();

        let mut events = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    error!(
                        %company_id,
                        vehicle_id = %vehicle.id,
                        error = %err,
                        "failed to record geofence transition"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(EvaluationReport {
            vehicle_id: vehicle.id,
            zones_evaluated,
            events,
        })
    }

    async fn process_zone(
        &self,
        zone: &Geofence,
        sample: &PositionSample,
        vehicle: &Vehicle,
    ) -> Result<Option<ReportedEvent>, GeofenceError> {
        let guard = self.locks.acquire(zone.id, vehicle.id).await;
        let open = self.visits.get_open_visit(zone.id, vehicle.id).await?;

        let persisted = match evaluator::evaluate_zone(zone, sample, open.as_ref()) {
            Transition::None => Transition::None,
            Transition::Entry(record) => match self.visits.insert_visit(record).await {
                Ok(record) => Transition::Entry(record),
                Err(err) if err.is_conflict() => {
                    debug!(
                        geofence_id = %zone.id,
                        vehicle_id = %vehicle.id,
                        "open visit already recorded by another writer"
                    );
                    Transition::None
                }
                Err(err) => return Err(err.into()),
            },
            Transition::Exit {
                record,
                closed_entry,
            } => match self
                .visits
                .close_visit(closed_entry.visit_id, closed_entry.patch, record)
                .await
            {
                Ok(record) => Transition::Exit {
                    record,
                    closed_entry,
                },
                Err(err) if err.is_conflict() => {
                    debug!(
                        geofence_id = %zone.id,
                        vehicle_id = %vehicle.id,
                        visit_id = %closed_entry.visit_id,
                        "open visit already closed by another writer"
                    );
                    Transition::None
                }
                Err(err) => return Err(err.into()),
            },
        };
        drop(guard);

        let Some(event) = persisted.into_event() else {
            return Ok(None);
        };
        info!(
            geofence_id = %zone.id,
            geofence_name = %zone.name,
            vehicle_id = %vehicle.id,
            event_type = event.event_type.as_str(),
            duration_minutes = event.visit_record.duration_minutes,
            "geofence transition recorded"
        );
        metrics::counter!(
            telemetry::EVENTS_TOTAL,
            "event_type" => event.event_type.as_str()
        )
        .increment(1);

        let alert = self.alerts.request(&event, zone, vehicle).await;
        Ok(Some(ReportedEvent { event, alert }))
    }
}
