use crate::telemetry;
use fleet_core::{
    now_epoch_millis, AlertId, AlertMetadata, AlertRequest, Geofence, GeofenceEvent, Vehicle,
    VisitEventType,
};
use fleet_storage::AlertSink;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "alert_id")]
pub enum AlertOutcome {
    /// The zone does not alert on this event type.
    Skipped,
    Sent(AlertId),
    Failed,
}

impl AlertOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Sent(_) => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Builds the alert payload for `event`, or `None` when the zone does not
/// alert on that event type.
pub fn build_alert(event: &GeofenceEvent, zone: &Geofence, vehicle: &Vehicle) -> Option<AlertRequest> {
    if !zone.alerts_on(event.event_type) {
        return None;
    }
    let record = &event.visit_record;
    let (title, message) = match event.event_type {
        VisitEventType::Entry => (
            format!("Geofence Entry: {}", zone.name),
            format!("{} entered {}", vehicle.name, zone.name),
        ),
        VisitEventType::Exit => (
            format!("Geofence Exit: {}", zone.name),
            match record.duration_minutes {
                Some(minutes) => format!(
                    "{} exited {} after {} min",
                    vehicle.name, zone.name, minutes
                ),
                None => format!("{} exited {}", vehicle.name, zone.name),
            },
        ),
    };

    Some(AlertRequest {
        company_id: zone.company_id,
        title,
        message,
        event_type: event.event_type.into(),
        vehicle_id: record.vehicle_id,
        driver_id: record.driver_id,
        metadata: AlertMetadata {
            geofence_id: zone.id,
            geofence_name: zone.name.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            duration_minutes: record.duration_minutes,
        },
        created_at_ms: now_epoch_millis(),
    })
}

/// Best-effort alert forwarding. Delivery failures are logged and counted,
/// never returned: the visit transition is already recorded.
#[derive(Clone)]
pub struct AlertRequester {
    sink: Option<Arc<dyn AlertSink>>,
}

impl AlertRequester {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub async fn request(
        &self,
        event: &GeofenceEvent,
        zone: &Geofence,
        vehicle: &Vehicle,
    ) -> AlertOutcome {
        let outcome = match (&self.sink, build_alert(event, zone, vehicle)) {
            (Some(sink), Some(request)) => match sink.create_alert(request).await {
                Ok(alert_id) => {
                    debug!(
                        %alert_id,
                        geofence_id = %zone.id,
                        vehicle_id = %vehicle.id,
                        event_type = event.event_type.as_str(),
                        "geofence alert requested"
                    );
                    AlertOutcome::Sent(alert_id)
                }
                Err(err) => {
                    warn!(
                        geofence_id = %zone.id,
                        vehicle_id = %vehicle.id,
                        event_type = event.event_type.as_str(),
                        error = %err,
                        "geofence alert delivery failed"
                    );
                    AlertOutcome::Failed
                }
            },
            _ => AlertOutcome::Skipped,
        };
        metrics::counter!(telemetry::ALERTS_TOTAL, "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }
}
