//! Counter names emitted by the geofencing pipeline.

pub const SAMPLES_TOTAL: &str = "fleet_geofence_samples_total";
/// Labelled by `event_type`.
pub const EVENTS_TOTAL: &str = "fleet_geofence_events_total";
pub const INVALID_ZONES_TOTAL: &str = "fleet_geofence_invalid_zones_total";
pub const CLOCK_SKEW_TOTAL: &str = "fleet_geofence_clock_skew_total";
/// Labelled by `outcome`.
pub const ALERTS_TOTAL: &str = "fleet_geofence_alerts_total";

pub const COUNTERS: [(&str, &str); 5] = [
    (
        SAMPLES_TOTAL,
        "Position samples accepted for geofence evaluation",
    ),
    (EVENTS_TOTAL, "Geofence entry and exit transitions recorded"),
    (
        INVALID_ZONES_TOTAL,
        "Zone evaluations skipped because the zone geometry is malformed",
    ),
    (
        CLOCK_SKEW_TOTAL,
        "Exits whose sample predates the entry; duration clamped to zero",
    ),
    (ALERTS_TOTAL, "Geofence alert requests by outcome"),
];

/// Registers help text for every counter with the installed recorder.
/// Call once after the exporter is up.
pub fn describe_metrics() {
    for (name, help) in COUNTERS {
        metrics::describe_counter!(name, help);
    }
}
