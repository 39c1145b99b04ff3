//! Geofence visit tracking: containment per zone, entry/exit transitions,
//! visit persistence and alert requests for one position sample at a time.

pub mod alerts;
pub mod error;
pub mod evaluator;
pub mod locks;
pub mod service;
pub mod telemetry;
pub mod tracker;

pub use alerts::{build_alert, AlertOutcome, AlertRequester};
pub use error::GeofenceError;
pub use evaluator::{applicable_zones, evaluate, evaluate_zone, zone_contains};
pub use locks::VisitLocks;
pub use service::{EvaluationReport, GeofenceService, ReportedEvent};
pub use telemetry::describe_metrics;
pub use tracker::{transition, was_inside, Transition};
