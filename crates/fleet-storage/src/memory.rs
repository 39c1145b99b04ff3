//! In-process store implementing every repository trait. Backs the `memory`
//! storage backend and the test suites.

use crate::{AlertSink, StorageError, VehicleResolver, VisitRepository, ZoneRepository};
use async_trait::async_trait;
use fleet_core::{
    Alert, AlertId, AlertRequest, CompanyId, Geofence, GeofenceId, Vehicle, VehicleId, VisitId,
    VisitPatch, VisitRecord,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    zones: HashMap<GeofenceId, Geofence>,
    /// Insertion order is kept so history listings are stable.
    visits: Vec<VisitRecord>,
    vehicles: HashMap<VehicleId, Vehicle>,
    alerts: Vec<Alert>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.state.lock().await.alerts.clone()
    }

    pub async fn visits(&self) -> Vec<VisitRecord> {
        self.state.lock().await.visits.clone()
    }
}

impl MemoryState {
    fn insert_visit(&mut self, record: VisitRecord) -> Result<VisitRecord, StorageError> {
        if record.is_open()
            && self.visits.iter().any(|visit| {
                visit.is_open()
                    && visit.geofence_id == record.geofence_id
                    && visit.vehicle_id == record.vehicle_id
            })
        {
            return Err(StorageError::conflict(format!(
                "open visit already exists for geofence {} and vehicle {}",
                record.geofence_id, record.vehicle_id
            )));
        }
        self.visits.push(record.clone());
        Ok(record)
    }

    fn update_visit(&mut self, id: VisitId, patch: &VisitPatch) -> Result<(), StorageError> {
        let visit = self
            .visits
            .iter_mut()
            .find(|visit| visit.id == id)
            .ok_or_else(|| StorageError::not_found(format!("visit {} not found", id)))?;
        visit.apply(patch);
        Ok(())
    }
}

#[async_trait]
impl ZoneRepository for MemoryStore {
    async fn get(&self, id: GeofenceId) -> Result<Option<Geofence>, StorageError> {
        Ok(self.state.lock().await.zones.get(&id).cloned())
    }

    async fn list_active_zones(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<Geofence>, StorageError> {
        let state = self.state.lock().await;
        let mut zones: Vec<Geofence> = state
            .zones
            .values()
            .filter(|zone| zone.company_id == company_id && zone.is_active)
            .cloned()
            .collect();
        zones.sort_by_key(|zone| (zone.created_at_ms, zone.id));
        Ok(zones)
    }

    async fn list_by_company(
        &self,
        company_id: CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Geofence>, StorageError> {
        let state = self.state.lock().await;
        let mut zones: Vec<Geofence> = state
            .zones
            .values()
            .filter(|zone| zone.company_id == company_id)
            .cloned()
            .collect();
        zones.sort_by_key(|zone| (zone.created_at_ms, zone.id));
        Ok(zones.into_iter().skip(offset).take(limit).collect())
    }

    async fn upsert(&self, zone: Geofence) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.zones.get(&zone.id) {
            if existing.company_id != zone.company_id {
                return Err(StorageError::conflict(format!(
                    "geofence {} belongs to another company",
                    zone.id
                )));
            }
        }
        state.zones.insert(zone.id, zone);
        Ok(())
    }

    async fn delete(&self, id: GeofenceId) -> Result<(), StorageError> {
        self.state.lock().await.zones.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl VisitRepository for MemoryStore {
    async fn get_open_visit(
        &self,
        geofence_id: GeofenceId,
        vehicle_id: VehicleId,
    ) -> Result<Option<VisitRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .visits
            .iter()
            .rev()
            .find(|visit| {
                visit.is_open() && visit.geofence_id == geofence_id && visit.vehicle_id == vehicle_id
            })
            .cloned())
    }

    async fn insert_visit(&self, record: VisitRecord) -> Result<VisitRecord, StorageError> {
        self.state.lock().await.insert_visit(record)
    }

    async fn update_visit(&self, id: VisitId, patch: VisitPatch) -> Result<(), StorageError> {
        self.state.lock().await.update_visit(id, &patch)
    }

    async fn close_visit(
        &self,
        open_visit_id: VisitId,
        patch: VisitPatch,
        exit_record: VisitRecord,
    ) -> Result<VisitRecord, StorageError> {
        let mut state = self.state.lock().await;
        match state.visits.iter().find(|visit| visit.id == open_visit_id) {
            Some(visit) if !visit.is_open() => {
                return Err(StorageError::conflict(format!(
                    "visit {} is no longer open",
                    open_visit_id
                )));
            }
            _ => {}
        }
        state.update_visit(open_visit_id, &patch)?;
        state.insert_visit(exit_record)
    }

    async fn list_open_visits(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .visits
            .iter()
            .filter(|visit| visit.company_id == company_id && visit.is_open())
            .cloned()
            .collect())
    }

    async fn list_by_vehicle(
        &self,
        vehicle_id: VehicleId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .visits
            .iter()
            .rev()
            .filter(|visit| visit.vehicle_id == vehicle_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VehicleResolver for MemoryStore {
    async fn get_vehicle(
        &self,
        vehicle_id: VehicleId,
        company_id: CompanyId,
    ) -> Result<Option<Vehicle>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .vehicles
            .get(&vehicle_id)
            .filter(|vehicle| vehicle.company_id == company_id)
            .cloned())
    }

    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<(), StorageError> {
        self.state.lock().await.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }
}

#[async_trait]
impl AlertSink for MemoryStore {
    async fn create_alert(&self, request: AlertRequest) -> Result<AlertId, StorageError> {
        let id = AlertId::new();
        self.state.lock().await.alerts.push(Alert { id, request });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::VisitEventType;
    use fleet_geo::{Coordinate, ZoneGeometry};

    fn entry(company_id: CompanyId, geofence_id: GeofenceId, vehicle_id: VehicleId) -> VisitRecord {
        VisitRecord {
            id: VisitId::new(),
            company_id,
            geofence_id,
            vehicle_id,
            driver_id: None,
            event_type: VisitEventType::Entry,
            latitude: 1.0,
            longitude: 1.0,
            timestamp_ms: 1_000,
            entry_timestamp_ms: 1_000,
            exit_timestamp_ms: None,
            duration_minutes: None,
        }
    }

    #[tokio::test]
    async fn second_open_entry_is_a_conflict() {
        let store = MemoryStore::new();
        let company_id = CompanyId::new();
        let geofence_id = GeofenceId::new();
        let vehicle_id = VehicleId::new();

        store
            .insert_visit(entry(company_id, geofence_id, vehicle_id))
            .await
            .expect("first entry");
        let err = store
            .insert_visit(entry(company_id, geofence_id, vehicle_id))
            .await
            .expect_err("duplicate open entry");
        assert!(err.is_conflict());

        // A different vehicle in the same zone is independent.
        store
            .insert_visit(entry(company_id, geofence_id, VehicleId::new()))
            .await
            .expect("other vehicle");
    }

    #[tokio::test]
    async fn close_visit_backfills_entry_and_appends_exit() {
        let store = MemoryStore::new();
        let company_id = CompanyId::new();
        let geofence_id = GeofenceId::new();
        let vehicle_id = VehicleId::new();
        let open = store
            .insert_visit(entry(company_id, geofence_id, vehicle_id))
            .await
            .expect("entry");

        let patch = VisitPatch {
            exit_timestamp_ms: 61_000,
            duration_minutes: 1,
        };
        let exit = VisitRecord {
            id: VisitId::new(),
            event_type: VisitEventType::Exit,
            timestamp_ms: 61_000,
            exit_timestamp_ms: Some(61_000),
            duration_minutes: Some(1),
            ..open.clone()
        };
        store
            .close_visit(open.id, patch, exit)
            .await
            .expect("close");

        assert!(
            store
                .get_open_visit(geofence_id, vehicle_id)
                .await
                .expect("lookup")
                .is_none()
        );
        let visits = store.visits().await;
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].duration_minutes, Some(1));
        assert_eq!(visits[1].event_type, VisitEventType::Exit);
        assert!(store.list_open_visits(company_id).await.expect("list").is_empty());

        let again = VisitRecord {
            id: VisitId::new(),
            ..visits[1].clone()
        };
        let err = store
            .close_visit(open.id, patch, again)
            .await
            .expect_err("already closed");
        assert!(err.is_conflict());
        assert_eq!(store.visits().await.len(), 2);
    }

    #[tokio::test]
    async fn vehicle_lookup_is_company_scoped() {
        let store = MemoryStore::new();
        let vehicle = Vehicle {
            id: VehicleId::new(),
            company_id: CompanyId::new(),
            name: "Truck 12".to_string(),
            driver_id: None,
        };
        store.register_vehicle(vehicle.clone()).await.expect("register");

        let found = store
            .get_vehicle(vehicle.id, vehicle.company_id)
            .await
            .expect("lookup");
        assert_eq!(found, Some(vehicle.clone()));
        let other = store
            .get_vehicle(vehicle.id, CompanyId::new())
            .await
            .expect("lookup");
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn zone_cannot_move_to_another_company() {
        let store = MemoryStore::new();
        let zone = Geofence {
            id: GeofenceId::new(),
            company_id: CompanyId::new(),
            name: "Depot".to_string(),
            geometry: ZoneGeometry::circle(Coordinate::new(1.0, 1.0), 250.0),
            is_active: true,
            assigned_vehicle_ids: Vec::new(),
            alert_on_entry: true,
            alert_on_exit: true,
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
        };
        store.upsert(zone.clone()).await.expect("create");

        let hijack = Geofence {
            company_id: CompanyId::new(),
            ..zone.clone()
        };
        let err = store.upsert(hijack.clone()).await.expect_err("other company");
        assert!(err.is_conflict());
        assert_eq!(store.get(zone.id).await.expect("get"), Some(zone.clone()));
        assert!(
            store
                .list_active_zones(hijack.company_id)
                .await
                .expect("list")
                .is_empty()
        );

        let renamed = Geofence {
            name: "Main depot".to_string(),
            updated_at_ms: 2_000,
            ..zone
        };
        store.upsert(renamed.clone()).await.expect("same company update");
        assert_eq!(store.get(renamed.id).await.expect("get"), Some(renamed));
    }
}
