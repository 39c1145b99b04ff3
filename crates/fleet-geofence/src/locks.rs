use dashmap::DashMap;
use fleet_core::{GeofenceId, VehicleId};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type VisitKey = (GeofenceId, VehicleId);

/// One async mutex per (geofence, vehicle) pair. Holding the guard covers
/// the read-decide-write cycle for that pair; distinct pairs never contend.
#[derive(Debug, Default)]
pub struct VisitLocks {
    locks: DashMap<VisitKey, Arc<Mutex<()>>>,
}

impl VisitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        geofence_id: GeofenceId,
        vehicle_id: VehicleId,
    ) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((geofence_id, vehicle_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(VisitLocks::new());
        let key = (GeofenceId::new(), VehicleId::new());

        let guard = locks.acquire(key.0, key.1).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(key.0, key.1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.expect("contender completes");
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = VisitLocks::new();
        let geofence_id = GeofenceId::new();
        let _first = locks.acquire(geofence_id, VehicleId::new()).await;
        let _second = locks.acquire(geofence_id, VehicleId::new()).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = VisitLocks::new();
        let held = locks.acquire(GeofenceId::new(), VehicleId::new()).await;
        {
            let _released = locks.acquire(GeofenceId::new(), VehicleId::new()).await;
        }
        locks.prune();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
