//! Vehicle pool with atomic select-and-claim.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::OrderId;
use crate::vehicle::{Vehicle, VehicleSnapshot};

/// The dispatcher's vehicles, in fixed selection order.
pub struct Fleet {
    vehicles: Vec<Arc<Vehicle>>,
    /// Serializes scan-and-claim so two orders never pick the same vehicle
    claim_guard: Mutex<()>,
}

impl Fleet {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles: vehicles.into_iter().map(Arc::new).collect(),
            claim_guard: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn vehicles(&self) -> &[Arc<Vehicle>] {
        &self.vehicles
    }

    /// First vehicle in fleet order that is idle, unclaimed and holds more
    /// than `reserve` energy, claimed for `order_id` before returning.
    pub async fn select_vehicle(&self, order_id: OrderId, reserve: f64) -> Option<Arc<Vehicle>> {
        let _guard = self.claim_guard.lock().await;
        for vehicle in &self.vehicles {
            if vehicle.try_claim(order_id, reserve).await {
                tracing::debug!("Order {} claimed vehicle {}", order_id, vehicle.id());
                return Some(vehicle.clone());
            }
        }
        None
    }

    pub async fn snapshot(&self) -> Vec<VehicleSnapshot> {
        let mut snapshots = Vec::with_capacity(self.vehicles.len());
        for vehicle in &self.vehicles {
            snapshots.push(vehicle.snapshot().await);
        }
        snapshots
    }
}
