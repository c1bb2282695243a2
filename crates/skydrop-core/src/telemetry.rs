//! Vehicle event stream consumed by renderers and loggers.
//!
//! Events are notifications only; nothing sent here feeds back into dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::grid::Cell;
use crate::models::{OrderId, VehicleId};
use crate::vehicle::VehicleStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleEventKind {
    Claimed,
    TookOff,
    Moved { from: Cell },
    ObstacleHold,
    ReturnTriggered,
    Landed,
    Released,
}

/// One observable change of a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleEvent {
    pub vehicle_id: VehicleId,
    pub order_id: Option<OrderId>,
    pub kind: VehicleEventKind,
    pub cell: Cell,
    pub altitude_m: f64,
    pub energy: f64,
    pub status: VehicleStatus,
    pub timestamp: DateTime<Utc>,
}

/// Sending half of the event stream, cloned into every vehicle.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VehicleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VehicleEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, event: VehicleEvent) {
        let _ = self.tx.send(event);
    }
}

/// Drain every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<VehicleEvent>) -> Vec<VehicleEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Event subscriber lagged, {} events dropped", skipped);
            }
            Err(_) => break,
        }
    }
    events
}
