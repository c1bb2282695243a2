//! Order and report models for the dispatch engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::DispatchError;
use crate::grid::Cell;

pub type OrderId = u64;
pub type VehicleId = u32;

/// Lifecycle of a delivery order.
///
/// Transitions form a DAG: `Pending` leads to `Assigned` or `FailedNoVehicle`,
/// and `Assigned` leads to exactly one of the remaining terminal states.
/// `Pending` may also go straight to `Faulted` when its task dies before
/// reporting back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Queued, not yet dispatched
    Pending,
    /// A vehicle has been claimed for the order
    Assigned,
    /// Dropped off at the customer
    Delivered,
    /// No idle vehicle with enough energy at selection time
    FailedNoVehicle,
    /// Vehicle energy fell below the reserve mid-leg
    AbortedLowBattery,
    /// No obstacle-free route exists for one of the legs
    RouteUnavailable,
    /// A vehicle operation was rejected by its state machine
    Faulted,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending | OrderStatus::Assigned)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, FailedNoVehicle)
                | (Pending, Faulted)
                | (Assigned, Delivered)
                | (Assigned, AbortedLowBattery)
                | (Assigned, RouteUnavailable)
                | (Assigned, Faulted)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Delivered => "delivered",
            OrderStatus::FailedNoVehicle => "failed_no_vehicle",
            OrderStatus::AbortedLowBattery => "aborted_low_battery",
            OrderStatus::RouteUnavailable => "route_unavailable",
            OrderStatus::Faulted => "faulted",
        };
        f.pad(label)
    }
}

/// A pickup-and-dropoff job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub pickup: Cell,
    pub dropoff: Cell,
    pub status: OrderStatus,
    /// Vehicle that served (or is serving) the order
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(order_id: OrderId, pickup: Cell, dropoff: Cell) -> Self {
        Self {
            order_id,
            pickup,
            dropoff,
            status: OrderStatus::Pending,
            vehicle_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move the order to `next`, rejecting edges outside the status DAG.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), DispatchError> {
        if !self.status.can_transition_to(next) {
            return Err(DispatchError::InvalidOrderTransition {
                order_id: self.order_id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Final status of every order touched by a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    statuses: BTreeMap<OrderId, OrderStatus>,
}

impl DispatchReport {
    pub fn record(&mut self, order_id: OrderId, status: OrderStatus) {
        self.statuses.insert(order_id, status);
    }

    pub fn status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.statuses.get(&order_id).copied()
    }

    /// Number of orders that ended in `status`.
    pub fn count(&self, status: OrderStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrderId, OrderStatus)> + '_ {
        self.statuses.iter().map(|(id, status)| (*id, *status))
    }
}
