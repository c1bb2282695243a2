//! Error types for grid construction, configuration, vehicles and dispatch.
//!
//! Operational outcomes (no vehicle, unreachable goal, low battery) are not
//! errors; they are carried by [`OrderStatus`](crate::models::OrderStatus).

use thiserror::Error;

use crate::grid::Cell;
use crate::models::{OrderId, OrderStatus, VehicleId};
use crate::vehicle::VehicleStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("grid dimensions exceed the addressable range")]
    TooLarge,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: u32, found: u32 },

    #[error("unknown cell glyph '{glyph}' at row {row}, column {col}")]
    UnknownGlyph { glyph: char, row: usize, col: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("obstacle probability must be within [0, 1], got {0}")]
    ObstacleProbability(f64),

    #[error("energy drain range is invalid: min {min}, max {max}")]
    DrainRange { min: f64, max: f64 },

    #[error("battery reserve must be within [0, 100], got {0}")]
    BatteryReserve(f64),

    #[error("cruise altitude must be finite and non-negative, got {0}")]
    CruiseAltitude(f64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VehicleError {
    #[error("vehicle {vehicle_id} cannot {action} while {from}")]
    InvalidTransition {
        vehicle_id: VehicleId,
        from: VehicleStatus,
        action: &'static str,
    },

    #[error("vehicle {vehicle_id} is not claimed by any order")]
    NotClaimed { vehicle_id: VehicleId },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("order {order_id}: cell {cell} is outside the grid")]
    OutOfBounds { order_id: OrderId, cell: Cell },

    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    #[error("order {0} does not exist")]
    UnknownOrder(OrderId),

    #[error("vehicle {vehicle_id}: home {cell} is not a free grid cell")]
    VehicleOutOfBounds { vehicle_id: VehicleId, cell: Cell },

    #[error("vehicle {0} appears more than once in the fleet")]
    DuplicateVehicle(VehicleId),

    #[error("order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
