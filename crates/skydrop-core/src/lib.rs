//! skydrop core: grid routing, vehicle state and concurrent order dispatch
//! for a small fleet of delivery vehicles.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fleet;
pub mod grid;
pub mod models;
pub mod obstacle;
pub mod planner;
pub mod telemetry;
pub mod vehicle;

pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError, GridError, VehicleError};
pub use fleet::Fleet;
pub use grid::{Cell, Grid};
pub use models::{DispatchReport, Order, OrderId, OrderStatus, VehicleId};
pub use obstacle::{ObstacleMonitor, ReroutePolicy};
pub use planner::{find_path, find_path_with_stats, route_length, PathResult, Route};
pub use telemetry::{EventBus, VehicleEvent, VehicleEventKind};
pub use vehicle::{Vehicle, VehicleSnapshot, VehicleSpec, VehicleStatus};
