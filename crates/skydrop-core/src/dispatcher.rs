//! Fleet dispatcher.
//!
//! Owns the order queue and the vehicle pool. `dispatch_all` launches one
//! task per pending order; each task claims a vehicle, flies the pickup leg
//! and then the dropoff leg, and returns the order in a terminal state.
//! A failing order never affects its siblings.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, VehicleError};
use crate::fleet::Fleet;
use crate::grid::{Cell, Grid};
use crate::models::{DispatchReport, Order, OrderId, OrderStatus};
use crate::obstacle::ObstacleMonitor;
use crate::planner::find_path;
use crate::telemetry::{EventBus, VehicleEvent};
use crate::vehicle::{ClaimGuard, Vehicle, VehicleSnapshot, VehicleSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegOutcome {
    Arrived,
    NoRoute,
    LowBattery,
}

/// Shared, read-only handles every order task needs.
#[derive(Clone)]
struct OrderContext {
    grid: Arc<Grid>,
    fleet: Arc<Fleet>,
    monitor: Arc<ObstacleMonitor>,
    config: Arc<DispatchConfig>,
}

pub struct Dispatcher {
    grid: Arc<Grid>,
    fleet: Arc<Fleet>,
    monitor: Arc<ObstacleMonitor>,
    config: Arc<DispatchConfig>,
    events: EventBus,
    orders: Vec<Order>,
}

impl Dispatcher {
    /// Dispatcher with `config.fleet_size` full vehicles parked at `config.home`.
    pub fn new(grid: Grid, config: DispatchConfig) -> Result<Self, DispatchError> {
        let specs = (0..config.fleet_size)
            .map(|id| VehicleSpec::new(id, config.home))
            .collect();
        Self::with_vehicles(grid, config, specs)
    }

    pub fn with_vehicles(
        grid: Grid,
        config: DispatchConfig,
        specs: Vec<VehicleSpec>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.vehicle_id) {
                return Err(DispatchError::DuplicateVehicle(spec.vehicle_id));
            }
            if !grid.is_free(spec.home) {
                return Err(DispatchError::VehicleOutOfBounds {
                    vehicle_id: spec.vehicle_id,
                    cell: spec.home,
                });
            }
        }

        let events = EventBus::new(config.event_capacity);
        let vehicles = specs
            .into_iter()
            .map(|spec| Vehicle::new(spec, &config, events.clone()))
            .collect();
        let monitor = ObstacleMonitor::new(
            config.obstacle_probability,
            config.reroute_policy,
            config.reroute_delay(),
            config.seed,
        );

        Ok(Self {
            grid: Arc::new(grid),
            fleet: Arc::new(Fleet::new(vehicles)),
            monitor: Arc::new(monitor),
            config: Arc::new(config),
            events,
            orders: Vec::new(),
        })
    }

    /// Replace the obstacle monitor built from the config.
    pub fn with_monitor(mut self, monitor: ObstacleMonitor) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Subscribe to vehicle events. Only events sent after subscribing are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<VehicleEvent> {
        self.events.subscribe()
    }

    /// Queue an order as `Pending`.
    pub fn add_order(&mut self, order_id: OrderId, pickup: Cell, dropoff: Cell) -> Result<(), DispatchError> {
        if self.orders.iter().any(|o| o.order_id == order_id) {
            return Err(DispatchError::DuplicateOrder(order_id));
        }
        for cell in [pickup, dropoff] {
            if !self.grid.in_bounds(cell) {
                return Err(DispatchError::OutOfBounds { order_id, cell });
            }
        }
        tracing::debug!("Queued order {}: {} -> {}", order_id, pickup, dropoff);
        self.orders.push(Order::new(order_id, pickup, dropoff));
        Ok(())
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, order_id: OrderId) -> Result<&Order, DispatchError> {
        self.orders
            .iter()
            .find(|o| o.order_id == order_id)
            .ok_or(DispatchError::UnknownOrder(order_id))
    }

    pub async fn fleet_snapshot(&self) -> Vec<VehicleSnapshot> {
        self.fleet.snapshot().await
    }

    /// Run every pending order concurrently and wait for all of them.
    pub async fn dispatch_all(&mut self) -> DispatchReport {
        let ctx = OrderContext {
            grid: self.grid.clone(),
            fleet: self.fleet.clone(),
            monitor: self.monitor.clone(),
            config: self.config.clone(),
        };

        let handles: Vec<_> = self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|order| {
                let order_id = order.order_id;
                (order_id, tokio::spawn(handle_order(ctx.clone(), order.clone())))
            })
            .collect();

        tracing::info!(
            "Dispatching {} pending orders across {} vehicles",
            handles.len(),
            self.fleet.len()
        );

        let mut report = DispatchReport::default();
        for (order_id, handle) in handles {
            match handle.await {
                Ok(done) => {
                    report.record(order_id, done.status);
                    if let Some(slot) = self.orders.iter_mut().find(|o| o.order_id == order_id) {
                        *slot = done;
                    }
                }
                Err(err) => {
                    tracing::error!("Order {} task did not complete: {}", order_id, err);
                    if let Some(slot) = self.orders.iter_mut().find(|o| o.order_id == order_id) {
                        advance(slot, OrderStatus::Faulted);
                        report.record(order_id, slot.status);
                    }
                }
            }
        }
        report
    }
}

async fn handle_order(ctx: OrderContext, mut order: Order) -> Order {
    let order_id = order.order_id;
    let Some(vehicle) = ctx.fleet.select_vehicle(order_id, ctx.config.battery_reserve).await else {
        tracing::warn!("No vehicles available for order {}", order_id);
        advance(&mut order, OrderStatus::FailedNoVehicle);
        return order;
    };

    let claim = ClaimGuard::new(vehicle);
    let vehicle = claim.vehicle();

    advance(&mut order, OrderStatus::Assigned);
    order.vehicle_id = Some(vehicle.id());
    tracing::info!("Order {} assigned to vehicle {}", order_id, vehicle.id());

    let outcome = match fly_order(&ctx, vehicle, &order).await {
        Ok(status) => status,
        Err(err) => {
            tracing::error!("Order {} faulted: {}", order_id, err);
            if let Err(land_err) = vehicle.land().await {
                tracing::debug!("Vehicle {} could not land after fault: {}", vehicle.id(), land_err);
            }
            OrderStatus::Faulted
        }
    };

    let vehicle_id = vehicle.id();
    if let Err(err) = claim.release().await {
        tracing::error!("Releasing vehicle {} failed: {}", vehicle_id, err);
    }

    match outcome {
        OrderStatus::Delivered => {
            tracing::info!("Order {} delivered by vehicle {}", order_id, vehicle_id)
        }
        other => tracing::warn!("Order {} ended {}", order_id, other),
    }
    advance(&mut order, outcome);
    order
}

fn advance(order: &mut Order, next: OrderStatus) {
    if let Err(err) = order.transition(next) {
        tracing::error!("{}", err);
    }
}

async fn fly_order(
    ctx: &OrderContext,
    vehicle: &Vehicle,
    order: &Order,
) -> Result<OrderStatus, VehicleError> {
    vehicle.take_off(ctx.config.cruise_altitude_m).await?;

    for (leg, goal) in [(Leg::Pickup, order.pickup), (Leg::Dropoff, order.dropoff)] {
        match fly_leg(ctx, vehicle, order.order_id, leg, goal).await? {
            LegOutcome::Arrived => {
                if leg == Leg::Pickup {
                    tracing::info!("Order {} picked up at {}", order.order_id, goal);
                }
            }
            LegOutcome::NoRoute => {
                vehicle.land().await?;
                return Ok(OrderStatus::RouteUnavailable);
            }
            LegOutcome::LowBattery => return Ok(OrderStatus::AbortedLowBattery),
        }
    }

    vehicle.land().await?;
    Ok(OrderStatus::Delivered)
}

/// Walk one leg cell by cell: check for obstacles, move, check energy.
async fn fly_leg(
    ctx: &OrderContext,
    vehicle: &Vehicle,
    order_id: OrderId,
    leg: Leg,
    goal: Cell,
) -> Result<LegOutcome, VehicleError> {
    let mut current = vehicle.snapshot().await.cell;
    let route = find_path(current, goal, &ctx.grid);
    if route.is_empty() {
        tracing::warn!(
            "Order {}: no route for {:?} leg from {} to {}",
            order_id,
            leg,
            current,
            goal
        );
        return Ok(LegOutcome::NoRoute);
    }
    tracing::debug!("Order {}: {:?} leg is {} steps", order_id, leg, route.len() - 1);

    let mut remaining: VecDeque<Cell> = route.into_iter().skip(1).collect();
    while !remaining.is_empty() {
        if ctx.monitor.detected() {
            vehicle.report_obstacle().await;
            let rerouted = ctx
                .monitor
                .reroute(current, goal, remaining.make_contiguous(), &ctx.grid)
                .await;
            remaining = rerouted.into();
        }
        let Some(next) = remaining.pop_front() else {
            break;
        };

        let energy = vehicle.move_to(next).await?;
        current = next;
        if energy < ctx.config.battery_reserve {
            vehicle.emergency_return(vehicle.home()).await?;
            return Ok(LegOutcome::LowBattery);
        }
    }
    Ok(LegOutcome::Arrived)
}
