//! Delivery vehicle state machine.
//!
//! ```text
//! Idle --take_off--> Flying --land--> Idle
//!                    Flying --emergency_return--> Returning --(home)--> Idle
//!                                                 Returning --(no energy)--> GroundedLowBattery
//! ```
//!
//! Every operation runs under the vehicle's own lock, including the simulated
//! transit time, so two tasks can never interleave moves of one vehicle.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex as SlotMutex};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::DispatchConfig;
use crate::error::VehicleError;
use crate::grid::Cell;
use crate::models::{OrderId, VehicleId};
use crate::telemetry::{EventBus, VehicleEvent, VehicleEventKind};

pub const FULL_ENERGY: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    /// On the ground, available
    #[default]
    Idle,
    /// Airborne and serving an order
    Flying,
    /// Heading home on low battery
    Returning,
    /// Landed with no energy left
    GroundedLowBattery,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleStatus::Idle => "idle",
            VehicleStatus::Flying => "flying",
            VehicleStatus::Returning => "returning",
            VehicleStatus::GroundedLowBattery => "grounded_low_battery",
        };
        f.pad(label)
    }
}

/// Initial state for a vehicle joining the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub vehicle_id: VehicleId,
    pub home: Cell,
    pub energy: f64,
    pub status: VehicleStatus,
}

impl VehicleSpec {
    /// Idle vehicle with a full battery, parked at `home`.
    pub fn new(vehicle_id: VehicleId, home: Cell) -> Self {
        Self {
            vehicle_id,
            home,
            energy: FULL_ENERGY,
            status: VehicleStatus::Idle,
        }
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy.clamp(0.0, FULL_ENERGY);
        self
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = status;
        self
    }
}

/// Point-in-time copy of a vehicle's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: VehicleId,
    pub home: Cell,
    pub cell: Cell,
    pub altitude_m: f64,
    pub energy: f64,
    pub status: VehicleStatus,
    pub claimed_by: Option<OrderId>,
}

#[derive(Debug)]
struct VehicleState {
    cell: Cell,
    altitude_m: f64,
    energy: f64,
    status: VehicleStatus,
    rng: StdRng,
}

pub struct Vehicle {
    id: VehicleId,
    home: Cell,
    drain_min: f64,
    drain_max: f64,
    step_delay: Duration,
    state: Mutex<VehicleState>,
    /// Order holding the vehicle. Kept outside `state` so selection can skip
    /// a claimed vehicle without waiting for its current move to finish.
    claim: SlotMutex<Option<OrderId>>,
    events: EventBus,
}

impl Vehicle {
    pub fn new(spec: VehicleSpec, config: &DispatchConfig, events: EventBus) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(mix_seed(seed, spec.vehicle_id)),
            None => StdRng::from_os_rng(),
        };
        let altitude_m = match spec.status {
            VehicleStatus::Flying | VehicleStatus::Returning => config.cruise_altitude_m,
            _ => 0.0,
        };
        Self {
            id: spec.vehicle_id,
            home: spec.home,
            drain_min: config.drain_min,
            drain_max: config.drain_max.max(config.drain_min),
            step_delay: config.step_delay(),
            state: Mutex::new(VehicleState {
                cell: spec.home,
                altitude_m,
                energy: spec.energy.clamp(0.0, FULL_ENERGY),
                status: spec.status,
                rng,
            }),
            claim: SlotMutex::new(None),
            events,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn home(&self) -> Cell {
        self.home
    }

    pub async fn snapshot(&self) -> VehicleSnapshot {
        let state = self.state.lock().await;
        VehicleSnapshot {
            vehicle_id: self.id,
            home: self.home,
            cell: state.cell,
            altitude_m: state.altitude_m,
            energy: state.energy,
            status: state.status,
            claimed_by: self.claimed_by(),
        }
    }

    pub async fn energy(&self) -> f64 {
        self.state.lock().await.energy
    }

    pub fn claimed_by(&self) -> Option<OrderId> {
        *self.claim_slot()
    }

    /// Claim the vehicle for `order_id` if it is idle, unclaimed and above
    /// `reserve`. Callers must hold the fleet claim guard.
    pub(crate) async fn try_claim(&self, order_id: OrderId, reserve: f64) -> bool {
        if self.claimed_by().is_some() {
            return false;
        }
        let state = self.state.lock().await;
        if state.status != VehicleStatus::Idle || state.energy <= reserve {
            return false;
        }
        *self.claim_slot() = Some(order_id);
        self.publish(&state, VehicleEventKind::Claimed);
        true
    }

    pub(crate) async fn release(&self) -> Result<(), VehicleError> {
        let state = self.state.lock().await;
        if self.claimed_by().is_none() {
            return Err(VehicleError::NotClaimed { vehicle_id: self.id });
        }
        self.publish(&state, VehicleEventKind::Released);
        *self.claim_slot() = None;
        Ok(())
    }

    /// Free a claim whose order task died mid-flight. Lands the vehicle in
    /// place when its state is not locked elsewhere.
    fn abandon_claim(&self) {
        match self.state.try_lock() {
            Ok(mut state) => {
                if matches!(state.status, VehicleStatus::Flying | VehicleStatus::Returning) {
                    let _ = self.land_locked(&mut state);
                }
                tracing::warn!(
                    "[Vehicle {}] Claim for order {:?} abandoned at {}",
                    self.id,
                    self.claimed_by(),
                    state.cell
                );
                self.publish(&state, VehicleEventKind::Released);
            }
            Err(_) => tracing::error!("[Vehicle {}] Claim abandoned while state is busy", self.id),
        }
        *self.claim_slot() = None;
    }

    pub async fn take_off(&self, altitude_m: f64) -> Result<(), VehicleError> {
        let mut state = self.state.lock().await;
        if state.status != VehicleStatus::Idle {
            return Err(self.invalid(&state, "take off"));
        }
        state.altitude_m = altitude_m.max(0.0);
        state.status = VehicleStatus::Flying;
        tracing::info!("[Vehicle {}] Taking off to {}m", self.id, state.altitude_m);
        self.publish(&state, VehicleEventKind::TookOff);
        Ok(())
    }

    pub async fn land(&self) -> Result<(), VehicleError> {
        let mut state = self.state.lock().await;
        self.land_locked(&mut state)
    }

    /// Report a transient obstacle ahead on the event stream.
    pub async fn report_obstacle(&self) {
        let state = self.state.lock().await;
        tracing::info!("[Vehicle {}] Obstacle detected near {}! Rerouting...", self.id, state.cell);
        self.publish(&state, VehicleEventKind::ObstacleHold);
    }

    /// Fly one step to `cell`, draining energy and taking the transit time.
    /// Returns the remaining energy.
    pub async fn move_to(&self, cell: Cell) -> Result<f64, VehicleError> {
        let mut state = self.state.lock().await;
        self.step_locked(&mut state, cell).await
    }

    /// Abandon the current leg: fly straight to `home` and land.
    ///
    /// A vehicle with no energy left cannot make the hop and lands in place.
    pub async fn emergency_return(&self, home: Cell) -> Result<(), VehicleError> {
        let mut state = self.state.lock().await;
        if !matches!(state.status, VehicleStatus::Flying | VehicleStatus::Returning) {
            return Err(self.invalid(&state, "return home"));
        }
        state.status = VehicleStatus::Returning;
        tracing::warn!(
            "[Vehicle {}] Battery low ({:.1})! Returning home to {}",
            self.id,
            state.energy,
            home
        );
        self.publish(&state, VehicleEventKind::ReturnTriggered);

        if state.energy > 0.0 && state.cell != home {
            self.step_locked(&mut state, home).await?;
        }
        self.land_locked(&mut state)
    }

    async fn step_locked(&self, state: &mut VehicleState, cell: Cell) -> Result<f64, VehicleError> {
        if !matches!(state.status, VehicleStatus::Flying | VehicleStatus::Returning) {
            return Err(self.invalid(state, "move"));
        }
        let from = state.cell;
        let drain = state.rng.random_range(self.drain_min..=self.drain_max);
        state.cell = cell;
        state.energy = (state.energy - drain).max(0.0);
        tracing::debug!(
            "[Vehicle {}] Moving from {} to {} (energy {:.1})",
            self.id,
            from,
            cell,
            state.energy
        );
        self.publish(state, VehicleEventKind::Moved { from });

        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
        Ok(state.energy)
    }

    fn land_locked(&self, state: &mut VehicleState) -> Result<(), VehicleError> {
        if !matches!(state.status, VehicleStatus::Flying | VehicleStatus::Returning) {
            return Err(self.invalid(state, "land"));
        }
        state.altitude_m = 0.0;
        state.status = if state.energy <= 0.0 {
            VehicleStatus::GroundedLowBattery
        } else {
            VehicleStatus::Idle
        };
        tracing::info!("[Vehicle {}] Landing at {} ({})", self.id, state.cell, state.status);
        self.publish(state, VehicleEventKind::Landed);
        Ok(())
    }

    fn claim_slot(&self) -> std::sync::MutexGuard<'_, Option<OrderId>> {
        self.claim.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn invalid(&self, state: &VehicleState, action: &'static str) -> VehicleError {
        VehicleError::InvalidTransition {
            vehicle_id: self.id,
            from: state.status,
            action,
        }
    }

    fn publish(&self, state: &VehicleState, kind: VehicleEventKind) {
        self.events.publish(VehicleEvent {
            vehicle_id: self.id,
            order_id: self.claimed_by(),
            kind,
            cell: state.cell,
            altitude_m: state.altitude_m,
            energy: state.energy,
            status: state.status,
            timestamp: Utc::now(),
        });
    }
}

/// A claimed vehicle held by one order task.
///
/// Call [`ClaimGuard::release`] on every normal exit. If the guard is dropped
/// unreleased (the task panicked) the vehicle is landed and freed.
pub(crate) struct ClaimGuard {
    vehicle: Arc<Vehicle>,
    released: bool,
}

impl ClaimGuard {
    pub(crate) fn new(vehicle: Arc<Vehicle>) -> Self {
        Self { vehicle, released: false }
    }

    pub(crate) fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub(crate) async fn release(mut self) -> Result<(), VehicleError> {
        self.released = true;
        self.vehicle.release().await
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.released {
            self.vehicle.abandon_claim();
        }
    }
}

fn mix_seed(seed: u64, vehicle_id: VehicleId) -> u64 {
    seed ^ u64::from(vehicle_id).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
