//! Pre-defined delivery scenarios for the demo binary.

use clap::ValueEnum;
use rand::Rng;
use skydrop_core::{Cell, Grid, GridError, OrderId, VehicleSpec};

use super::scatter_obstacles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    /// One vehicle, one order on an open 10x10 grid
    Single,
    /// Three vehicles, three orders on a cluttered grid
    Rush,
    /// A dropoff walled in by obstacles
    Blocked,
}

/// A grid, a fleet and a batch of orders.
pub struct Scenario {
    pub name: String,
    pub grid: Grid,
    pub vehicles: Vec<VehicleSpec>,
    pub orders: Vec<(OrderId, Cell, Cell)>,
}

impl Scenario {
    pub fn build<R: Rng>(
        kind: ScenarioKind,
        size: u32,
        obstacles: usize,
        rng: &mut R,
    ) -> Result<Self, GridError> {
        match kind {
            ScenarioKind::Single => create_single_scenario(),
            ScenarioKind::Rush => create_rush_scenario(size, obstacles, rng),
            ScenarioKind::Blocked => create_blocked_scenario(),
        }
    }

    /// Vehicle homes and order endpoints.
    pub fn landmarks(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.vehicles.iter().map(|v| v.home).collect();
        for (_, pickup, dropoff) in &self.orders {
            cells.push(*pickup);
            cells.push(*dropoff);
        }
        cells
    }
}

/// Open 10x10 grid, one vehicle at the origin, one order to (5, 5).
pub fn create_single_scenario() -> Result<Scenario, GridError> {
    Ok(Scenario {
        name: "single".to_string(),
        grid: Grid::new(10, 10)?,
        vehicles: vec![VehicleSpec::new(0, Cell::new(0, 0))],
        orders: vec![(1, Cell::new(0, 0), Cell::new(5, 5))],
    })
}

/// Three vehicles at the origin racing three orders across a grid with
/// randomly scattered obstacles.
pub fn create_rush_scenario<R: Rng>(
    size: u32,
    obstacles: usize,
    rng: &mut R,
) -> Result<Scenario, GridError> {
    let size = size.max(20);
    let far = size as i32 - 1;
    let mid = size as i32 / 2;
    let mut scenario = Scenario {
        name: "rush".to_string(),
        grid: Grid::new(size, size)?,
        vehicles: (0..3).map(|id| VehicleSpec::new(id, Cell::new(0, 0))).collect(),
        orders: vec![
            (1, Cell::new(0, 0), Cell::new(far - 4, far - 4)),
            (2, Cell::new(2, 2), Cell::new(far - 1, far - 1)),
            (3, Cell::new(1, 1), Cell::new(mid, mid)),
        ],
    };
    let keep_clear = scenario.landmarks();
    let placed = scatter_obstacles(&mut scenario.grid, obstacles, &keep_clear, rng);
    tracing::debug!("Rush scenario placed {} obstacles", placed);
    Ok(scenario)
}

/// A reachable order followed by one whose dropoff is boxed in.
pub fn create_blocked_scenario() -> Result<Scenario, GridError> {
    let grid = Grid::from_rows(&[
        "............",
        "............",
        "........#...",
        ".......#.#..",
        "........#...",
        "............",
        "............",
    ])?;
    Ok(Scenario {
        name: "blocked".to_string(),
        grid,
        vehicles: vec![
            VehicleSpec::new(0, Cell::new(0, 0)),
            VehicleSpec::new(1, Cell::new(0, 6)),
        ],
        orders: vec![
            (1, Cell::new(3, 1), Cell::new(11, 6)),
            (2, Cell::new(4, 5), Cell::new(8, 3)),
        ],
    })
}
