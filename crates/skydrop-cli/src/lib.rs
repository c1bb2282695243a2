//! skydrop CLI - demo harness for the delivery fleet.
//!
//! Builds grids and order batches for the `skydrop-demo` binary and renders
//! the fleet state it reports back.

pub mod sim;

pub use sim::{create_blocked_scenario, create_rush_scenario, create_single_scenario, Scenario};
