//! Demo scenarios, obstacle placement and text rendering.

mod obstacles;
mod render;
mod scenarios;

pub use obstacles::scatter_obstacles;
pub use render::{render_fleet, render_report};
pub use scenarios::{
    create_blocked_scenario, create_rush_scenario, create_single_scenario, Scenario,
    ScenarioKind,
};
