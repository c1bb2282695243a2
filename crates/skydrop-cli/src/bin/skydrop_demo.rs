//! Delivery fleet demo.
//!
//! Builds a scenario, dispatches every order concurrently and prints the
//! final fleet map and order report.
//!
//! Usage:
//!   cargo run -p skydrop-cli --bin skydrop-demo -- --scenario rush --seed 7

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use skydrop_cli::sim::{render_fleet, render_report, Scenario, ScenarioKind};
use skydrop_core::telemetry::drain;
use skydrop_core::{DispatchConfig, Dispatcher, VehicleEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Dispatch a batch of delivery orders over a simulated fleet")]
struct Args {
    /// Scenario to run
    #[arg(long, value_enum, default_value_t = ScenarioKind::Single)]
    scenario: ScenarioKind,

    /// Grid side length for the rush scenario (minimum 20)
    #[arg(long, default_value_t = 20)]
    size: u32,

    /// Obstacles scattered over the rush scenario grid
    #[arg(long, default_value_t = 40)]
    obstacles: usize,

    /// Seed for obstacle placement, energy drain and obstacle detection
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated transit time per grid step (overrides SKYDROP_STEP_DELAY_MS)
    #[arg(long)]
    step_ms: Option<u64>,

    /// Chance of a transient obstacle before each step
    #[arg(long)]
    obstacle_probability: Option<f64>,

    /// Print vehicle events as JSON lines while dispatching
    #[arg(long)]
    events: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("skydrop_core=info".parse()?)
            .add_directive("skydrop_cli=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = DispatchConfig::from_env();
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(step_ms) = args.step_ms {
        config.step_delay_ms = step_ms;
        config.reroute_delay_ms = step_ms;
    }
    if let Some(probability) = args.obstacle_probability {
        config.obstacle_probability = probability;
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let scenario = Scenario::build(args.scenario, args.size, args.obstacles, &mut rng)?;
    tracing::info!(
        "Scenario '{}': {}x{} grid, {} blocked, {} vehicles, {} orders",
        scenario.name,
        scenario.grid.dimensions().0,
        scenario.grid.dimensions().1,
        scenario.grid.blocked_count(),
        scenario.vehicles.len(),
        scenario.orders.len()
    );

    let mut dispatcher = Dispatcher::with_vehicles(scenario.grid, config, scenario.vehicles)?;
    for (order_id, pickup, dropoff) in scenario.orders {
        dispatcher.add_order(order_id, pickup, dropoff)?;
    }

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let printer = if args.events {
        let mut rx = dispatcher.subscribe();
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(event) => print_event(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Event printer lagged, {} events dropped", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut stop_rx => {
                        for event in drain(&mut rx) {
                            print_event(&event);
                        }
                        break;
                    }
                }
            }
        }))
    } else {
        None
    };

    let report = dispatcher.dispatch_all().await;
    let fleet = dispatcher.fleet_snapshot().await;

    if let Some(printer) = printer {
        let _ = stop_tx.send(());
        printer.await?;
    }

    if args.json {
        let body = json!({
            "report": report,
            "orders": dispatcher.orders(),
            "fleet": fleet,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render_fleet(dispatcher.grid(), &fleet));
        println!();
        print!("{}", render_report(&report, dispatcher.orders()));
    }

    Ok(())
}

fn print_event(event: &VehicleEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!("Failed to encode event: {}", e),
    }
}
