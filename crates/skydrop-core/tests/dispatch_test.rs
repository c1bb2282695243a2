//! End-to-end dispatch tests.
//!
//! Simulated travel time runs on a paused tokio clock, so these tests keep
//! realistic step delays without costing wall time.

use skydrop_core::telemetry::drain;
use skydrop_core::{
    Cell, DispatchConfig, Dispatcher, Grid, OrderStatus, ReroutePolicy, VehicleEvent,
    VehicleEventKind, VehicleId, VehicleSpec, VehicleStatus,
};
use std::collections::HashMap;

fn config(seed: u64) -> DispatchConfig {
    DispatchConfig {
        obstacle_probability: 0.0,
        seed: Some(seed),
        event_capacity: 16_384,
        ..DispatchConfig::default()
    }
}

fn events_by_vehicle(events: &[VehicleEvent]) -> HashMap<VehicleId, Vec<&VehicleEvent>> {
    let mut by_vehicle: HashMap<VehicleId, Vec<&VehicleEvent>> = HashMap::new();
    for event in events {
        by_vehicle.entry(event.vehicle_id).or_default().push(event);
    }
    by_vehicle
}

/// Scenario A: one idle vehicle, open 10x10 grid, no obstacles.
#[tokio::test(start_paused = true)]
async fn single_order_is_delivered() {
    let grid = Grid::new(10, 10).unwrap();
    let mut dispatcher =
        Dispatcher::with_vehicles(grid, config(1), vec![VehicleSpec::new(0, Cell::new(0, 0))])
            .unwrap();
    dispatcher.add_order(1, Cell::new(0, 0), Cell::new(5, 5)).unwrap();

    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.status(1), Some(OrderStatus::Delivered));

    let vehicle = &dispatcher.fleet_snapshot().await[0];
    assert_eq!(vehicle.cell, Cell::new(5, 5));
    assert_eq!(vehicle.status, VehicleStatus::Idle);
    assert_eq!(vehicle.altitude_m, 0.0);
    assert_eq!(vehicle.claimed_by, None);
    assert!(vehicle.energy >= 80.0 && vehicle.energy <= 95.0, "energy = {}", vehicle.energy);

    let order = dispatcher.order(1).unwrap();
    assert_eq!(order.vehicle_id, Some(0));
    assert!(order.completed_at.is_some());
}

/// Scenario B: every vehicle is already airborne.
#[tokio::test(start_paused = true)]
async fn no_idle_vehicle_fails_immediately() {
    let grid = Grid::new(10, 10).unwrap();
    let specs = (0..3)
        .map(|id| VehicleSpec::new(id, Cell::new(0, 0)).with_status(VehicleStatus::Flying))
        .collect();
    let mut dispatcher = Dispatcher::with_vehicles(grid, config(2), specs).unwrap();
    let mut rx = dispatcher.subscribe();
    dispatcher.add_order(1, Cell::new(1, 1), Cell::new(4, 4)).unwrap();

    let started = tokio::time::Instant::now();
    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.status(1), Some(OrderStatus::FailedNoVehicle));
    assert_eq!(started.elapsed(), std::time::Duration::ZERO);
    assert!(drain(&mut rx).is_empty());

    let order = dispatcher.order(1).unwrap();
    assert_eq!(order.vehicle_id, None);
}

/// Scenario C: dropoff cell walled in on all four sides.
#[tokio::test(start_paused = true)]
async fn boxed_in_dropoff_is_route_unavailable() {
    let grid = Grid::from_rows(&[
        "........",
        "........",
        "....#...",
        "...#.#..",
        "....#...",
        "........",
    ])
    .unwrap();
    assert!(skydrop_core::find_path(Cell::new(0, 0), Cell::new(4, 3), &grid).is_empty());

    let mut dispatcher =
        Dispatcher::with_vehicles(grid, config(3), vec![VehicleSpec::new(0, Cell::new(0, 0))])
            .unwrap();
    dispatcher.add_order(1, Cell::new(2, 1), Cell::new(4, 3)).unwrap();

    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.status(1), Some(OrderStatus::RouteUnavailable));
    assert_ne!(report.status(1), Some(OrderStatus::Delivered));

    let vehicle = &dispatcher.fleet_snapshot().await[0];
    assert_eq!(vehicle.cell, Cell::new(2, 1));
    assert_eq!(vehicle.status, VehicleStatus::Idle);
    assert_eq!(vehicle.claimed_by, None);
}

#[tokio::test(start_paused = true)]
async fn low_battery_aborts_and_returns_home() {
    let grid = Grid::new(10, 10).unwrap();
    let config = DispatchConfig {
        drain_min: 2.0,
        drain_max: 2.0,
        ..config(4)
    };
    let mut dispatcher = Dispatcher::with_vehicles(
        grid,
        config,
        vec![VehicleSpec::new(0, Cell::new(0, 0)).with_energy(21.0)],
    )
    .unwrap();
    let mut rx = dispatcher.subscribe();
    dispatcher.add_order(1, Cell::new(0, 0), Cell::new(6, 0)).unwrap();

    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.status(1), Some(OrderStatus::AbortedLowBattery));

    let vehicle = &dispatcher.fleet_snapshot().await[0];
    assert_eq!(vehicle.cell, Cell::new(0, 0));
    assert_eq!(vehicle.status, VehicleStatus::Idle);
    assert_eq!(vehicle.energy, 17.0);

    let events = drain(&mut rx);
    let returning = events
        .iter()
        .position(|e| e.kind == VehicleEventKind::ReturnTriggered)
        .expect("return event");
    assert_eq!(events[returning].status, VehicleStatus::Returning);
    let landed = events
        .iter()
        .rposition(|e| e.kind == VehicleEventKind::Landed)
        .expect("landing event");
    assert!(landed > returning);
    assert_eq!(events[landed].status, VehicleStatus::Idle);

    // Below the reserve: the next order cannot use it.
    dispatcher.add_order(2, Cell::new(1, 1), Cell::new(2, 2)).unwrap();
    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.status(2), Some(OrderStatus::FailedNoVehicle));
}

#[tokio::test(start_paused = true)]
async fn vehicles_are_never_shared_between_orders() {
    let grid = Grid::new(12, 12).unwrap();
    let config = DispatchConfig {
        drain_min: 0.5,
        drain_max: 1.0,
        obstacle_probability: 0.3,
        ..config(5)
    };
    let specs = (0..3).map(|id| VehicleSpec::new(id, Cell::new(0, id as i32))).collect();
    let mut dispatcher = Dispatcher::with_vehicles(grid, config, specs).unwrap();
    let mut rx = dispatcher.subscribe();

    for order_id in 0..8u64 {
        let offset = order_id as i32;
        dispatcher
            .add_order(order_id, Cell::new(offset, 2), Cell::new(11 - offset, 9))
            .unwrap();
    }

    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.len(), 8);
    assert_eq!(report.count(OrderStatus::Delivered), 3);
    assert_eq!(report.count(OrderStatus::FailedNoVehicle), 5);

    let mut served_by: Vec<VehicleId> = dispatcher
        .orders()
        .iter()
        .filter(|o| o.status == OrderStatus::Delivered)
        .filter_map(|o| o.vehicle_id)
        .collect();
    served_by.sort();
    assert_eq!(served_by, vec![0, 1, 2]);

    let events = drain(&mut rx);
    for (vehicle_id, stream) in events_by_vehicle(&events) {
        let mut owner = None;
        for event in stream {
            match event.kind {
                VehicleEventKind::Claimed => {
                    assert_eq!(owner, None, "vehicle {vehicle_id} claimed twice");
                    owner = event.order_id;
                }
                VehicleEventKind::Released => {
                    assert_eq!(owner, event.order_id);
                    owner = None;
                }
                _ => assert_eq!(event.order_id, owner, "vehicle {vehicle_id} served two orders"),
            }
        }
        assert_eq!(owner, None);
    }
}

#[tokio::test(start_paused = true)]
async fn energy_trace_is_non_increasing() {
    let mut grid = Grid::new(20, 20).unwrap();
    for y in 3..17 {
        grid.block(Cell::new(8, y));
    }
    let config = DispatchConfig {
        obstacle_probability: 0.25,
        ..config(6)
    };
    let mut dispatcher = Dispatcher::new(grid, config).unwrap();
    let mut rx = dispatcher.subscribe();
    dispatcher.add_order(1, Cell::new(0, 0), Cell::new(15, 15)).unwrap();
    dispatcher.add_order(2, Cell::new(2, 2), Cell::new(18, 18)).unwrap();
    dispatcher.add_order(3, Cell::new(1, 1), Cell::new(10, 10)).unwrap();

    let report = dispatcher.dispatch_all().await;
    assert_eq!(report.len(), 3);
    for (_, status) in report.iter() {
        assert!(status.is_terminal());
        assert!(matches!(
            status,
            OrderStatus::Delivered | OrderStatus::AbortedLowBattery
        ));
    }

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == VehicleEventKind::ObstacleHold));
    for (vehicle_id, stream) in events_by_vehicle(&events) {
        for pair in stream.windows(2) {
            assert!(
                pair[1].energy <= pair[0].energy,
                "vehicle {vehicle_id} gained energy: {} -> {}",
                pair[0].energy,
                pair[1].energy
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn obstacles_delay_but_do_not_divert() {
    for policy in [ReroutePolicy::Hold, ReroutePolicy::Replan] {
        let grid = Grid::new(6, 6).unwrap();
        let config = DispatchConfig {
            obstacle_probability: 1.0,
            reroute_policy: policy,
            ..config(7)
        };
        let mut dispatcher =
            Dispatcher::with_vehicles(grid, config, vec![VehicleSpec::new(0, Cell::new(0, 0))])
                .unwrap();
        let mut rx = dispatcher.subscribe();
        dispatcher.add_order(1, Cell::new(2, 0), Cell::new(2, 3)).unwrap();

        let started = tokio::time::Instant::now();
        let report = dispatcher.dispatch_all().await;
        assert_eq!(report.status(1), Some(OrderStatus::Delivered), "{policy:?}");

        let events = drain(&mut rx);
        let holds = events.iter().filter(|e| e.kind == VehicleEventKind::ObstacleHold).count();
        let moves: Vec<&VehicleEvent> = events
            .iter()
            .filter(|e| matches!(e.kind, VehicleEventKind::Moved { .. }))
            .collect();
        assert_eq!(moves.len(), 5, "{policy:?}");
        assert_eq!(holds, moves.len(), "{policy:?}");
        for step in &moves {
            if let VehicleEventKind::Moved { from } = step.kind {
                assert_eq!(from.manhattan(step.cell), 1);
            }
        }

        // Five steps plus five holds at 500ms each.
        assert!(started.elapsed() >= std::time::Duration::from_millis(5_000));
    }
}
