//! Plain-text views of a finished run.

use skydrop_core::{Cell, DispatchReport, Grid, Order, OrderStatus, VehicleSnapshot};
use std::fmt::Write;

/// ASCII map: `.` free, `#` blocked, a digit for each parked vehicle
/// (last digit of its id, `*` when several share a cell).
pub fn render_fleet(grid: &Grid, vehicles: &[VehicleSnapshot]) -> String {
    let (width, height) = grid.dimensions();
    let mut out = String::with_capacity(map_capacity(width, height));
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let cell = Cell::new(x, y);
            let mut here = vehicles.iter().filter(|v| v.cell == cell);
            let glyph = match (here.next(), here.next()) {
                (Some(_), Some(_)) => '*',
                (Some(v), None) => char::from_digit(v.vehicle_id % 10, 10).unwrap_or('?'),
                _ if grid.is_free(cell) => '.',
                _ => '#',
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

/// Bytes in a rendered map: one glyph per cell plus a newline per row.
fn map_capacity(width: u32, height: u32) -> usize {
    (width as usize + 1).saturating_mul(height as usize)
}

/// One line per order, followed by a tally of terminal statuses.
pub fn render_report(report: &DispatchReport, orders: &[Order]) -> String {
    let mut out = String::new();
    for order in orders {
        let vehicle = order
            .vehicle_id
            .map(|id| format!("vehicle {id}"))
            .unwrap_or_else(|| "no vehicle".to_string());
        let _ = writeln!(
            out,
            "order {:>3}  {} -> {}  {:<20} {}",
            order.order_id, order.pickup, order.dropoff, order.status, vehicle
        );
    }

    let tally: Vec<String> = [
        OrderStatus::Delivered,
        OrderStatus::FailedNoVehicle,
        OrderStatus::AbortedLowBattery,
        OrderStatus::RouteUnavailable,
        OrderStatus::Faulted,
    ]
    .into_iter()
    .filter_map(|status| match report.count(status) {
        0 => None,
        n => Some(format!("{status}={n}")),
    })
    .collect();
    let _ = writeln!(out, "{} orders: {}", report.len(), tally.join(" "));
    out
}
