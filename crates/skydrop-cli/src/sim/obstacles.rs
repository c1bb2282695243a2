//! Random obstacle placement for demo grids.

use rand::Rng;
use skydrop_core::{Cell, Grid};

/// Block up to `count` random cells, never touching `keep_clear`.
///
/// Returns how many new cells were blocked; repeats and protected cells are
/// skipped, so the result can be lower than `count`.
pub fn scatter_obstacles<R: Rng>(grid: &mut Grid, count: usize, keep_clear: &[Cell], rng: &mut R) -> usize {
    let (width, height) = grid.dimensions();
    let mut placed = 0;
    for _ in 0..count {
        let cell = Cell::new(
            rng.random_range(0..width as i32),
            rng.random_range(0..height as i32),
        );
        if keep_clear.contains(&cell) || !grid.is_free(cell) {
            continue;
        }
        grid.block(cell);
        placed += 1;
    }
    placed
}
