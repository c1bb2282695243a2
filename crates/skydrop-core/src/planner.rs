//! A* route planner on the 4-connected occupancy grid.
//!
//! Unit step cost with a Manhattan heuristic, which is admissible and
//! consistent here, so the first time the goal is popped its route is optimal.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::grid::{Cell, Grid};

/// Ordered cells from start to goal, both inclusive. Empty means no path.
pub type Route = Vec<Cell>;

/// A planned route plus search statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathResult {
    pub route: Route,
    pub nodes_visited: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    cell: Cell,
    g_score: u32,
    f_score: u32,
    /// Push counter; earlier discoveries win ties
    seq: u64,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Lowest-cost obstacle-free route from `start` to `goal`.
pub fn find_path(start: Cell, goal: Cell, grid: &Grid) -> Route {
    find_path_with_stats(start, goal, grid).route
}

/// Like [`find_path`] but also reports how many nodes were expanded.
pub fn find_path_with_stats(start: Cell, goal: Cell, grid: &Grid) -> PathResult {
    if !grid.is_free(start) || !grid.is_free(goal) {
        return PathResult::default();
    }

    let mut seq = 0u64;
    let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();
    open_set.push(Reverse(OpenNode {
        cell: start,
        g_score: 0,
        f_score: start.manhattan(goal),
        seq,
    }));
    let mut closed_set: HashSet<Cell> = HashSet::new();
    let mut g_score: HashMap<Cell, u32> = HashMap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    g_score.insert(start, 0);

    let mut nodes_visited = 0usize;

    while let Some(Reverse(current)) = open_set.pop() {
        if closed_set.contains(&current.cell) {
            continue;
        }
        let best_g = g_score.get(&current.cell).copied().unwrap_or(u32::MAX);
        if current.g_score > best_g {
            continue;
        }

        nodes_visited += 1;

        if current.cell == goal {
            return PathResult {
                route: reconstruct(&came_from, start, goal),
                nodes_visited,
            };
        }

        closed_set.insert(current.cell);

        for next in grid.neighbors(current.cell) {
            if closed_set.contains(&next) {
                continue;
            }
            let tentative_g = best_g + 1;
            if tentative_g < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                seq += 1;
                open_set.push(Reverse(OpenNode {
                    cell: next,
                    g_score: tentative_g,
                    f_score: tentative_g + next.manhattan(goal),
                    seq,
                }));
            }
        }
    }

    PathResult {
        route: Vec::new(),
        nodes_visited,
    }
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Route {
    let mut route = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(prev) => {
                current = *prev;
                route.push(current);
            }
            None => return Vec::new(),
        }
    }
    route.reverse();
    route
}

/// Number of moves in a route (cells minus one; zero for an empty route).
pub fn route_length(route: &[Cell]) -> usize {
    route.len().saturating_sub(1)
}
