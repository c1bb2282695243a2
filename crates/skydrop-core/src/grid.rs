//! Static occupancy grid the fleet flies over.
//!
//! A grid is built once (free cells plus a set of blocked cells) and then
//! shared read-only between every order task for the rest of a dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GridError;

/// One grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell.
    pub fn manhattan(&self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 4-connected move offsets, in the order neighbours are expanded.
static MOVES: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Fixed-size occupancy map. `x` indexes columns, `y` indexes rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    blocked: Vec<bool>,
}

impl Grid {
    /// Create a grid with every cell free.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        let (width, height) = (
            i32::try_from(width).map_err(|_| GridError::TooLarge)?,
            i32::try_from(height).map_err(|_| GridError::TooLarge)?,
        );
        Ok(Self {
            width,
            height,
            blocked: vec![false; (width as usize) * (height as usize)],
        })
    }

    /// Create a grid with the given cells blocked. Out-of-bounds cells are ignored.
    pub fn with_blocked(width: u32, height: u32, blocked: &[Cell]) -> Result<Self, GridError> {
        let mut grid = Self::new(width, height)?;
        for &cell in blocked {
            grid.block(cell);
        }
        Ok(grid)
    }

    /// Parse a grid from text rows: `.` is free, `#` is blocked.
    ///
    /// Row index is `y`, column index is `x`.
    pub fn from_rows(rows: &[&str]) -> Result<Self, GridError> {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as u32;
        let mut grid = Self::new(width, height)?;

        for (y, row) in rows.iter().enumerate() {
            let len = row.chars().count() as u32;
            if len != width {
                return Err(GridError::RaggedRow { row: y, expected: width, found: len });
            }
            for (x, glyph) in row.chars().enumerate() {
                match glyph {
                    '.' => {}
                    '#' => grid.block(Cell::new(x as i32, y as i32)),
                    other => return Err(GridError::UnknownGlyph { glyph: other, row: y, col: x }),
                }
            }
        }
        Ok(grid)
    }

    /// Mark a cell as blocked. Only meaningful while the grid is being built;
    /// once shared behind an `Arc` the grid is never mutated.
    pub fn block(&mut self, cell: Cell) {
        if let Some(idx) = self.index(cell) {
            self.blocked[idx] = true;
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    /// True if the cell is inside the grid and not blocked.
    pub fn is_free(&self, cell: Cell) -> bool {
        self.index(cell).map(|idx| !self.blocked[idx]).unwrap_or(false)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    /// Free 4-connected neighbours of `cell`.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        MOVES
            .iter()
            .filter_map(move |(dx, dy)| {
                Some(Cell::new(cell.x.checked_add(*dx)?, cell.y.checked_add(*dy)?))
            })
            .filter(|next| self.is_free(*next))
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some((cell.y as usize) * (self.width as usize) + cell.x as usize)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                let glyph = if self.is_free(Cell::new(x, y)) { '.' } else { '#' };
                write!(f, "{}", glyph)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
